//! OpenViking storage layer.

pub mod agfs;
pub mod local_fs;
pub mod schema;
pub mod transaction;
pub mod viking_fs;

pub use agfs::{AgFs, AgfsEntry, InMemoryAgFs, LocalAgFs};
pub use local_fs::{BytesRow, FileKvStore};
pub use schema::{CollectionSchema, context_collection_schema};
pub use viking_fs::{DirEntry, RelationEntry, TreeEntry, VikingFS};
