pub mod config;
pub mod context;
pub mod directories;
pub mod error;
pub mod skill;
pub mod tree;
pub mod types;
pub mod uri;

pub use config::OpenVikingConfig;
pub use context::{Context, ContextType, ResourceContentType, Vectorize};
pub use error::{OvError, Result};
pub use types::{MatchedContext, RelatedContext, SemanticMsg, SemanticStatus, TypedQuery};
pub use uri::{Scope, VikingUri};
