//! Ingestion pipeline: stage parsed documents into AGFS (`tree_builder`),
//! schedule bottom-up semantic work (`queue`), generate L0/L1 summaries and
//! vectors for it (`processor`, `embedding`).

pub mod embedding;
pub mod processor;
pub mod queue;
pub mod retry;
pub mod tree_builder;

pub use embedding::{DenseEmbedder, EmbeddingMode, EmbeddingPipeline, SparseEmbedder};
pub use processor::{ProcessorConfig, SemanticProcessor, Vlm};
pub use queue::{MemoryQueue, SemanticQueue};
pub use tree_builder::TreeBuilder;
