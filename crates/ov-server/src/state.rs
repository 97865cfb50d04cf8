//! Application state shared across all handlers: the same
//! storage/ingest/retrieval stack `ov-cli` wires up, plus the session
//! manager for the conversation-side routes.

use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use ov_core::config::OpenVikingConfig;
use ov_core::error::Result;
use ov_ingest::{EmbeddingMode, EmbeddingPipeline, MemoryQueue, ProcessorConfig, SemanticProcessor, TreeBuilder};
use ov_retrieval::{HierarchicalRetriever, IntentAnalyzer, RetrievalService, RetrieverConfig};
use ov_session::manager::SessionManager;
use ov_storage::VikingFS;
use ov_vectordb::{Collection, CollectionConfig, ContextVectorIndex, FieldDef, FieldType, VectorIndex};

use crate::providers::{HeuristicLlm, HttpDenseEmbedder, HttpQueryEmbedder, HttpReranker, HttpSparseEmbedder, HttpVlm};

fn build_index(config: &OpenVikingConfig, root: &Path) -> Result<Arc<dyn VectorIndex>> {
    use ov_core::error::OvError;
    let coll_cfg = CollectionConfig {
        name: config.storage.vectordb.name.clone(),
        description: String::new(),
        fields: vec![
            FieldDef { name: "uri".into(), field_type: FieldType::String, is_primary_key: true, dim: None },
            FieldDef {
                name: "vector".into(),
                field_type: FieldType::Vector,
                is_primary_key: false,
                dim: Some(config.embedding.dense.dimension),
            },
        ],
    };
    let collection = Collection::with_path(coll_cfg, root.join("vectordb"))
        .map_err(|e| OvError::FatalBackend(format!("opening vector collection: {e}")))?;
    if !collection.has_index("main") {
        collection
            .create_index("main", ov_vectordb::collection::IndexConfig::default())
            .map_err(|e| OvError::FatalBackend(format!("creating vector index: {e}")))?;
    }
    Ok(Arc::new(ContextVectorIndex::new(
        Arc::new(collection),
        "main",
        config.storage.vectordb.sparse_weight,
    )))
}

/// Shared application state, cloned (cheaply, via `Arc`s) into every Axum
/// handler.
#[derive(Clone)]
pub struct AppState {
    pub vfs: Arc<VikingFS>,
    pub index: Arc<dyn VectorIndex>,
    pub queue: Arc<MemoryQueue>,
    pub seq: Arc<AtomicU64>,
    pub processor: Arc<SemanticProcessor>,
    pub retrieval: Arc<RetrievalService>,
    pub session_manager: Arc<SessionManager>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: &OpenVikingConfig, root: &str) -> Result<Self> {
        let root_path = Path::new(root);
        let vfs = Arc::new(VikingFS::new(root_path));
        let index = build_index(config, root_path)?;
        let queue = Arc::new(MemoryQueue::new());

        let dense = if config.embedding.dense.endpoint.is_empty() {
            None
        } else {
            Some(Arc::new(HttpDenseEmbedder::new(config.embedding.dense.endpoint.clone()))
                as Arc<dyn ov_ingest::DenseEmbedder>)
        };
        let sparse = if config.embedding.sparse.enabled && !config.embedding.sparse.endpoint.is_empty() {
            Some(Arc::new(HttpSparseEmbedder::new(config.embedding.sparse.endpoint.clone()))
                as Arc<dyn ov_ingest::SparseEmbedder>)
        } else {
            None
        };
        let mode = if sparse.is_some() { EmbeddingMode::Hybrid } else { EmbeddingMode::Dense };
        let embeddings = Arc::new(EmbeddingPipeline::new(
            dense,
            sparse,
            mode,
            config.embedding.batch_size,
            config.embedding.dense.normalize,
        ));

        let vlm: Arc<dyn ov_ingest::Vlm> = Arc::new(HttpVlm::new(config.vlm.endpoint.clone()));
        let processor = Arc::new(SemanticProcessor::new(
            vfs.clone(),
            queue.clone(),
            index.clone(),
            embeddings,
            vlm,
            ProcessorConfig { max_images_per_call: config.vlm.max_images_per_call, ..ProcessorConfig::default() },
        ));

        let query_embedder = Arc::new(HttpQueryEmbedder::new(config.embedding.dense.endpoint.clone()));
        let reranker: Option<Arc<dyn ov_retrieval::Reranker>> = if config.rerank.enabled {
            Some(Arc::new(HttpReranker::new(config.rerank.endpoint.clone())))
        } else {
            None
        };
        let analyzer = IntentAnalyzer::new(Arc::new(HeuristicLlm));
        let retriever = HierarchicalRetriever::new(
            vfs.clone(),
            index.clone(),
            query_embedder,
            reranker,
            RetrieverConfig::default(),
        );
        let retrieval = Arc::new(RetrievalService::new(analyzer, retriever));

        Ok(Self {
            vfs,
            index,
            queue,
            seq: Arc::new(AtomicU64::new(0)),
            processor,
            retrieval,
            session_manager: Arc::new(SessionManager::new()),
            start_time: std::time::Instant::now(),
        })
    }

    pub fn tree_builder(&self) -> TreeBuilder {
        TreeBuilder::new(self.vfs.clone())
    }
}
