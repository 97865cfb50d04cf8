//! Dispatch: build the storage/retrieval/ingest stack from config and a
//! root path, run one `Commands` variant, print JSON to stdout.

use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use ov_core::config::OpenVikingConfig;
use ov_core::error::{OvError, Result};
use ov_ingest::{
    EmbeddingMode, EmbeddingPipeline, MemoryQueue, ProcessorConfig, SemanticProcessor, SemanticQueue,
    TreeBuilder,
};
use ov_parser::tree_builder::TreeBuilderConfig;
use ov_retrieval::{HierarchicalRetriever, IntentAnalyzer, RetrievalService, RetrieverConfig};
use ov_storage::VikingFS;
use ov_vectordb::{Collection, CollectionConfig, ContextVectorIndex, FieldDef, FieldType, VectorIndex};
use serde_json::json;

use crate::cli::{AddArgs, Commands, FindArgs, LinkArgs, MoveArgs, RemoveArgs, SearchArgs, UriArg};
use crate::providers::{
    HeuristicLlm, HttpDenseEmbedder, HttpQueryEmbedder, HttpReranker, HttpSparseEmbedder, HttpVlm,
};

struct App {
    vfs: Arc<VikingFS>,
    index: Arc<dyn VectorIndex>,
    queue: Arc<MemoryQueue>,
    processor: SemanticProcessor,
    retrieval: RetrievalService,
    seq: AtomicU64,
}

fn build_index(config: &OpenVikingConfig, root: &Path) -> Result<Arc<dyn VectorIndex>> {
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
    let path = root.join("vectordb");
    let collection = Collection::with_path(coll_cfg, path)
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

impl App {
    fn new(config: &OpenVikingConfig, root: &str) -> Result<Self> {
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
        let processor = SemanticProcessor::new(
            vfs.clone(),
            queue.clone(),
            index.clone(),
            embeddings.clone(),
            vlm,
            ProcessorConfig {
                max_images_per_call: config.vlm.max_images_per_call,
                ..ProcessorConfig::default()
            },
        );

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
        let retrieval = RetrievalService::new(analyzer, retriever);

        Ok(Self { vfs, index, queue, processor, retrieval, seq: AtomicU64::new(0) })
    }

    async fn add(&self, args: &AddArgs, scope_base: &str) -> Result<serde_json::Value> {
        let content = std::fs::read_to_string(&args.source)
            .map_err(|e| OvError::InvalidInput(format!("reading {}: {e}", args.source)))?;
        let title = args.title.clone().unwrap_or_else(|| {
            Path::new(&args.source)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("untitled")
                .to_string()
        });
        let builder = TreeBuilder::new(self.vfs.clone());
        let staged = builder.stage(&title, &content, &TreeBuilderConfig::default()).await?;
        let msgs = builder.promote(&staged, scope_base, self.queue.as_ref(), &self.seq).await?;

        let processed = if args.wait { self.processor.drain().await? } else { 0 };
        Ok(json!({ "queued": msgs.len(), "processed": processed }))
    }
}

/// Run `command` against `config`/`root`. Returns the process exit code.
pub async fn run(config: &OpenVikingConfig, root: &str, command: Commands) -> i32 {
    let app = match App::new(config, root) {
        Ok(app) => app,
        Err(e) => return report_err(&e),
    };

    let result: Result<serde_json::Value> = match command {
        Commands::AddResource(args) => app.add(&args, "viking://resources").await,
        Commands::AddSkill(args) => app.add(&args, "viking://agent/skills").await,
        Commands::Find(args) => find(&app, &args).await,
        Commands::Search(args) => search(&app, &args).await,
        Commands::Ls(args) => ls(&app, &args).await,
        Commands::Read(args) => read(&app, &args).await,
        Commands::Abstract(args) => abstract_text(&app, &args).await,
        Commands::Overview(args) => overview(&app, &args).await,
        Commands::Rm(args) => rm(&app, &args).await,
        Commands::Mv(args) => mv(&app, &args).await,
        Commands::Link(args) => link(&app, &args).await,
    };

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            0
        }
        Err(e) => report_err(&e),
    }
}

fn report_err(e: &OvError) -> i32 {
    eprintln!("error: {e}");
    e.exit_code()
}

async fn find(app: &App, args: &FindArgs) -> Result<serde_json::Value> {
    let matches = app.retrieval.find(&args.query, &args.context_type, Some(args.limit)).await?;
    Ok(json!({ "matches": matches }))
}

async fn search(app: &App, args: &SearchArgs) -> Result<serde_json::Value> {
    let matches = app
        .retrieval
        .search(&args.session_summary, &[], &args.query, Some(args.limit))
        .await?;
    Ok(json!({ "matches": matches }))
}

async fn ls(app: &App, args: &UriArg) -> Result<serde_json::Value> {
    let entries = app.vfs.ls(&args.uri).await?;
    Ok(json!({ "entries": entries }))
}

async fn read(app: &App, args: &UriArg) -> Result<serde_json::Value> {
    let content = app.vfs.read_string(&args.uri).await?;
    Ok(json!({ "content": content }))
}

async fn abstract_text(app: &App, args: &UriArg) -> Result<serde_json::Value> {
    let text = app.vfs.abstract_text(&args.uri).await?;
    Ok(json!({ "abstract": text }))
}

async fn overview(app: &App, args: &UriArg) -> Result<serde_json::Value> {
    let text = app.vfs.overview(&args.uri).await?;
    Ok(json!({ "overview": text }))
}

async fn rm(app: &App, args: &RemoveArgs) -> Result<serde_json::Value> {
    app.vfs.rm(&args.uri, args.recursive).await?;
    app.index.delete_prefix(&args.uri).await.map_err(OvError::Other)?;
    app.queue.purge_prefix(&args.uri).await?;
    Ok(json!({ "removed": args.uri }))
}

async fn mv(app: &App, args: &MoveArgs) -> Result<serde_json::Value> {
    app.vfs.mv(&args.from_uri, &args.to_uri).await?;
    Ok(json!({ "from": args.from_uri, "to": args.to_uri }))
}

async fn link(app: &App, args: &LinkArgs) -> Result<serde_json::Value> {
    app.vfs.link(&args.from_uri, std::slice::from_ref(&args.to_uri), &args.reason).await?;
    Ok(json!({ "linked": args.from_uri, "to": args.to_uri }))
}
