//! `SemanticProcessor`: drains a `SemanticQueue`, turning each claimed
//! directory into an L0 abstract, an L1 overview, and an indexed vector
//! record, bottom-up.
//!
//! VLM calls are bounded by `max_concurrent_llm` the way a worker pool
//! bounds outstanding requests; per-call chunking reuses
//! `ov_parser::chunker::TextChunker` rather than inventing a second
//! section-splitter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ov_core::context::Context;
use ov_core::error::{OvError, Result};
use ov_core::types::SemanticMsg;
use ov_core::uri::VikingUri;
use ov_parser::chunker::TextChunker;
use ov_parser::estimate_tokens;
use ov_storage::VikingFS;
use ov_vectordb::VectorIndex;
use tokio::sync::Semaphore;

use crate::embedding::EmbeddingPipeline;
use crate::queue::SemanticQueue;
use crate::retry::{retry_with_backoff, DEFAULT_BACKOFF};

const L1_MAX_TOKENS: usize = 2000;
const L0_MAX_TOKENS: usize = 120;
const META_FILE: &str = ".meta.json";

/// External summarization collaborator. Given a file name and the
/// (possibly chunked) sections of its content, returns one summary.
#[async_trait]
pub trait Vlm: Send + Sync {
    async fn summarize(&self, name: &str, sections: &[String]) -> Result<String>;
}

pub struct ProcessorConfig {
    pub max_concurrent_llm: usize,
    pub max_images_per_call: usize,
    pub max_sections_per_call: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self { max_concurrent_llm: 10, max_images_per_call: 10, max_sections_per_call: 20 }
    }
}

#[derive(Clone)]
pub struct SemanticProcessor {
    vfs: Arc<VikingFS>,
    queue: Arc<dyn SemanticQueue>,
    index: Arc<dyn VectorIndex>,
    embeddings: Arc<EmbeddingPipeline>,
    vlm: Arc<dyn Vlm>,
    max_concurrent_llm: usize,
    max_sections_per_call: usize,
    reconcile_seq: Arc<AtomicU64>,
}

struct ChildEntry {
    name: String,
    is_dir: bool,
    purpose: String,
}

impl SemanticProcessor {
    pub fn new(
        vfs: Arc<VikingFS>,
        queue: Arc<dyn SemanticQueue>,
        index: Arc<dyn VectorIndex>,
        embeddings: Arc<EmbeddingPipeline>,
        vlm: Arc<dyn Vlm>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            vfs,
            queue,
            index,
            embeddings,
            vlm,
            max_concurrent_llm: config.max_concurrent_llm.max(1),
            max_sections_per_call: config.max_sections_per_call.max(1),
            reconcile_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// §7 read-time reconciliation, AGFS-hit/index-miss side: `uri` exists
    /// in AGFS but has no vector record, meaning an earlier processing run
    /// was lost (e.g. a crash between `write_context` and `index.upsert`).
    /// Re-enqueues it under `scope_base` and returns the drift that
    /// triggered the re-enqueue; `Ok(None)` if nothing was amiss.
    pub async fn reconcile_uri(&self, uri: &str, scope_base: &str) -> Result<Option<OvError>> {
        if !self.vfs.exists(uri).await {
            return Ok(None);
        }
        if self.index.contains(uri).await.map_err(OvError::Other)? {
            return Ok(None);
        }
        let parsed = VikingUri::parse(uri)?;
        let scope_root_len = VikingUri::parse(scope_base)?.segments.len();
        let depth = (parsed.segments.len() as i64 - scope_root_len as i64).max(0);
        let context_type = Context::derive_context_type(uri).as_str().to_string();
        let seq_no = self.reconcile_seq.fetch_add(1, Ordering::SeqCst);
        let msg = SemanticMsg::new(uri.to_string(), context_type, depth, seq_no);
        self.queue.enqueue(msg).await?;
        Ok(Some(OvError::drift(
            uri,
            "AGFS has content but the vector index has no record; re-enqueued for processing",
        )))
    }

    /// Claim and process messages until the queue has nothing claimable.
    /// Returns the number of messages processed (completed or permanently
    /// failed).
    pub async fn drain(&self) -> Result<usize> {
        let mut processed = 0;
        while let Some(msg) = self.queue.claim().await? {
            match self.process_directory(&msg.uri).await {
                Ok(()) => self.queue.ack(&msg.id).await?,
                Err(e) => {
                    let retryable = e.is_retryable();
                    let _ = self.record_error(&msg.uri, &e.to_string()).await;
                    self.queue.nack(&msg.id, retryable).await?;
                }
            }
            processed += 1;
        }
        Ok(processed)
    }

    /// Steps 1-7 of per-directory processing for `dir_uri`.
    pub async fn process_directory(&self, dir_uri: &str) -> Result<()> {
        let entries = self.vfs.ls(dir_uri).await?;
        let file_names: Vec<String> = entries
            .iter()
            .filter(|e| !e.is_dir && !e.name.starts_with('.'))
            .map(|e| e.name.clone())
            .collect();
        let dir_names: Vec<String> = entries
            .iter()
            .filter(|e| e.is_dir)
            .map(|e| e.name.clone())
            .collect();

        let file_summaries = self.summarize_children(dir_uri, &file_names).await?;

        let mut dir_abstracts = Vec::with_capacity(dir_names.len());
        for name in &dir_names {
            let child_uri = format!("{dir_uri}/{name}");
            let abs = self.vfs.abstract_text(&child_uri).await.unwrap_or_default();
            dir_abstracts.push((name.clone(), abs));
        }

        let mut children: Vec<ChildEntry> = file_summaries
            .into_iter()
            .map(|(name, purpose)| ChildEntry { name, is_dir: false, purpose })
            .chain(
                dir_abstracts
                    .into_iter()
                    .map(|(name, purpose)| ChildEntry { name, is_dir: true, purpose }),
            )
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));

        let dir_name = dir_uri.rsplit('/').next().unwrap_or(dir_uri);
        let overview = self.compose_overview_within_budget(dir_name, &children);
        let abstract_text = extract_l0(&overview);

        self.vfs.write_context(dir_uri, &abstract_text, &overview, None, None).await?;

        let vectorize_text = format!("{abstract_text} {dir_name}");
        let embed = self.embeddings.embed_one(&vectorize_text).await?;

        let ctx = Context::builder(dir_uri)
            .name(dir_name)
            .abstract_text(&abstract_text)
            .overview_text(&overview)
            .is_leaf(false)
            .parent_uri(parent_of(dir_uri).unwrap_or_default())
            .build();
        self.index.upsert(&ctx, &embed).await.map_err(OvError::Other)?;

        Ok(())
    }

    async fn summarize_children(
        &self,
        dir_uri: &str,
        file_names: &[String],
    ) -> Result<Vec<(String, String)>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_llm));
        let mut tasks = Vec::with_capacity(file_names.len());
        for name in file_names {
            let name = name.clone();
            let dir_uri = dir_uri.to_string();
            let this = self.clone();
            let semaphore = semaphore.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                let content = this.vfs.read_string(&format!("{dir_uri}/{name}")).await?;
                let summary = this.summarize_file(&name, &content).await?;
                Ok::<(String, String), OvError>((name, summary))
            }));
        }
        let mut summaries = Vec::with_capacity(tasks.len());
        for task in tasks {
            let result = task.await.map_err(|e| OvError::FatalBackend(e.to_string()))?;
            summaries.push(result?);
        }
        Ok(summaries)
    }

    async fn summarize_file(&self, name: &str, content: &str) -> Result<String> {
        let chunker = TextChunker::default();
        let mut sections: Vec<String> = chunker.chunk_semantic(content).into_iter().map(|c| c.text).collect();
        if sections.is_empty() {
            sections.push(content.to_string());
        }
        let mut parts = Vec::new();
        for batch in sections.chunks(self.max_sections_per_call) {
            let batch = batch.to_vec();
            let vlm = self.vlm.clone();
            let name = name.to_string();
            let summary = retry_with_backoff(&DEFAULT_BACKOFF, OvError::is_retryable, || {
                let vlm = vlm.clone();
                let name = name.clone();
                let batch = batch.clone();
                async move { vlm.summarize(&name, &batch).await }
            })
            .await?;
            parts.push(summary);
        }
        Ok(parts.join(" "))
    }

    fn compose_overview_within_budget(&self, dir_name: &str, children: &[ChildEntry]) -> String {
        let mut purpose_budget = 200usize;
        let mut overview = compose_overview(dir_name, children, purpose_budget);
        let mut attempts = 0;
        while estimate_tokens(&overview) > L1_MAX_TOKENS && attempts < 6 {
            purpose_budget = (purpose_budget / 2).max(8);
            overview = compose_overview(dir_name, children, purpose_budget);
            attempts += 1;
        }
        overview
    }

    async fn record_error(&self, dir_uri: &str, reason: &str) -> Result<()> {
        let path = format!("{dir_uri}/{META_FILE}");
        let mut meta: serde_json::Map<String, serde_json::Value> =
            match self.vfs.read_string(&path).await {
                Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
                Err(_) => serde_json::Map::new(),
            };
        meta.insert("error".to_string(), serde_json::Value::String(reason.to_string()));
        self.vfs.write_string(&path, &serde_json::to_string_pretty(&meta)?).await
    }
}

fn parent_of(uri: &str) -> Option<String> {
    uri.rsplit_once('/').map(|(parent, _)| parent.to_string())
}

fn compose_overview(dir_name: &str, children: &[ChildEntry], purpose_budget_tokens: usize) -> String {
    let mut s = String::new();
    s.push_str(&format!(
        "{dir_name} is a directory containing {} item(s).\n\n",
        children.len()
    ));
    s.push_str("Contents:\n");
    for child in children {
        let marker = if child.is_dir { "dir" } else { "file" };
        let purpose = truncate_at_sentence_boundary(&child.purpose, purpose_budget_tokens);
        s.push_str(&format!("- [{marker}] {}: {purpose}\n", child.name));
    }
    s.push_str("\nKey points:\n");
    for child in children.iter().take(5) {
        s.push_str(&format!("- {} is available under this directory.\n", child.name));
    }
    s.push_str(
        "\nAccess hints: read .abstract.md for a short summary, .overview.md for this overview, \
         or descend into a child for its full content.\n",
    );
    s
}

fn extract_l0(overview: &str) -> String {
    let first_para = overview.split("\n\n").next().unwrap_or("").trim();
    truncate_at_sentence_boundary(first_para, L0_MAX_TOKENS)
}

/// Truncate `text` to at most `max_tokens`, preferring to stop at a
/// sentence boundary (`.`, `!`, `?`) rather than mid-sentence.
fn truncate_at_sentence_boundary(text: &str, max_tokens: usize) -> String {
    if estimate_tokens(text) <= max_tokens {
        return text.to_string();
    }
    let mut acc = String::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let candidate = format!("{acc}{current}");
            if estimate_tokens(&candidate) > max_tokens && !acc.is_empty() {
                break;
            }
            acc = candidate;
            current.clear();
        }
    }
    if acc.trim().is_empty() {
        let chars_budget = max_tokens * 4;
        return text.chars().take(chars_budget).collect::<String>().trim().to_string();
    }
    acc.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ov_vectordb::{Collection, CollectionConfig, ContextVectorIndex, FieldDef, FieldType};

    struct EchoVlm;
    #[async_trait]
    impl Vlm for EchoVlm {
        async fn summarize(&self, name: &str, sections: &[String]) -> Result<String> {
            Ok(format!("{name} covers {} section(s)", sections.len()))
        }
    }

    struct FailingVlm;
    #[async_trait]
    impl Vlm for FailingVlm {
        async fn summarize(&self, _name: &str, _sections: &[String]) -> Result<String> {
            Err(OvError::FatalBackend("model refused input".into()))
        }
    }

    struct StubDense;
    #[async_trait]
    impl crate::embedding::DenseEmbedder for StubDense {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    fn make_index(dim: usize) -> Arc<dyn VectorIndex> {
        let cfg = CollectionConfig {
            name: "ctx".into(),
            description: String::new(),
            fields: vec![
                FieldDef { name: "uri".into(), field_type: FieldType::String, is_primary_key: true, dim: None },
                FieldDef { name: "vector".into(), field_type: FieldType::Vector, is_primary_key: false, dim: Some(dim) },
            ],
        };
        let coll = Arc::new(Collection::new(cfg));
        coll.create_index("main", ov_vectordb::collection::IndexConfig::default()).unwrap();
        Arc::new(ContextVectorIndex::new(coll, "main", 0.0))
    }

    fn processor(vfs: Arc<VikingFS>, queue: Arc<dyn SemanticQueue>, vlm: Arc<dyn Vlm>) -> SemanticProcessor {
        let embeddings = Arc::new(EmbeddingPipeline::new(
            Some(Arc::new(StubDense)),
            None,
            crate::embedding::EmbeddingMode::Dense,
            16,
            false,
        ));
        SemanticProcessor::new(vfs, queue, make_index(3), embeddings, vlm, ProcessorConfig::default())
    }

    #[tokio::test]
    async fn processes_leaf_directory_writes_abstract_and_overview() {
        let vfs = Arc::new(VikingFS::new_in_memory());
        vfs.write_string("viking://resources/doc/a.md", "Some content about apples.").await.unwrap();
        vfs.write_string("viking://resources/doc/b.md", "Some content about oranges.").await.unwrap();
        let queue: Arc<dyn SemanticQueue> = Arc::new(crate::queue::MemoryQueue::new());
        let proc = processor(vfs.clone(), queue, Arc::new(EchoVlm));

        proc.process_directory("viking://resources/doc").await.unwrap();

        let overview = vfs.overview("viking://resources/doc").await.unwrap();
        assert!(overview.contains("a.md"));
        assert!(overview.contains("b.md"));
        let abs = vfs.abstract_text("viking://resources/doc").await.unwrap();
        assert!(!abs.is_empty());
    }

    #[tokio::test]
    async fn missing_child_abstract_treated_as_empty() {
        let vfs = Arc::new(VikingFS::new_in_memory());
        vfs.mkdir("viking://resources/doc/sub").await.unwrap();
        let queue: Arc<dyn SemanticQueue> = Arc::new(crate::queue::MemoryQueue::new());
        let proc = processor(vfs.clone(), queue, Arc::new(EchoVlm));

        proc.process_directory("viking://resources/doc").await.unwrap();
        let overview = vfs.overview("viking://resources/doc").await.unwrap();
        assert!(overview.contains("sub"));
    }

    #[tokio::test]
    async fn fatal_vlm_error_marks_meta_and_nacks_as_failed() {
        let vfs = Arc::new(VikingFS::new_in_memory());
        vfs.write_string("viking://resources/doc/a.md", "content").await.unwrap();
        let queue: Arc<dyn SemanticQueue> = Arc::new(crate::queue::MemoryQueue::new());
        queue
            .enqueue(ov_core::types::SemanticMsg::new("viking://resources/doc", "resource", 0, 0))
            .await
            .unwrap();
        let proc = processor(vfs.clone(), queue.clone(), Arc::new(FailingVlm));

        let processed = proc.drain().await.unwrap();
        assert_eq!(processed, 1);
        assert_eq!(queue.size().await, 0);
        let meta = vfs.read_string("viking://resources/doc/.meta.json").await.unwrap();
        assert!(meta.contains("error"));
    }

    #[test]
    fn truncate_prefers_sentence_boundary() {
        let text = "Short one. This sentence is much, much longer and would blow the budget.";
        let truncated = truncate_at_sentence_boundary(text, 4);
        assert_eq!(truncated, "Short one.");
    }

    #[test]
    fn truncate_hard_cuts_when_no_boundary_fits() {
        let text = "a".repeat(500);
        let truncated = truncate_at_sentence_boundary(&text, 2);
        assert!(truncated.len() <= 8);
    }

    #[tokio::test]
    async fn reconcile_uri_reenqueues_when_agfs_has_content_but_index_is_missing() {
        let vfs = Arc::new(VikingFS::new_in_memory());
        vfs.write_string("viking://resources/doc/a.md", "content").await.unwrap();
        let queue: Arc<dyn SemanticQueue> = Arc::new(crate::queue::MemoryQueue::new());
        let proc = processor(vfs.clone(), queue.clone(), Arc::new(EchoVlm));

        let drift = proc.reconcile_uri("viking://resources/doc", "viking://resources").await.unwrap();
        assert!(drift.is_some());
        assert_eq!(queue.size().await, 1);
        let claimed = queue.claim().await.unwrap().unwrap();
        assert_eq!(claimed.uri, "viking://resources/doc");
    }

    #[tokio::test]
    async fn reconcile_uri_is_noop_when_already_indexed() {
        let vfs = Arc::new(VikingFS::new_in_memory());
        vfs.write_string("viking://resources/doc/a.md", "content").await.unwrap();
        let queue: Arc<dyn SemanticQueue> = Arc::new(crate::queue::MemoryQueue::new());
        let proc = processor(vfs.clone(), queue.clone(), Arc::new(EchoVlm));
        proc.process_directory("viking://resources/doc").await.unwrap();

        let drift = proc.reconcile_uri("viking://resources/doc", "viking://resources").await.unwrap();
        assert!(drift.is_none());
        assert_eq!(queue.size().await, 0);
    }

    #[tokio::test]
    async fn reconcile_uri_is_noop_when_agfs_has_nothing() {
        let vfs = Arc::new(VikingFS::new_in_memory());
        let queue: Arc<dyn SemanticQueue> = Arc::new(crate::queue::MemoryQueue::new());
        let proc = processor(vfs.clone(), queue.clone(), Arc::new(EchoVlm));

        let drift = proc.reconcile_uri("viking://resources/ghost", "viking://resources").await.unwrap();
        assert!(drift.is_none());
        assert_eq!(queue.size().await, 0);
    }

    #[test]
    fn compose_overview_lists_every_child() {
        let children = vec![
            ChildEntry { name: "a.md".into(), is_dir: false, purpose: "about apples".into() },
            ChildEntry { name: "sub".into(), is_dir: true, purpose: "nested notes".into() },
        ];
        let overview = compose_overview("doc", &children, 50);
        assert!(overview.contains("[file] a.md"));
        assert!(overview.contains("[dir] sub"));
    }
}
