//! Query-side pipeline: turn a user query into zero or more `TypedQuery`
//! items (`intent`), resolve each into ranked `MatchedContext` (`retriever`),
//! optionally sharpened by a cross-encoder (`reranker`).

pub mod intent;
pub mod reranker;
pub mod retriever;

pub use intent::{IntentAnalyzer, Llm};
pub use reranker::{rerank_or_fallback, Reranker};
pub use retriever::{HierarchicalRetriever, QueryEmbedder, RetrieverConfig};

use std::sync::Arc;

use ov_core::error::{OvError, Result};
use ov_core::types::MatchedContext;
use ov_storage::VikingFS;
use ov_vectordb::VectorIndex;

const DEFAULT_TOP_K: usize = 10;

/// Wires the Intent Analyzer and Hierarchical Retriever together for the
/// two CLI-facing operations: `find` (single scoped query, no LLM
/// analysis) and `search` (full session-aware intent analysis,
/// multi-query retrieval, reranking when configured).
pub struct RetrievalService {
    analyzer: IntentAnalyzer,
    retriever: HierarchicalRetriever,
}

impl RetrievalService {
    pub fn new(analyzer: IntentAnalyzer, retriever: HierarchicalRetriever) -> Self {
        Self { analyzer, retriever }
    }

    /// Single typed-query retrieval against an explicit scope, never
    /// reranked even if a reranker is configured.
    pub async fn find(&self, text: &str, context_type: &str, top_k: Option<usize>) -> Result<Vec<MatchedContext>> {
        let query = ov_core::types::TypedQuery::new(text, context_type, "find", 3);
        self.retriever
            .retrieve(&query, top_k.unwrap_or(DEFAULT_TOP_K), false)
            .await
            .map_err(OvError::Other)
    }

    /// Full session-aware search: analyze intent into 0-5 typed queries,
    /// retrieve each (reranked when configured), merge by descending
    /// score.
    pub async fn search(
        &self,
        session_summary: &str,
        messages: &[String],
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<MatchedContext>> {
        let typed_queries = self.analyzer.analyze(session_summary, messages, query).await.map_err(OvError::Other)?;
        let top_k = top_k.unwrap_or(DEFAULT_TOP_K);

        let mut merged: Vec<MatchedContext> = Vec::new();
        for tq in &typed_queries {
            let matches = self.retriever.retrieve(tq, top_k, true).await.map_err(OvError::Other)?;
            merged.extend(matches);
        }
        merged.sort_by(|a, b| b.score.total_cmp(&a.score));
        merged.dedup_by(|a, b| a.uri == b.uri);
        merged.truncate(top_k);
        Ok(merged)
    }
}

/// Convenience constructor mirroring the shape ingestion's `lib.rs`
/// exposes — collaborators built elsewhere, wired here.
pub fn service(
    vfs: Arc<VikingFS>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn QueryEmbedder>,
    reranker: Option<Arc<dyn Reranker>>,
    llm: Arc<dyn Llm>,
    config: RetrieverConfig,
) -> RetrievalService {
    let analyzer = IntentAnalyzer::new(llm);
    let retriever = HierarchicalRetriever::new(vfs, index, embedder, reranker, config);
    RetrievalService::new(analyzer, retriever)
}
