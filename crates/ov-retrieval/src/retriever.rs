//! Hierarchical Retriever (§4.J): maps a `TypedQuery` to root URIs, seeds
//! from a global search, then walks down via a max-priority queue with
//! score propagation until convergence.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use ov_core::types::{MatchedContext, RelatedContext, TypedQuery};
use ov_storage::VikingFS;
use ov_vectordb::VectorIndex;

use crate::reranker::{rerank_or_fallback, Reranker};

pub const GLOBAL_SEARCH_TOPK: usize = 3;
pub const SCORE_PROPAGATION_ALPHA: f32 = 0.5;
pub const MAX_CONVERGENCE_ROUNDS: usize = 3;
pub const MAX_RELATIONS: usize = 5;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.3;
pub const DEFAULT_CHILD_K: usize = 8;
pub const DEFAULT_RETRIEVER_PARALLEL_CHILDREN: usize = 8;

/// Turns query text into the dense vector the index is searched with.
/// Kept distinct from `ov-ingest`'s embedding pipeline so retrieval has no
/// dependency on the ingestion crate.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

fn roots_for(context_type: &str) -> Vec<&'static str> {
    match context_type {
        "memory" => vec!["viking://user/memories", "viking://agent/memories"],
        "skill" => vec!["viking://agent/skills"],
        _ => vec!["viking://resources"],
    }
}

/// `(score, depth, uri)` ordered so a `BinaryHeap` pops highest score
/// first, then shallower depth, then lexicographically smaller uri.
#[derive(Debug, Clone)]
struct QueueItem {
    score: f32,
    depth: usize,
    uri: String,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.depth == other.depth && self.uri == other.uri
    }
}
impl Eq for QueueItem {}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.depth.cmp(&self.depth))
            .then_with(|| other.uri.cmp(&self.uri))
    }
}
impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct RetrieverConfig {
    pub score_threshold: f32,
    pub child_k: usize,
    pub parallel_children: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            child_k: DEFAULT_CHILD_K,
            parallel_children: DEFAULT_RETRIEVER_PARALLEL_CHILDREN,
        }
    }
}

pub struct HierarchicalRetriever {
    vfs: Arc<VikingFS>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn QueryEmbedder>,
    reranker: Option<Arc<dyn Reranker>>,
    config: RetrieverConfig,
}

struct Collected {
    uri: String,
    score: f32,
    is_leaf: bool,
}

impl HierarchicalRetriever {
    pub fn new(
        vfs: Arc<VikingFS>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn QueryEmbedder>,
        reranker: Option<Arc<dyn Reranker>>,
        config: RetrieverConfig,
    ) -> Self {
        Self { vfs, index, embedder, reranker, config }
    }

    /// Retrieve up to `top_k` matches for `query`. `use_reranker` gates
    /// whether a configured reranker is actually invoked — callers doing
    /// single typed-query `find` pass `false`; the multi-query `search`
    /// orchestration passes `true`.
    pub async fn retrieve(
        &self,
        query: &TypedQuery,
        top_k: usize,
        use_reranker: bool,
    ) -> anyhow::Result<Vec<MatchedContext>> {
        let query_vector = self.embedder.embed_query(&query.text).await?;
        let roots = roots_for(&query.context_type);

        let seeds = self.select_seeds(&roots, &query.text, &query_vector, use_reranker).await?;
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let mut collected: Vec<Collected> = Vec::new();
        let mut queue: BinaryHeap<QueueItem> = BinaryHeap::new();
        for (uri, score) in &seeds {
            let is_leaf = self.is_leaf_uri(uri).await;
            if is_leaf {
                collected.push(Collected { uri: uri.clone(), score: *score, is_leaf: true });
            }
            queue.push(QueueItem { score: *score, depth: depth_of(uri), uri: uri.clone() });
        }

        let mut recent_top_k_sets: Vec<HashSet<String>> = Vec::new();
        let mut stable_rounds = 0;

        while !queue.is_empty() && stable_rounds < MAX_CONVERGENCE_ROUNDS {
            let mut batch = Vec::new();
            while batch.len() < self.config.parallel_children {
                match queue.pop() {
                    Some(item) => batch.push(item),
                    None => break,
                }
            }
            if batch.is_empty() {
                break;
            }

            let mut join_set = tokio::task::JoinSet::new();
            for item in batch.iter().cloned() {
                let index = self.index.clone();
                let vector = query_vector.clone();
                let child_k = self.config.child_k;
                join_set.spawn(async move {
                    let result = index.search_by_parent(&item.uri, &vector, child_k).await;
                    (item, result)
                });
            }
            let mut results = Vec::with_capacity(batch.len());
            while let Some(joined) = join_set.join_next().await {
                if let Ok(pair) = joined {
                    results.push(pair);
                }
            }

            for (item, result) in results {
                let children = match result {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                let mut below_threshold_all = true;
                for (child_uri, e_i) in children {
                    let final_score = SCORE_PROPAGATION_ALPHA * e_i + (1.0 - SCORE_PROPAGATION_ALPHA) * item.score;
                    if final_score >= self.config.score_threshold {
                        below_threshold_all = false;
                        let is_leaf = self.is_leaf_uri(&child_uri).await;
                        collected.push(Collected { uri: child_uri.clone(), score: final_score, is_leaf });
                        if !is_leaf {
                            queue.push(QueueItem { score: final_score, depth: depth_of(&child_uri), uri: child_uri });
                        }
                    }
                }
                if below_threshold_all && item.score >= self.config.score_threshold {
                    collected.push(Collected { uri: item.uri.clone(), score: item.score, is_leaf: false });
                }
            }

            let top_k_set: HashSet<String> = top_ranked(&collected, top_k).into_iter().collect();
            if recent_top_k_sets.last() == Some(&top_k_set) {
                stable_rounds += 1;
            } else {
                stable_rounds = 0;
            }
            recent_top_k_sets.push(top_k_set);
        }

        let ranked_uris = top_ranked(&collected, top_k);
        let mut out = Vec::with_capacity(ranked_uris.len());
        for uri in ranked_uris {
            let Some(c) = collected.iter().filter(|c| c.uri == uri).max_by(|a, b| a.score.total_cmp(&b.score)) else { continue };
            if !self.vfs.exists(&uri).await {
                // Index-hit, AGFS-miss: the record outlived its content (a
                // crash between an `rm` and the vector delete it implies, or
                // a manual AGFS edit). Evict it so the next search doesn't
                // surface the same dangling hit.
                tracing::warn!(uri = %uri, "dropping stale vector record with no backing content");
                let _ = self.index.delete(&uri).await;
                continue;
            }
            let abstract_text = self.vfs.abstract_text(&uri).await.unwrap_or_default();
            let context_type = derive_context_type(&uri);
            let relations = self.attach_relations(&uri).await;
            out.push(MatchedContext {
                uri,
                context_type,
                is_leaf: c.is_leaf,
                r#abstract: abstract_text,
                score: c.score,
                relations,
            });
        }
        Ok(out)
    }

    async fn select_seeds(
        &self,
        roots: &[&str],
        query_text: &str,
        query_vector: &[f32],
        use_reranker: bool,
    ) -> anyhow::Result<Vec<(String, f32)>> {
        let global_hits = self.index.search(query_vector, GLOBAL_SEARCH_TOPK).await?;
        let mut seeds: Vec<(String, f32)> = global_hits
            .into_iter()
            .filter(|(uri, _)| roots.iter().any(|r| uri == r || uri.starts_with(&format!("{r}/"))))
            .collect();

        for root in roots {
            if self.vfs.exists(root).await && !seeds.iter().any(|(u, _)| u == root) {
                let baseline = seeds.iter().map(|(_, s)| *s).fold(0.0f32, f32::max) * 0.5;
                seeds.push((root.to_string(), baseline));
            }
        }

        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        if use_reranker && self.reranker.is_some() {
            let mut docs = Vec::with_capacity(seeds.len());
            for (uri, _) in &seeds {
                docs.push(self.vfs.abstract_text(uri).await.unwrap_or_default());
            }
            let raw: Vec<f32> = seeds.iter().map(|(_, s)| *s).collect();
            let scores = rerank_or_fallback(self.reranker.as_deref(), query_text, &docs, &raw).await;
            for (seed, score) in seeds.iter_mut().zip(scores.into_iter()) {
                seed.1 = score;
            }
        }

        Ok(seeds)
    }

    /// A context node is a leaf iff its AGFS directory has no subdirectory
    /// children — every context node, leaf or not, is materialized as a
    /// directory holding `.abstract.md`/`.overview.md`/content, so
    /// presence-of-a-directory alone can't distinguish leaf from internal.
    async fn is_leaf_uri(&self, uri: &str) -> bool {
        match self.vfs.ls(uri).await {
            Ok(entries) => !entries.iter().any(|e| e.is_dir),
            Err(_) => true,
        }
    }

    async fn attach_relations(&self, uri: &str) -> Vec<RelatedContext> {
        self.vfs
            .get_relations(uri)
            .await
            .unwrap_or_default()
            .into_iter()
            .take(MAX_RELATIONS)
            .collect()
    }
}

fn depth_of(uri: &str) -> usize {
    uri.trim_start_matches("viking://").split('/').count()
}

fn derive_context_type(uri: &str) -> String {
    ov_core::context::Context::derive_context_type(uri).as_str().to_string()
}

fn top_ranked(collected: &[Collected], top_k: usize) -> Vec<String> {
    let mut by_uri: std::collections::HashMap<&str, f32> = std::collections::HashMap::new();
    for c in collected {
        let entry = by_uri.entry(c.uri.as_str()).or_insert(c.score);
        if c.score > *entry {
            *entry = c.score;
        }
    }
    let mut ranked: Vec<(&str, f32)> = by_uri.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().take(top_k).map(|(u, _)| u.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ov_core::context::Context;
    use ov_core::types::EmbedResult;
    use ov_vectordb::collection::{Collection, CollectionConfig, FieldDef, FieldType, IndexConfig};
    use ov_vectordb::context_index::ContextVectorIndex;

    struct StubEmbedder;
    #[async_trait]
    impl QueryEmbedder for StubEmbedder {
        async fn embed_query(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0])
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
        coll.create_index("main", IndexConfig::default()).unwrap();
        Arc::new(ContextVectorIndex::new(coll, "main", 0.0))
    }

    #[tokio::test]
    async fn empty_index_returns_no_matches() {
        let vfs = Arc::new(VikingFS::new_in_memory());
        let index = make_index(3);
        let retriever = HierarchicalRetriever::new(
            vfs, index, Arc::new(StubEmbedder), None, RetrieverConfig::default(),
        );
        let query = TypedQuery::new("find the onboarding doc", "resource", "lookup", 3);
        let result = retriever.retrieve(&query, 5, false).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn seeded_leaf_is_returned() {
        let vfs = Arc::new(VikingFS::new_in_memory());
        vfs.mkdir("viking://resources").await.unwrap();
        vfs.write_context("viking://resources/doc", "an faq doc", "overview", Some("content"), Some("doc.md")).await.unwrap();
        let index = make_index(3);
        let ctx = Context::builder("viking://resources/doc")
            .abstract_text("an faq doc")
            .is_leaf(true)
            .parent_uri("viking://resources")
            .build();
        let embed = EmbedResult { dense_vector: Some(vec![1.0, 0.0, 0.0]), sparse_vector: None };
        index.upsert(&ctx, &embed).await.unwrap();

        let retriever = HierarchicalRetriever::new(
            vfs, index, Arc::new(StubEmbedder), None, RetrieverConfig::default(),
        );
        let query = TypedQuery::new("find the faq", "resource", "lookup", 3);
        let result = retriever.retrieve(&query, 5, false).await.unwrap();
        assert!(result.iter().any(|m| m.uri == "viking://resources/doc"));
    }

    #[tokio::test]
    async fn stale_index_record_with_no_backing_content_is_evicted() {
        let vfs = Arc::new(VikingFS::new_in_memory());
        vfs.mkdir("viking://resources").await.unwrap();
        let index = make_index(3);
        let ctx = Context::builder("viking://resources/ghost")
            .abstract_text("a doc that was deleted from AGFS")
            .is_leaf(true)
            .parent_uri("viking://resources")
            .build();
        let embed = EmbedResult { dense_vector: Some(vec![1.0, 0.0, 0.0]), sparse_vector: None };
        index.upsert(&ctx, &embed).await.unwrap();

        let retriever = HierarchicalRetriever::new(
            vfs, index.clone(), Arc::new(StubEmbedder), None, RetrieverConfig::default(),
        );
        let query = TypedQuery::new("find the ghost", "resource", "lookup", 3);
        let result = retriever.retrieve(&query, 5, false).await.unwrap();

        assert!(!result.iter().any(|m| m.uri == "viking://resources/ghost"));
        assert!(!index.contains("viking://resources/ghost").await.unwrap());
    }

    #[test]
    fn queue_item_orders_by_score_then_depth_then_uri() {
        let mut heap = BinaryHeap::new();
        heap.push(QueueItem { score: 0.5, depth: 2, uri: "viking://resources/b".into() });
        heap.push(QueueItem { score: 0.5, depth: 1, uri: "viking://resources/a".into() });
        heap.push(QueueItem { score: 0.9, depth: 3, uri: "viking://resources/c".into() });
        assert_eq!(heap.pop().unwrap().uri, "viking://resources/c");
        assert_eq!(heap.pop().unwrap().uri, "viking://resources/a");
        assert_eq!(heap.pop().unwrap().uri, "viking://resources/b");
    }

    #[test]
    fn tie_break_prefers_smaller_uri_at_equal_score_and_depth() {
        let mut heap = BinaryHeap::new();
        heap.push(QueueItem { score: 0.5, depth: 1, uri: "viking://resources/z".into() });
        heap.push(QueueItem { score: 0.5, depth: 1, uri: "viking://resources/a".into() });
        assert_eq!(heap.pop().unwrap().uri, "viking://resources/a");
    }
}
