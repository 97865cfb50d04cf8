//! Metadata-aware [`VectorIndex`] backing a single [`Context`] collection.
//!
//! Wraps a [`Collection`] and blends dense ANN search with a sparse
//! dot-product score, the way the schema's `sparse_vector` field is meant
//! to be used (`sparse_weight` in `0..=1`, default `0.0` — dense only).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ov_core::context::Context;
use ov_core::types::EmbedResult;
use serde_json::{json, Value};

use crate::collection::Collection;
use crate::traits::{FieldUpdate, VectorIndex};

/// An ANN index over `Context` records, scored as
/// `(1 - sparse_weight) * dense_score + sparse_weight * sparse_score`.
pub struct ContextVectorIndex {
    collection: Arc<Collection>,
    index_name: String,
    sparse_weight: f32,
}

impl ContextVectorIndex {
    pub fn new(collection: Arc<Collection>, index_name: impl Into<String>, sparse_weight: f32) -> Self {
        Self {
            collection,
            index_name: index_name.into(),
            sparse_weight: sparse_weight.clamp(0.0, 1.0),
        }
    }

    fn sparse_score(query: &HashMap<String, f32>, candidate: &HashMap<String, f32>) -> f32 {
        query
            .iter()
            .filter_map(|(k, qv)| candidate.get(k).map(|cv| qv * cv))
            .sum()
    }
}

fn context_to_fields(ctx: &Context, dense: &[f32]) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), json!(ctx.id.to_string()));
    fields.insert("uri".to_string(), json!(ctx.uri));
    fields.insert("type".to_string(), json!(ctx.context_type.as_str()));
    fields.insert("context_type".to_string(), json!(ctx.category));
    fields.insert(
        "vector".to_string(),
        Value::Array(dense.iter().map(|f| json!(f)).collect()),
    );
    if let Some(sparse) = &ctx.sparse_vector {
        fields.insert("sparse_vector".to_string(), json!(sparse));
    }
    fields.insert("created_at".to_string(), json!(ctx.created_at.to_rfc3339()));
    fields.insert("updated_at".to_string(), json!(ctx.updated_at.to_rfc3339()));
    fields.insert("active_count".to_string(), json!(ctx.active_count));
    fields.insert(
        "parent_uri".to_string(),
        json!(ctx.parent_uri.clone().unwrap_or_default()),
    );
    fields.insert("is_leaf".to_string(), json!(ctx.is_leaf));
    fields.insert("name".to_string(), json!(ctx.name));
    fields.insert("description".to_string(), json!(ctx.description));
    fields.insert("tags".to_string(), json!(Vec::<String>::new()));
    fields.insert("abstract".to_string(), json!(ctx.abstract_text));
    fields
}

#[async_trait]
impl VectorIndex for ContextVectorIndex {
    async fn upsert(&self, ctx: &Context, embedding: &EmbedResult) -> anyhow::Result<String> {
        let dense = embedding.dense_vector.clone().unwrap_or_default();
        let fields = context_to_fields(ctx, &dense);
        let result = self.collection.upsert_data(&[fields])?;
        Ok(result
            .ids
            .first()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .unwrap_or_else(|| ctx.uri.clone()))
    }

    async fn delete(&self, uri: &str) -> anyhow::Result<()> {
        self.collection.delete_data(&[json!(uri)]);
        Ok(())
    }

    async fn contains(&self, uri: &str) -> anyhow::Result<bool> {
        Ok(self.collection.fetch_data(&[json!(uri)])[0].is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<usize> {
        Ok(self.collection.delete_prefix("uri", prefix))
    }

    async fn rename_prefix(&self, old_prefix: &str, new_prefix: &str) -> anyhow::Result<usize> {
        Ok(self.collection.rename_prefix(old_prefix, new_prefix))
    }

    async fn update_fields(&self, uri: &str, update: FieldUpdate) -> anyhow::Result<()> {
        let mut patch = HashMap::new();
        if let Some(name) = update.name {
            patch.insert("name".to_string(), json!(name));
        }
        if let Some(description) = update.description {
            patch.insert("description".to_string(), json!(description));
        }
        if let Some(parent_uri) = update.parent_uri {
            patch.insert("parent_uri".to_string(), json!(parent_uri));
        }
        if let Some(is_leaf) = update.is_leaf {
            patch.insert("is_leaf".to_string(), json!(is_leaf));
        }
        if let Some(active) = update.active {
            patch.insert("active".to_string(), json!(active));
        }
        self.collection.update_fields(&json!(uri), patch);
        Ok(())
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> anyhow::Result<Vec<(String, f32)>> {
        self.search_filtered(vector, top_k, None).await
    }

    async fn search_by_parent(
        &self,
        parent_uri: &str,
        vector: &[f32],
        top_k: usize,
    ) -> anyhow::Result<Vec<(String, f32)>> {
        let filter = json!({ "must": [{ "field": "parent_uri", "eq": parent_uri }] });
        self.search_filtered(vector, top_k, Some(&filter)).await
    }

    async fn ensure_collection(&self, _name: &str, _dimension: usize) -> anyhow::Result<()> {
        if !self.collection.has_index(&self.index_name) {
            self.collection
                .create_index(&self.index_name, crate::collection::IndexConfig::default())?;
        }
        Ok(())
    }
}

impl ContextVectorIndex {
    async fn search_filtered(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Value>,
    ) -> anyhow::Result<Vec<(String, f32)>> {
        let over_fetch = if self.sparse_weight > 0.0 { top_k * 4 } else { top_k };
        let result = self
            .collection
            .search_by_vector(&self.index_name, vector, over_fetch, 0, filter)?;

        let mut scored: Vec<(String, f32)> = result
            .data
            .into_iter()
            .map(|item| {
                let uri = item
                    .fields
                    .get("uri")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                (uri, item.score)
            })
            .collect();
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Hybrid dense+sparse search, used by the embedding pipeline when a
    /// sparse query vector is available.
    pub async fn hybrid_search(
        &self,
        dense: &[f32],
        sparse: &HashMap<String, f32>,
        top_k: usize,
    ) -> anyhow::Result<Vec<(String, f32)>> {
        if self.sparse_weight <= 0.0 {
            return self.search(dense, top_k).await;
        }
        let over_fetch = top_k * 4;
        let result = self
            .collection
            .search_by_vector(&self.index_name, dense, over_fetch, 0, None)?;

        let mut scored: Vec<(String, f32)> = result
            .data
            .into_iter()
            .map(|item| {
                let uri = item
                    .fields
                    .get("uri")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let candidate_sparse: HashMap<String, f32> = item
                    .fields
                    .get("sparse_vector")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default();
                let sparse_score = Self::sparse_score(sparse, &candidate_sparse);
                let blended = (1.0 - self.sparse_weight) * item.score + self.sparse_weight * sparse_score;
                (uri, blended)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{CollectionConfig, FieldDef, FieldType};

    fn make_collection(dim: usize) -> Arc<Collection> {
        let cfg = CollectionConfig {
            name: "ctx".into(),
            description: String::new(),
            fields: vec![
                FieldDef { name: "uri".into(), field_type: FieldType::String, is_primary_key: true, dim: None },
                FieldDef { name: "vector".into(), field_type: FieldType::Vector, is_primary_key: false, dim: Some(dim) },
            ],
        };
        let coll = Arc::new(Collection::new(cfg));
        coll.create_index("main", crate::collection::IndexConfig::default()).unwrap();
        coll
    }

    fn sample_ctx(uri: &str) -> Context {
        Context::new(uri.to_string(), "note")
    }

    #[tokio::test]
    async fn upsert_then_search_finds_record() {
        let coll = make_collection(3);
        let index = ContextVectorIndex::new(coll, "main", 0.0);
        let ctx = sample_ctx("viking://resources/a");
        let embed = EmbedResult { dense_vector: Some(vec![1.0, 0.0, 0.0]), sparse_vector: None };
        index.upsert(&ctx, &embed).await.unwrap();
        let results = index.search(&[1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(results[0].0, "viking://resources/a");
    }

    #[tokio::test]
    async fn delete_prefix_removes_descendants() {
        let coll = make_collection(3);
        let index = ContextVectorIndex::new(coll, "main", 0.0);
        for uri in ["viking://resources/a", "viking://resources/a/b", "viking://resources/c"] {
            let ctx = sample_ctx(uri);
            let embed = EmbedResult { dense_vector: Some(vec![1.0, 0.0, 0.0]), sparse_vector: None };
            index.upsert(&ctx, &embed).await.unwrap();
        }
        let removed = index.delete_prefix("viking://resources/a").await.unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn contains_reflects_indexed_state() {
        let coll = make_collection(3);
        let index = ContextVectorIndex::new(coll, "main", 0.0);
        assert!(!index.contains("viking://resources/a").await.unwrap());
        let ctx = sample_ctx("viking://resources/a");
        let embed = EmbedResult { dense_vector: Some(vec![1.0, 0.0, 0.0]), sparse_vector: None };
        index.upsert(&ctx, &embed).await.unwrap();
        assert!(index.contains("viking://resources/a").await.unwrap());
    }

    #[tokio::test]
    async fn rename_prefix_moves_records_and_rewrites_parent_uri() {
        let coll = make_collection(3);
        let index = ContextVectorIndex::new(coll, "main", 0.0);
        let embed = EmbedResult { dense_vector: Some(vec![1.0, 0.0, 0.0]), sparse_vector: None };
        let parent = sample_ctx("viking://resources/Auth_Guide");
        index.upsert(&parent, &embed).await.unwrap();
        let mut child = sample_ctx("viking://resources/Auth_Guide/setup");
        child.parent_uri = Some("viking://resources/Auth_Guide".to_string());
        index.upsert(&child, &embed).await.unwrap();

        let renamed = index
            .rename_prefix("viking://resources/Auth_Guide", "viking://resources/Authentication")
            .await
            .unwrap();
        assert_eq!(renamed, 2);

        let results = index.search(&[1.0, 0.0, 0.0], 5).await.unwrap();
        let uris: Vec<_> = results.iter().map(|(u, _)| u.as_str()).collect();
        assert!(uris.contains(&"viking://resources/Authentication"));
        assert!(uris.contains(&"viking://resources/Authentication/setup"));
        assert!(!uris.iter().any(|u| u.starts_with("viking://resources/Auth_Guide")));
    }

    #[tokio::test]
    async fn update_fields_leaves_vector_intact() {
        let coll = make_collection(3);
        let index = ContextVectorIndex::new(coll, "main", 0.0);
        let ctx = sample_ctx("viking://resources/a");
        let embed = EmbedResult { dense_vector: Some(vec![0.0, 1.0, 0.0]), sparse_vector: None };
        index.upsert(&ctx, &embed).await.unwrap();
        index
            .update_fields("viking://resources/a", FieldUpdate { name: Some("renamed".into()), ..Default::default() })
            .await
            .unwrap();
        let results = index.search(&[0.0, 1.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].0, "viking://resources/a");
    }

    #[tokio::test]
    async fn search_by_parent_restricts_results() {
        let coll = make_collection(3);
        let index = ContextVectorIndex::new(coll, "main", 0.0);
        let mut child = sample_ctx("viking://resources/parent/child");
        child.parent_uri = Some("viking://resources/parent".to_string());
        let embed = EmbedResult { dense_vector: Some(vec![1.0, 0.0, 0.0]), sparse_vector: None };
        index.upsert(&child, &embed).await.unwrap();
        let mut other = sample_ctx("viking://resources/other/child");
        other.parent_uri = Some("viking://resources/other".to_string());
        index.upsert(&other, &embed).await.unwrap();

        let results = index
            .search_by_parent("viking://resources/parent", &[1.0, 0.0, 0.0], 5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "viking://resources/parent/child");
    }

    #[test]
    fn hybrid_sparse_score_is_dot_product() {
        let mut a = HashMap::new();
        a.insert("tok1".to_string(), 1.0f32);
        a.insert("tok2".to_string(), 2.0f32);
        let mut b = HashMap::new();
        b.insert("tok1".to_string(), 3.0f32);
        let score = ContextVectorIndex::sparse_score(&a, &b);
        assert_eq!(score, 3.0);
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let cfg = CollectionConfig {
            name: "ctx".into(),
            description: String::new(),
            fields: vec![FieldDef { name: "uri".into(), field_type: FieldType::String, is_primary_key: true, dim: None }],
        };
        let coll = Arc::new(Collection::new(cfg));
        let index = ContextVectorIndex::new(coll, "main", 0.0);
        index.ensure_collection("ctx", 3).await.unwrap();
        index.ensure_collection("ctx", 3).await.unwrap();
    }
}
