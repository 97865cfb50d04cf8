use async_trait::async_trait;
use ov_core::context::Context;
use ov_core::types::EmbedResult;

/// Scalar field patch applied without touching a record's vector, e.g.
/// after a move or a relation change.
#[derive(Debug, Clone, Default)]
pub struct FieldUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_uri: Option<String>,
    pub is_leaf: Option<bool>,
    pub active: Option<bool>,
}

/// The metadata-aware, async vector index a `Context` is upserted into.
/// Implementations own both the dense/sparse vector storage and whatever
/// scalar fields search needs to filter on.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the record for `ctx`. Returns the stored id.
    async fn upsert(&self, ctx: &Context, embedding: &EmbedResult) -> anyhow::Result<String>;

    /// Remove the record for `uri`. Idempotent: deleting a uri that isn't
    /// indexed is not an error, so retrying a failed write-then-delete
    /// never surfaces a spurious failure.
    async fn delete(&self, uri: &str) -> anyhow::Result<()>;

    /// True if `uri` has an indexed record. Used for the reconciliation
    /// checks a uri-hit on one side and a miss on the other should trigger.
    async fn contains(&self, uri: &str) -> anyhow::Result<bool>;

    /// Remove every record whose uri is `prefix` or a descendant of it.
    /// Returns the number of records removed.
    async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<usize>;

    /// Rewrite the uri (and `parent_uri`) of every record whose uri is
    /// `old_prefix` or a descendant of it, substituting `new_prefix` for
    /// `old_prefix`. Returns the number of records renamed.
    async fn rename_prefix(&self, old_prefix: &str, new_prefix: &str) -> anyhow::Result<usize>;

    /// Patch scalar fields on an existing record without touching its
    /// vector. No-op if the record doesn't exist.
    async fn update_fields(&self, uri: &str, update: FieldUpdate) -> anyhow::Result<()>;

    /// Dense (and, if configured, blended sparse) nearest-neighbor search.
    async fn search(&self, vector: &[f32], top_k: usize) -> anyhow::Result<Vec<(String, f32)>>;

    /// Search restricted to direct children of `parent_uri`.
    async fn search_by_parent(
        &self,
        parent_uri: &str,
        vector: &[f32],
        top_k: usize,
    ) -> anyhow::Result<Vec<(String, f32)>>;

    async fn ensure_collection(&self, name: &str, dimension: usize) -> anyhow::Result<()>;
}
