//! Batched dense/sparse embedding, grounded on `ov-vectordb::collection`'s
//! batch-upsert conventions and scored at query time through
//! `ContextVectorIndex::hybrid_search`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ov_core::error::{OvError, Result};
use ov_core::types::EmbedResult;

use crate::retry::{retry_with_backoff, DEFAULT_BACKOFF};

/// Which vector kinds a pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    Dense,
    Sparse,
    Hybrid,
}

#[async_trait]
pub trait DenseEmbedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait SparseEmbedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<HashMap<String, f32>>>;
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

/// Batches calls to the configured embedder(s), L2-normalizing dense
/// vectors when `normalize` is set, and retrying transient backend errors
/// with the same backoff as the VLM calls in `processor.rs`.
pub struct EmbeddingPipeline {
    dense: Option<Arc<dyn DenseEmbedder>>,
    sparse: Option<Arc<dyn SparseEmbedder>>,
    mode: EmbeddingMode,
    batch_size: usize,
    normalize: bool,
}

impl EmbeddingPipeline {
    pub fn new(
        dense: Option<Arc<dyn DenseEmbedder>>,
        sparse: Option<Arc<dyn SparseEmbedder>>,
        mode: EmbeddingMode,
        batch_size: usize,
        normalize: bool,
    ) -> Self {
        Self { dense, sparse, mode, batch_size: batch_size.max(1), normalize }
    }

    pub async fn embed_one(&self, text: &str) -> Result<EmbedResult> {
        let mut results = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        Ok(results.pop().unwrap_or_default())
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbedResult>> {
        let mut out = vec![EmbedResult::default(); texts.len()];

        if matches!(self.mode, EmbeddingMode::Dense | EmbeddingMode::Hybrid) {
            let embedder = self
                .dense
                .as_ref()
                .ok_or_else(|| OvError::InvalidInput("no dense embedder configured".into()))?;
            for (batch_idx, chunk) in texts.chunks(self.batch_size).enumerate() {
                let vectors = retry_with_backoff(&DEFAULT_BACKOFF, OvError::is_retryable, || {
                    embedder.embed_batch(chunk)
                })
                .await?;
                for (i, v) in vectors.into_iter().enumerate() {
                    let v = if self.normalize { l2_normalize(v) } else { v };
                    out[batch_idx * self.batch_size + i].dense_vector = Some(v);
                }
            }
        }

        if matches!(self.mode, EmbeddingMode::Sparse | EmbeddingMode::Hybrid) {
            let embedder = self
                .sparse
                .as_ref()
                .ok_or_else(|| OvError::InvalidInput("no sparse embedder configured".into()))?;
            for (batch_idx, chunk) in texts.chunks(self.batch_size).enumerate() {
                let vectors = retry_with_backoff(&DEFAULT_BACKOFF, OvError::is_retryable, || {
                    embedder.embed_batch(chunk)
                })
                .await?;
                for (i, v) in vectors.into_iter().enumerate() {
                    out[batch_idx * self.batch_size + i].sparse_vector = Some(v);
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDense;
    #[async_trait]
    impl DenseEmbedder for FixedDense {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![3.0, 4.0]).collect())
        }
    }

    struct FixedSparse;
    #[async_trait]
    impl SparseEmbedder for FixedSparse {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<HashMap<String, f32>>> {
            Ok(texts.iter().map(|_| HashMap::from([("tok".to_string(), 1.0)])).collect())
        }
    }

    struct FlakyDense {
        calls: AtomicUsize,
    }
    #[async_trait]
    impl DenseEmbedder for FlakyDense {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(OvError::TransientBackend("rate limited".into()))
            } else {
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
        }
    }

    #[tokio::test]
    async fn dense_mode_normalizes_vectors() {
        let pipeline = EmbeddingPipeline::new(
            Some(Arc::new(FixedDense)),
            None,
            EmbeddingMode::Dense,
            16,
            true,
        );
        let r = pipeline.embed_one("hello").await.unwrap();
        let v = r.dense_vector.unwrap();
        let norm = (v[0] * v[0] + v[1] * v[1]).sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!(r.sparse_vector.is_none());
    }

    #[tokio::test]
    async fn hybrid_mode_fills_both_vectors() {
        let pipeline = EmbeddingPipeline::new(
            Some(Arc::new(FixedDense)),
            Some(Arc::new(FixedSparse)),
            EmbeddingMode::Hybrid,
            16,
            false,
        );
        let r = pipeline.embed_one("hello").await.unwrap();
        assert!(r.dense_vector.is_some());
        assert!(r.sparse_vector.is_some());
    }

    #[tokio::test]
    async fn batches_respect_batch_size() {
        let pipeline =
            EmbeddingPipeline::new(Some(Arc::new(FixedDense)), None, EmbeddingMode::Dense, 2, false);
        let texts: Vec<String> = (0..5).map(|i| format!("t{i}")).collect();
        let results = pipeline.embed_batch(&texts).await.unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.dense_vector.is_some()));
    }

    #[tokio::test]
    async fn transient_embedder_error_is_retried() {
        let pipeline = EmbeddingPipeline::new(
            Some(Arc::new(FlakyDense { calls: AtomicUsize::new(0) })),
            None,
            EmbeddingMode::Dense,
            16,
            false,
        );
        let r = pipeline.embed_one("hello").await.unwrap();
        assert!(r.dense_vector.is_some());
    }

    #[tokio::test]
    async fn sparse_mode_without_embedder_errors() {
        let pipeline = EmbeddingPipeline::new(None, None, EmbeddingMode::Sparse, 16, false);
        assert!(pipeline.embed_one("hello").await.is_err());
    }
}
