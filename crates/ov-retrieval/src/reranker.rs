//! Optional cross-encoder reranker (§4.K): a single scoring call, with a
//! fallback to the caller's raw vector scores on any error.

use async_trait::async_trait;

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score `docs` against `query`, order-preserving: `result[i]` scores
    /// `docs[i]`.
    async fn rerank(&self, query: &str, docs: &[String]) -> anyhow::Result<Vec<f32>>;
}

/// Rerank `docs` if `reranker` is configured and the call succeeds;
/// otherwise (no reranker, or a failed call) fall back to `raw_scores`
/// unchanged.
pub async fn rerank_or_fallback(
    reranker: Option<&dyn Reranker>,
    query: &str,
    docs: &[String],
    raw_scores: &[f32],
) -> Vec<f32> {
    if let Some(reranker) = reranker {
        match reranker.rerank(query, docs).await {
            Ok(scores) if scores.len() == raw_scores.len() => return scores,
            _ => {}
        }
    }
    raw_scores.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedReranker(Vec<f32>);
    #[async_trait]
    impl Reranker for FixedReranker {
        async fn rerank(&self, _query: &str, _docs: &[String]) -> anyhow::Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct FailingReranker;
    #[async_trait]
    impl Reranker for FailingReranker {
        async fn rerank(&self, _query: &str, _docs: &[String]) -> anyhow::Result<Vec<f32>> {
            Err(anyhow::anyhow!("model unavailable"))
        }
    }

    #[tokio::test]
    async fn no_reranker_returns_raw_scores() {
        let raw = vec![0.1, 0.9];
        let scores = rerank_or_fallback(None, "q", &["a".into(), "b".into()], &raw).await;
        assert_eq!(scores, raw);
    }

    #[tokio::test]
    async fn configured_reranker_overrides_scores() {
        let reranker = FixedReranker(vec![0.5, 0.6]);
        let raw = vec![0.1, 0.9];
        let scores = rerank_or_fallback(Some(&reranker), "q", &["a".into(), "b".into()], &raw).await;
        assert_eq!(scores, vec![0.5, 0.6]);
    }

    #[tokio::test]
    async fn failing_reranker_falls_back_to_raw() {
        let reranker = FailingReranker;
        let raw = vec![0.1, 0.9];
        let scores = rerank_or_fallback(Some(&reranker), "q", &["a".into(), "b".into()], &raw).await;
        assert_eq!(scores, raw);
    }
}
