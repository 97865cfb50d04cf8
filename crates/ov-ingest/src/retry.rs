//! Shared request-level retry helper: exponential backoff `1s, 4s, 15s`
//! for transient VLM/embedder errors (§4.G/§4.H), independent of the
//! queue's message-level attempt counter in `queue.rs`.

use std::future::Future;
use std::time::Duration;

pub const DEFAULT_BACKOFF: [Duration; 3] =
    [Duration::from_secs(1), Duration::from_secs(4), Duration::from_secs(15)];

/// Run `op`, retrying while `is_retryable(&err)` holds, sleeping `backoff[i]`
/// between attempts. `backoff` has one delay per retry, so `backoff.len() +
/// 1` is the total number of attempts. An empty `backoff` makes this a
/// single, non-retrying call — handy in tests that want instant failure.
pub async fn retry_with_backoff<T, E, F, Fut>(
    backoff: &[Duration],
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    for delay in backoff {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if is_retryable(&e) => tokio::time::sleep(*delay).await,
            Err(e) => return Err(e),
        }
    }
    op().await
}
