//! `SemanticQueue`: the durable-enough-for-one-process work queue the
//! TreeBuilder feeds and the `SemanticProcessor` drains.
//!
//! Scheduling lives here, not in a backend: a message for `uri = D` is
//! eligible only once every strict descendant directory either has no
//! outstanding message or has already completed. `MemoryQueue` keeps every
//! message in a single map and recomputes eligibility by scanning it, which
//! is fine at the scale a single ingestion run produces.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ov_core::error::{OvError, Result};
use ov_core::types::{SemanticMsg, SemanticStatus};

pub const MAX_ATTEMPTS: u32 = 3;

/// A directory's message is a strict descendant of another if its uri sits
/// below it in the namespace (not equal).
fn is_strict_descendant(candidate_uri: &str, ancestor_uri: &str) -> bool {
    if candidate_uri == ancestor_uri {
        return false;
    }
    candidate_uri
        .strip_prefix(ancestor_uri)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
pub trait SemanticQueue: Send + Sync {
    async fn enqueue(&self, msg: SemanticMsg) -> Result<()>;

    /// Claim the next eligible message (bottom-up: greatest depth first,
    /// then smallest `enqueued_seq`), marking it `processing` and bumping
    /// `attempts`. Returns `None` if nothing is currently claimable.
    async fn claim(&self) -> Result<Option<SemanticMsg>>;

    /// Mark a claimed message `completed`.
    async fn ack(&self, id: &str) -> Result<()>;

    /// Report a failed attempt. `retryable` messages go back to `pending`
    /// if attempts remain, else (or if not retryable) they land in
    /// `failed` permanently.
    async fn nack(&self, id: &str, retryable: bool) -> Result<SemanticStatus>;

    /// Count of messages not yet `completed` or terminally `failed`.
    async fn size(&self) -> usize;

    /// Drop every tracked message whose uri is `prefix` or a descendant of
    /// it. Returns the number removed.
    async fn purge_prefix(&self, prefix: &str) -> Result<usize>;
}

/// In-memory `SemanticQueue`. Lives for the process's lifetime; a crash
/// loses in-flight state the same way the teacher's in-process
/// `TransactionManager` does, which is acceptable for an ingestion-private
/// work queue (the `temp` scope it schedules over is also not durable).
pub struct MemoryQueue {
    messages: Mutex<HashMap<String, SemanticMsg>>,
    seq: AtomicU64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self { messages: Mutex::new(HashMap::new()), seq: AtomicU64::new(0) }
    }

    /// Next sequence number for a batch of messages enqueued together,
    /// e.g. by the TreeBuilder for one ingested document.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SemanticQueue for MemoryQueue {
    async fn enqueue(&self, msg: SemanticMsg) -> Result<()> {
        self.messages.lock().unwrap().insert(msg.id.clone(), msg);
        Ok(())
    }

    async fn claim(&self) -> Result<Option<SemanticMsg>> {
        let mut messages = self.messages.lock().unwrap();
        let snapshot: Vec<(String, String, SemanticStatus)> = messages
            .values()
            .map(|m| (m.id.clone(), m.uri.clone(), m.status))
            .collect();

        let mut candidate: Option<String> = None;
        let mut best_depth = i64::MIN;
        let mut best_seq = u64::MAX;
        for msg in messages.values() {
            if msg.status != SemanticStatus::Pending {
                continue;
            }
            let blocked = snapshot.iter().any(|(other_id, other_uri, other_status)| {
                other_id != &msg.id
                    && is_strict_descendant(other_uri, &msg.uri)
                    && !matches!(other_status, SemanticStatus::Completed | SemanticStatus::Failed)
            });
            if blocked {
                continue;
            }
            if msg.depth > best_depth || (msg.depth == best_depth && msg.enqueued_seq < best_seq) {
                best_depth = msg.depth;
                best_seq = msg.enqueued_seq;
                candidate = Some(msg.id.clone());
            }
        }

        match candidate {
            Some(id) => {
                let msg = messages.get_mut(&id).unwrap();
                msg.status = SemanticStatus::Processing;
                msg.attempts += 1;
                Ok(Some(msg.clone()))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, id: &str) -> Result<()> {
        let mut messages = self.messages.lock().unwrap();
        let msg = messages
            .get_mut(id)
            .ok_or_else(|| OvError::not_found(format!("queue message:{id}")))?;
        msg.status = SemanticStatus::Completed;
        Ok(())
    }

    async fn nack(&self, id: &str, retryable: bool) -> Result<SemanticStatus> {
        let mut messages = self.messages.lock().unwrap();
        let msg = messages
            .get_mut(id)
            .ok_or_else(|| OvError::not_found(format!("queue message:{id}")))?;
        msg.status = if retryable && msg.attempts < MAX_ATTEMPTS {
            SemanticStatus::Pending
        } else {
            SemanticStatus::Failed
        };
        Ok(msg.status)
    }

    async fn size(&self) -> usize {
        self.messages
            .lock()
            .unwrap()
            .values()
            .filter(|m| !matches!(m.status, SemanticStatus::Completed | SemanticStatus::Failed))
            .count()
    }

    async fn purge_prefix(&self, prefix: &str) -> Result<usize> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|_, m| m.uri != prefix && !is_strict_descendant(&m.uri, prefix));
        Ok(before - messages.len())
    }
}
