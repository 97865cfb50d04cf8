//! Transaction manager for atomic, multi-step operations over `VikingFS`.
//!
//! This tracks in-process transaction state (`TransactionRecord`) through
//! the lifecycle `Init -> Acquire -> Exec -> {Commit | Fail} -> Releasing ->
//! Released`. It does not persist across process restarts; `recover`
//! surfaces transactions left in a non-terminal state (e.g. after a panic)
//! so a caller can decide whether to retry or surface a `ConsistencyDrift`.

use ov_core::error::{OvError, Result};
use ov_core::types::{TransactionRecord, TransactionStatus};
use std::collections::HashMap;
use std::sync::Mutex;

fn now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs_f64()
}

pub struct TransactionManager {
    active: Mutex<HashMap<String, TransactionRecord>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self { active: Mutex::new(HashMap::new()) }
    }

    pub fn begin(&self) -> TransactionRecord {
        let record = TransactionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            locks: Vec::new(),
            status: TransactionStatus::Init,
            init_info: HashMap::new(),
            rollback_info: HashMap::new(),
            created_at: now(),
            updated_at: now(),
        };
        self.active.lock().unwrap().insert(record.id.clone(), record.clone());
        record
    }

    fn update<F>(&self, id: &str, f: F) -> Result<TransactionRecord>
    where
        F: FnOnce(&mut TransactionRecord),
    {
        let mut active = self.active.lock().unwrap();
        let record = active
            .get_mut(id)
            .ok_or_else(|| OvError::not_found(format!("transaction:{id}")))?;
        f(record);
        record.updated_at = now();
        Ok(record.clone())
    }

    /// Record the lock set a transaction holds before executing its body.
    pub fn acquire(&self, id: &str, locks: Vec<String>) -> Result<TransactionRecord> {
        self.update(id, |r| {
            r.locks = locks;
            r.status = TransactionStatus::Acquire;
        })
    }

    /// Mark a transaction as running its body.
    pub fn mark_executing(&self, id: &str) -> Result<TransactionRecord> {
        self.update(id, |r| r.status = TransactionStatus::Exec)
    }

    /// Mark a transaction committed. Still holds its locks until `release`.
    pub fn commit(&self, id: &str) -> Result<TransactionRecord> {
        self.update(id, |r| r.status = TransactionStatus::Commit)
    }

    /// Mark a transaction failed, recording enough to retry or diagnose.
    pub fn rollback(&self, id: &str, rollback_info: HashMap<String, serde_json::Value>) -> Result<TransactionRecord> {
        self.update(id, |r| {
            r.rollback_info = rollback_info;
            r.status = TransactionStatus::Fail;
        })
    }

    /// Release a transaction's locks and drop it from the active set.
    /// Transactions must have reached `Commit` or `Fail` first.
    pub fn release(&self, id: &str) -> Result<TransactionRecord> {
        self.update(id, |r| r.status = TransactionStatus::Releasing)?;
        let mut active = self.active.lock().unwrap();
        let mut record = active
            .remove(id)
            .ok_or_else(|| OvError::not_found(format!("transaction:{id}")))?;
        record.status = TransactionStatus::Released;
        record.updated_at = now();
        Ok(record)
    }

    /// Transactions still tracked in a non-terminal state — a crash
    /// between `acquire` and `release` leaves one of these behind. A
    /// caller restarting after a crash should inspect these before trusting
    /// the locks they claim to hold are actually still meaningful.
    pub fn recover(&self) -> Vec<TransactionRecord> {
        self.active
            .lock()
            .unwrap()
            .values()
            .filter(|r| !matches!(r.status, TransactionStatus::Released))
            .cloned()
            .collect()
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
