use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Semantic extraction queue message.
///
/// `depth` is the directory depth from the ingestion root and drives the
/// bottom-up processing order: deeper messages are claimable before their
/// ancestors. `attempts` and `enqueued_seq` back the retry policy and the
/// FIFO tie-break respectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticMsg {
    pub id: String,
    pub uri: String,
    pub context_type: String,
    pub status: SemanticStatus,
    pub depth: i64,
    pub attempts: u32,
    pub enqueued_at: i64,
    pub enqueued_seq: u64,
    pub recursive: bool,
}

impl SemanticMsg {
    pub fn new(uri: impl Into<String>, context_type: impl Into<String>, depth: i64, seq: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            uri: uri.into(),
            context_type: context_type.into(),
            status: SemanticStatus::Pending,
            depth,
            attempts: 0,
            enqueued_at: chrono::Utc::now().timestamp(),
            enqueued_seq: seq,
            recursive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SemanticStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Transaction status for the VikingFS write/mv/rm consistency pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    Init,
    Acquire,
    Exec,
    Commit,
    Fail,
    Releasing,
    Released,
}

/// Transaction record used for recovery after a crash mid-operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub locks: Vec<String>,
    pub status: TransactionStatus,
    pub init_info: HashMap<String, serde_json::Value>,
    pub rollback_info: HashMap<String, serde_json::Value>,
    pub created_at: f64,
    pub updated_at: f64,
}

/// Embedding result: dense vector and, when a sparse embedder is
/// configured, a sparse term-weight map.
#[derive(Debug, Clone, Default)]
pub struct EmbedResult {
    pub dense_vector: Option<Vec<f32>>,
    pub sparse_vector: Option<HashMap<String, f32>>,
}

/// Directory definition for the preset scope/directory structure.
#[derive(Debug, Clone)]
pub struct DirectoryDefinition {
    pub path: String,
    pub abstract_text: String,
    pub overview: String,
    pub children: Vec<DirectoryDefinition>,
}

/// One query the Intent Analyzer derived from a user turn.
///
/// `priority` is 1 (lowest) to 5 (highest) and drives retrieval ordering
/// when more than one query is run for a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypedQuery {
    pub text: String,
    pub context_type: String,
    pub intent: String,
    pub priority: u8,
}

impl TypedQuery {
    pub fn new(text: impl Into<String>, context_type: impl Into<String>, intent: impl Into<String>, priority: u8) -> Self {
        Self {
            text: text.into(),
            context_type: context_type.into(),
            intent: intent.into(),
            priority: priority.clamp(1, 5),
        }
    }
}

/// A context node related to a matched one, surfaced alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelatedContext {
    pub uri: String,
    pub reason: String,
    pub created_at: i64,
}

/// A context node returned by the Hierarchical Retriever, with the score
/// it converged on and up to `MAX_RELATIONS` related nodes attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchedContext {
    pub uri: String,
    pub context_type: String,
    pub is_leaf: bool,
    pub r#abstract: String,
    pub score: f32,
    pub relations: Vec<RelatedContext>,
}
