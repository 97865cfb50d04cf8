use thiserror::Error;

/// The six-kind error taxonomy every component maps its failures into.
///
/// `InvalidInput` and `NotFound` are the caller's fault and never retried.
/// `Conflict` means a concurrent writer won a race; callers may retry after
/// re-reading. `TransientBackend` is worth retrying with backoff.
/// `FatalBackend` is not. `ConsistencyDrift` means AGFS and the vector index
/// disagree about a URI and needs repair, not a retry.
#[derive(Error, Debug)]
pub enum OvError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {uri}")]
    NotFound { uri: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient backend error: {0}")]
    TransientBackend(String),

    #[error("fatal backend error: {0}")]
    FatalBackend(String),

    #[error("consistency drift at {uri}: {detail}")]
    ConsistencyDrift { uri: String, detail: String },

    #[error("invalid URI: {0}")]
    InvalidUri(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OvError {
    pub fn not_found(uri: impl Into<String>) -> Self {
        Self::NotFound { uri: uri.into() }
    }

    pub fn drift(uri: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ConsistencyDrift { uri: uri.into(), detail: detail.into() }
    }

    /// True if retrying the same operation with backoff might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientBackend(_) | Self::Conflict(_))
    }

    /// The exit code `ov-cli` should surface for this error, per the
    /// external CLI contract (0 ok, 2 invalid args, 3 not found, 4 io,
    /// 5 backend error).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput(_) | Self::InvalidUri(_) => 2,
            Self::NotFound { .. } => 3,
            Self::Serialization(_) => 4,
            Self::Conflict(_)
            | Self::TransientBackend(_)
            | Self::FatalBackend(_)
            | Self::ConsistencyDrift { .. }
            | Self::Other(_) => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, OvError>;
