use thiserror::Error;

/// The error taxonomy shared by every component of the indexing engine.
///
/// Mirrors the five error classes from the component design: `NotFound` and
/// `InvalidInput` are recovered locally by callers (the query surface maps
/// them to empty results / 4xx), while `CorruptRecord`, `StoreUnavailable`
/// and `UpstreamUnavailable` propagate up to the ingest loop's outer retry.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("store unavailable after retries: {0}")]
    StoreUnavailable(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store error: {0}")]
    Store(#[from] rocksdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Coarse classification used by the outer retry loop and by tests;
    /// there is no HTTP layer in this crate to map these onto status codes.
    pub fn status_class(&self) -> StatusClass {
        match self {
            IndexError::NotFound(_) => StatusClass::NotFound,
            IndexError::InvalidInput(_) => StatusClass::BadInput,
            IndexError::CorruptRecord(_) => StatusClass::Corrupt,
            IndexError::StoreUnavailable(_) | IndexError::Store(_) | IndexError::Io(_) => {
                StatusClass::Transient
            }
            IndexError::UpstreamUnavailable(_) => StatusClass::Transient,
        }
    }

    /// Whether the outer ingest loop should abort the current batch and
    /// retry from scratch after a backoff, per the propagation policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self.status_class(), StatusClass::Transient)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    NotFound,
    BadInput,
    Corrupt,
    Transient,
}

pub type Result<T> = std::result::Result<T, IndexError>;
