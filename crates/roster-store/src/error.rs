use std::path::PathBuf;

/// Errors from player store operations.
///
/// Not-found and duplicate-id outcomes are not errors: they surface as
/// `Ok(false)` / `Ok(None)` from the store methods.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The on-disk structure cannot be decoded.
    #[error("corrupt store {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Serialization failure while encoding a collection.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The record cannot be stored by this backend.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// `update` was called with a record whose id differs from the target id.
    #[error("record id {actual} does not match target id {expected}")]
    IdMismatch { expected: i32, actual: i32 },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// A previous operation panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from loading a [`StoreConfig`](crate::config::StoreConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
