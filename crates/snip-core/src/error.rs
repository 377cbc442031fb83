use thiserror::Error;

/// Errors returned by storage backends.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("long url already exists: {0}")]
    DuplicateLongUrl(String),
    #[error("short code already exists: {0}")]
    DuplicateShortCode(String),
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage io failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Errors surfaced by the shortener service to its callers.
///
/// A duplicate long URL is not an error at this level: the service answers
/// with the existing mapping instead (see [`Shortened::Existing`]).
///
/// [`Shortened::Existing`]: crate::shortener::Shortened::Existing
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("short code was deleted: {0}")]
    Gone(String),
    #[error("operation not supported by storage: {0}")]
    Unsupported(&'static str),
    #[error("storage operation timed out")]
    Timeout,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for ShortenerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unsupported(operation) => ShortenerError::Unsupported(operation),
            StorageError::Timeout(_) => ShortenerError::Timeout,
            other => ShortenerError::Storage(other.to_string()),
        }
    }
}
