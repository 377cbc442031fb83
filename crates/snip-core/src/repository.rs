use crate::error::StorageError;
use crate::mapping::{BatchEntry, DeleteRequest, UrlMapping};
use crate::shortcode::ShortCode;
use crate::user::UserId;
use async_trait::async_trait;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A read-only view of a repository.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the mapping for a short code, soft-deleted rows included.
    /// Returns `None` if the code was never stored.
    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<UrlMapping>>;

    /// Retrieves the mapping that owns `original_url`, if any.
    async fn find_by_long_url(&self, original_url: &str) -> Result<Option<UrlMapping>>;

    /// Lists every mapping created by `owner`, in no particular order.
    async fn list_by_owner(&self, owner: &UserId) -> Result<Vec<UrlMapping>>;

    /// Checks that the backend is reachable.
    async fn health_check(&self) -> Result<()>;
}

/// Applies a single owner-scoped soft delete.
///
/// This is the only capability the deletion pool needs, so it is split out
/// from [`Repository`] to let tests drive the pool with small fakes.
#[async_trait]
pub trait Deleter: Send + Sync + 'static {
    /// Marks the row deleted when both owner and short code match.
    /// A request that matches nothing is a no-op, not an error.
    async fn soft_delete_one(&self, request: &DeleteRequest) -> Result<()>;
}

#[async_trait]
pub trait Repository: ReadRepository + Deleter {
    /// Inserts a new mapping.
    ///
    /// Returns `Err(DuplicateLongUrl)` if the long URL is already stored and
    /// `Err(DuplicateShortCode)` if the code is taken. Either way storage is
    /// left unchanged.
    async fn insert(&self, mapping: UrlMapping) -> Result<()>;

    /// Inserts every entry for `owner`, or none of them.
    ///
    /// The returned entries are the inputs in their original order.
    async fn insert_batch(&self, owner: &UserId, entries: Vec<BatchEntry>)
        -> Result<Vec<BatchEntry>>;

    /// Soft-deletes every listed code that `owner` created, or none of them.
    ///
    /// Codes that do not exist or belong to someone else are skipped.
    async fn soft_delete_batch(&self, owner: &UserId, codes: &[ShortCode]) -> Result<()>;
}
