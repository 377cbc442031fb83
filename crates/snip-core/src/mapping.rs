use crate::shortcode::ShortCode;
use crate::user::UserId;

/// A stored short-code to long-URL binding.
///
/// Both `short_code` and `original_url` are unique across every row ever
/// stored, soft-deleted rows included. Only `deleted` ever changes after
/// creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMapping {
    pub short_code: ShortCode,
    pub original_url: String,
    pub owner: UserId,
    pub deleted: bool,
}

impl UrlMapping {
    /// Creates a live mapping owned by `owner`.
    pub fn new(short_code: ShortCode, original_url: impl Into<String>, owner: UserId) -> Self {
        Self {
            short_code,
            original_url: original_url.into(),
            owner,
            deleted: false,
        }
    }
}

/// One row of a batch insert.
///
/// `correlation_id` is opaque to storage and handed back unchanged, in the
/// same position, so callers can match results to their requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub correlation_id: String,
    pub original_url: String,
    pub short_code: ShortCode,
}

/// Request to soft-delete one mapping on behalf of its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub owner: UserId,
    pub short_code: ShortCode,
}
