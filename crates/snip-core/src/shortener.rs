use crate::mapping::UrlMapping;
use crate::shortcode::ShortCode;
use crate::user::UserId;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Outcome of shortening a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortened {
    /// A new mapping was stored under this code.
    Created(ShortCode),
    /// The URL was already stored; this is its existing code.
    Existing(ShortCode),
}

impl Shortened {
    pub fn short_code(&self) -> &ShortCode {
        match self {
            Shortened::Created(code) | Shortened::Existing(code) => code,
        }
    }
}

/// One URL of a batch request, tagged by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

/// One stored URL of a batch, with the caller's tag echoed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchShortened {
    pub correlation_id: String,
    pub short_code: ShortCode,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Stores `original_url` for `owner`, or returns the code it already has.
    async fn shorten(&self, owner: &UserId, original_url: &str) -> Result<Shortened>;

    /// Stores every item for `owner` atomically; any failure stores nothing.
    async fn shorten_batch(
        &self,
        owner: &UserId,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchShortened>>;

    /// Resolves a short code to the URL to redirect to.
    ///
    /// Unknown codes yield `NotFound`; soft-deleted ones yield `Gone`.
    async fn expand(&self, code: &str) -> Result<String>;

    /// Lists everything `owner` has shortened.
    async fn history(&self, owner: &UserId) -> Result<Vec<UrlMapping>>;

    /// Checks that storage is reachable.
    async fn ping(&self) -> Result<()>;
}
