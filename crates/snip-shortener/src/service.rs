use crate::generator::Generator;
use async_trait::async_trait;
use snip_core::{
    BatchEntry, BatchItem, BatchShortened, Repository, ShortCode, Shortened, Shortener,
    ShortenerError, StorageError, UrlMapping, UserId,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

type Result<T> = std::result::Result<T, ShortenerError>;

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository` and a `Generator` to handle:
/// - Short code minting
/// - Returning the existing code when a long URL is shortened twice
/// - URL validation
/// - Bounding every storage round trip by a deadline
#[derive(Debug)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    timeout: Duration,
}

impl<R, G> Clone for ShortenerService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            timeout: self.timeout,
        }
    }
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    /// Creates a new `ShortenerService`.
    ///
    /// `timeout` bounds each operation's storage work; exceeding it yields
    /// [`ShortenerError::Timeout`].
    pub fn new(repository: Arc<R>, generator: G, timeout: Duration) -> Self {
        Self {
            repository,
            generator: Arc::new(generator),
            timeout,
        }
    }

    /// Validates that the URL is absolute http(s) with a non-empty host.
    fn validate_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        let parsed = Url::parse(url)
            .map_err(|e| ShortenerError::InvalidUrl(format!("{}: {}", e, url)))?;

        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {}",
                scheme
            )));
        }

        // The parser folds `http:///path` into `http://path/`, so the
        // authority is checked on the raw text as well.
        let has_authority = url
            .split_once("://")
            .is_some_and(|(_, rest)| !rest.is_empty() && !rest.starts_with(['/', '?', '#']));
        if !has_authority || parsed.host_str().unwrap_or_default().is_empty() {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a host: {}",
                url
            )));
        }

        Ok(())
    }

    fn generate_code(&self) -> ShortCode {
        self.generator.generate().into()
    }

    async fn within<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| ShortenerError::Timeout)?
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, owner: &UserId, original_url: &str) -> Result<Shortened> {
        Self::validate_url(original_url)?;

        let short_code = self.generate_code();
        let mapping = UrlMapping::new(short_code.clone(), original_url, *owner);

        self.within(async {
            match self.repository.insert(mapping).await {
                Ok(()) => {
                    debug!(short_code = %short_code, owner = %owner, "stored new mapping");
                    Ok(Shortened::Created(short_code))
                }
                Err(StorageError::DuplicateLongUrl(_)) => {
                    let existing = self
                        .repository
                        .find_by_long_url(original_url)
                        .await?
                        .ok_or_else(|| {
                            ShortenerError::Storage(format!(
                                "duplicate reported but no row holds {}",
                                original_url
                            ))
                        })?;
                    debug!(short_code = %existing.short_code, "long url already shortened");
                    Ok(Shortened::Existing(existing.short_code))
                }
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    async fn shorten_batch(
        &self,
        owner: &UserId,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchShortened>> {
        for item in &items {
            Self::validate_url(&item.original_url)?;
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<BatchEntry> = items
            .into_iter()
            .map(|item| BatchEntry {
                correlation_id: item.correlation_id,
                original_url: item.original_url,
                short_code: self.generate_code(),
            })
            .collect();

        let stored = self
            .within(async { Ok(self.repository.insert_batch(owner, entries).await?) })
            .await?;

        debug!(owner = %owner, count = stored.len(), "stored batch");
        Ok(stored
            .into_iter()
            .map(|entry| BatchShortened {
                correlation_id: entry.correlation_id,
                short_code: entry.short_code,
            })
            .collect())
    }

    async fn expand(&self, code: &str) -> Result<String> {
        trace!(code = %code, "expanding short code");
        let short_code =
            ShortCode::new(code).map_err(|_| ShortenerError::NotFound(code.to_string()))?;

        let mapping = self
            .within(async { Ok(self.repository.find_by_short_code(&short_code).await?) })
            .await?
            .ok_or_else(|| ShortenerError::NotFound(code.to_string()))?;

        if mapping.deleted {
            return Err(ShortenerError::Gone(code.to_string()));
        }
        Ok(mapping.original_url)
    }

    async fn history(&self, owner: &UserId) -> Result<Vec<UrlMapping>> {
        self.within(async { Ok(self.repository.list_by_owner(owner).await?) })
            .await
    }

    async fn ping(&self) -> Result<()> {
        self.within(async { Ok(self.repository.health_check().await?) })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::seq::SeqGenerator;
    use parking_lot::Mutex;
    use snip_core::repository::{Deleter, ReadRepository};
    use snip_core::DeleteRequest;

    /// Full-contract fake with the same observable semantics as the SQLite store.
    #[derive(Default)]
    struct MemoryRepository {
        rows: Mutex<Vec<UrlMapping>>,
        unreachable: bool,
    }

    impl MemoryRepository {
        fn conflicts(rows: &[UrlMapping], code: &ShortCode, url: &str) -> Option<StorageError> {
            if rows.iter().any(|row| row.original_url == url) {
                return Some(StorageError::DuplicateLongUrl(url.to_string()));
            }
            if rows.iter().any(|row| row.short_code == *code) {
                return Some(StorageError::DuplicateShortCode(code.to_string()));
            }
            None
        }
    }

    #[async_trait]
    impl ReadRepository for MemoryRepository {
        async fn find_by_short_code(
            &self,
            code: &ShortCode,
        ) -> snip_core::repository::Result<Option<UrlMapping>> {
            Ok(self.rows.lock().iter().find(|row| row.short_code == *code).cloned())
        }

        async fn find_by_long_url(
            &self,
            original_url: &str,
        ) -> snip_core::repository::Result<Option<UrlMapping>> {
            Ok(self
                .rows
                .lock()
                .iter()
                .find(|row| row.original_url == original_url)
                .cloned())
        }

        async fn list_by_owner(
            &self,
            owner: &UserId,
        ) -> snip_core::repository::Result<Vec<UrlMapping>> {
            Ok(self
                .rows
                .lock()
                .iter()
                .filter(|row| row.owner == *owner)
                .cloned()
                .collect())
        }

        async fn health_check(&self) -> snip_core::repository::Result<()> {
            if self.unreachable {
                return Err(StorageError::Unavailable("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Deleter for MemoryRepository {
        async fn soft_delete_one(&self, request: &DeleteRequest) -> snip_core::repository::Result<()> {
            self.soft_delete_batch(&request.owner, std::slice::from_ref(&request.short_code))
                .await
        }
    }

    #[async_trait]
    impl Repository for MemoryRepository {
        async fn insert(&self, mapping: UrlMapping) -> snip_core::repository::Result<()> {
            let mut rows = self.rows.lock();
            if let Some(err) = Self::conflicts(&rows, &mapping.short_code, &mapping.original_url) {
                return Err(err);
            }
            rows.push(mapping);
            Ok(())
        }

        async fn insert_batch(
            &self,
            owner: &UserId,
            entries: Vec<BatchEntry>,
        ) -> snip_core::repository::Result<Vec<BatchEntry>> {
            let mut rows = self.rows.lock();
            let mut staged = rows.clone();
            for entry in &entries {
                if let Some(err) = Self::conflicts(&staged, &entry.short_code, &entry.original_url)
                {
                    return Err(err);
                }
                staged.push(UrlMapping::new(
                    entry.short_code.clone(),
                    entry.original_url.clone(),
                    *owner,
                ));
            }
            *rows = staged;
            Ok(entries)
        }

        async fn soft_delete_batch(
            &self,
            owner: &UserId,
            codes: &[ShortCode],
        ) -> snip_core::repository::Result<()> {
            for row in self.rows.lock().iter_mut() {
                if row.owner == *owner && codes.contains(&row.short_code) {
                    row.deleted = true;
                }
            }
            Ok(())
        }
    }

    /// Repository whose reads never finish in time.
    struct StalledRepository;

    #[async_trait]
    impl ReadRepository for StalledRepository {
        async fn find_by_short_code(
            &self,
            _code: &ShortCode,
        ) -> snip_core::repository::Result<Option<UrlMapping>> {
            std::future::pending().await
        }

        async fn find_by_long_url(
            &self,
            _original_url: &str,
        ) -> snip_core::repository::Result<Option<UrlMapping>> {
            std::future::pending().await
        }

        async fn list_by_owner(
            &self,
            _owner: &UserId,
        ) -> snip_core::repository::Result<Vec<UrlMapping>> {
            std::future::pending().await
        }

        async fn health_check(&self) -> snip_core::repository::Result<()> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl Deleter for StalledRepository {
        async fn soft_delete_one(&self, _request: &DeleteRequest) -> snip_core::repository::Result<()> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl Repository for StalledRepository {
        async fn insert(&self, _mapping: UrlMapping) -> snip_core::repository::Result<()> {
            std::future::pending().await
        }

        async fn insert_batch(
            &self,
            _owner: &UserId,
            _entries: Vec<BatchEntry>,
        ) -> snip_core::repository::Result<Vec<BatchEntry>> {
            std::future::pending().await
        }

        async fn soft_delete_batch(
            &self,
            _owner: &UserId,
            _codes: &[ShortCode],
        ) -> snip_core::repository::Result<()> {
            std::future::pending().await
        }
    }

    fn test_service() -> (
        ShortenerService<MemoryRepository, SeqGenerator>,
        Arc<MemoryRepository>,
    ) {
        let repo = Arc::new(MemoryRepository::default());
        let service = ShortenerService::new(
            Arc::clone(&repo),
            SeqGenerator::with_prefix("sn"),
            Duration::from_secs(1),
        );
        (service, repo)
    }

    fn item(correlation_id: &str, url: &str) -> BatchItem {
        BatchItem {
            correlation_id: correlation_id.to_string(),
            original_url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn shorten_creates_mapping() {
        let (service, repo) = test_service();
        let owner = UserId::random();

        let shortened = service.shorten(&owner, "https://example.com/a").await.unwrap();
        assert_eq!(shortened, Shortened::Created(ShortCode::new_unchecked("sn000000")));

        let stored = repo.list_by_owner(&owner).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].original_url, "https://example.com/a");
    }

    #[tokio::test]
    async fn shortening_same_url_twice_returns_existing_code() {
        let (service, repo) = test_service();
        let first_owner = UserId::random();

        let first = service
            .shorten(&first_owner, "https://example.com/a")
            .await
            .unwrap();
        let second = service
            .shorten(&UserId::random(), "https://example.com/a")
            .await
            .unwrap();

        assert_eq!(second, Shortened::Existing(first.short_code().clone()));
        assert_eq!(repo.rows.lock().len(), 1);
    }

    #[tokio::test]
    async fn shorten_with_invalid_url_fails() {
        let (service, _) = test_service();
        let owner = UserId::random();

        for url in [
            "",
            "   ",
            "not-a-valid-url",
            "ftp://example.com",
            "https://",
            "http:///path",
            "https://?q=1",
            "https://#top",
            "http:example.com",
        ] {
            let err = service.shorten(&owner, url).await.unwrap_err();
            assert!(matches!(err, ShortenerError::InvalidUrl(_)), "accepted {url:?}");
        }
    }

    #[tokio::test]
    async fn shorten_batch_keeps_correlation_ids_in_order() {
        let (service, _) = test_service();
        let owner = UserId::random();

        let results = service
            .shorten_batch(
                &owner,
                vec![
                    item("x", "https://example.com/1"),
                    item("y", "https://example.com/2"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                BatchShortened {
                    correlation_id: "x".to_string(),
                    short_code: ShortCode::new_unchecked("sn000000"),
                },
                BatchShortened {
                    correlation_id: "y".to_string(),
                    short_code: ShortCode::new_unchecked("sn000001"),
                },
            ]
        );
        assert_eq!(service.history(&owner).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn shorten_batch_aborts_on_any_conflict() {
        let (service, repo) = test_service();
        let owner = UserId::random();
        service.shorten(&owner, "https://example.com/taken").await.unwrap();

        let err = service
            .shorten_batch(
                &owner,
                vec![
                    item("0", "https://example.com/new"),
                    item("1", "https://example.com/taken"),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::Storage(_)));
        assert_eq!(repo.rows.lock().len(), 1);
    }

    #[tokio::test]
    async fn shorten_batch_rejects_invalid_url_before_storing() {
        let (service, repo) = test_service();

        let err = service
            .shorten_batch(
                &UserId::random(),
                vec![item("0", "https://example.com/ok"), item("1", "nope")],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert!(repo.rows.lock().is_empty());
    }

    #[tokio::test]
    async fn expand_resolves_live_mapping() {
        let (service, _) = test_service();
        let owner = UserId::random();
        let shortened = service.shorten(&owner, "https://example.com/a").await.unwrap();

        let url = service.expand(shortened.short_code().as_str()).await.unwrap();
        assert_eq!(url, "https://example.com/a");
    }

    #[tokio::test]
    async fn expand_unknown_code_is_not_found() {
        let (service, _) = test_service();

        assert!(matches!(
            service.expand("missing").await,
            Err(ShortenerError::NotFound(_))
        ));
        assert!(matches!(
            service.expand("no/such").await,
            Err(ShortenerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn expand_deleted_code_is_gone() {
        let (service, repo) = test_service();
        let owner = UserId::random();
        let shortened = service.shorten(&owner, "https://example.com/a").await.unwrap();

        repo.soft_delete_batch(&owner, &[shortened.short_code().clone()])
            .await
            .unwrap();

        assert!(matches!(
            service.expand(shortened.short_code().as_str()).await,
            Err(ShortenerError::Gone(_))
        ));
    }

    #[tokio::test]
    async fn history_is_empty_for_new_owner() {
        let (service, _) = test_service();
        service
            .shorten(&UserId::random(), "https://example.com/a")
            .await
            .unwrap();

        assert!(service.history(&UserId::random()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ping_reports_storage_failure() {
        let service = ShortenerService::new(
            Arc::new(MemoryRepository {
                rows: Mutex::default(),
                unreachable: true,
            }),
            SeqGenerator::with_prefix("sn"),
            Duration::from_secs(1),
        );

        assert!(matches!(service.ping().await, Err(ShortenerError::Storage(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_storage_surfaces_as_timeout() {
        let service = ShortenerService::new(
            Arc::new(StalledRepository),
            SeqGenerator::with_prefix("sn"),
            Duration::from_millis(500),
        );
        let owner = UserId::random();

        assert!(matches!(
            service.shorten(&owner, "https://example.com/a").await,
            Err(ShortenerError::Timeout)
        ));
        assert!(matches!(
            service.expand("sn000000").await,
            Err(ShortenerError::Timeout)
        ));
        assert!(matches!(service.history(&owner).await, Err(ShortenerError::Timeout)));
        assert!(matches!(service.ping().await, Err(ShortenerError::Timeout)));
    }
}
