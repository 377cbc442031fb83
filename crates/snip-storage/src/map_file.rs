use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use snip_core::repository::{Deleter, ReadRepository, Repository, Result};
use snip_core::{BatchEntry, DeleteRequest, ShortCode, StorageError, UrlMapping, UserId};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info};

/// One line of the append-only log.
#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    deleted: bool,
    user_id: String,
    id: String,
    url: String,
}

impl LogEntry {
    fn from_mapping(mapping: &UrlMapping) -> Self {
        Self {
            deleted: mapping.deleted,
            user_id: mapping.owner.to_string(),
            id: mapping.short_code.as_str().to_owned(),
            url: mapping.original_url.clone(),
        }
    }

    fn into_mapping(self) -> std::result::Result<UrlMapping, String> {
        let owner: UserId = self
            .user_id
            .parse()
            .map_err(|e| format!("invalid user_id '{}': {e}", self.user_id))?;
        Ok(UrlMapping {
            short_code: ShortCode::new_unchecked(self.id),
            original_url: self.url,
            owner,
            deleted: self.deleted,
        })
    }
}

#[derive(Debug)]
struct State {
    mappings: HashMap<String, UrlMapping>,
    long_urls: HashSet<String>,
    log: File,
}

/// In-process map backed by an append-only JSON-lines log.
///
/// Every operation takes the same lock, so readers always see their own
/// writes. Each successful insert is written to the log before the call
/// returns, and the log is replayed on open.
///
/// Only single inserts and the short-code/owner reads are supported; the
/// remaining operations return [`StorageError::Unsupported`].
#[derive(Debug)]
pub struct MapFileRepository {
    path: PathBuf,
    state: Mutex<State>,
}

impl MapFileRepository {
    /// Opens the log at `path`, creating it if absent, and replays it.
    ///
    /// A later line for a short code overrides an earlier one.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (mappings, long_urls) = replay(&path)?;

        let log = OpenOptions::new().create(true).append(true).open(&path)?;

        info!(path = %path.display(), entries = mappings.len(), "opened map file storage");

        Ok(Self {
            path,
            state: Mutex::new(State {
                mappings,
                long_urls,
                log,
            }),
        })
    }

    /// Returns the path of the backing log.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Rebuilds the live mappings and every long URL the log has ever stored.
///
/// A URL stays claimed even when a later line for its code points elsewhere.
fn replay(path: &Path) -> Result<(HashMap<String, UrlMapping>, HashSet<String>)> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    let mut mappings = HashMap::new();
    let mut long_urls = HashSet::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mapping = serde_json::from_str::<LogEntry>(&line)
            .map_err(|e| e.to_string())
            .and_then(LogEntry::into_mapping)
            .map_err(|e| {
                StorageError::InvalidData(format!(
                    "{} line {}: {e}",
                    path.display(),
                    index + 1
                ))
            })?;

        long_urls.insert(mapping.original_url.clone());
        mappings.insert(mapping.short_code.as_str().to_owned(), mapping);
    }

    debug!(path = %path.display(), entries = mappings.len(), "replayed storage log");
    Ok((mappings, long_urls))
}

/// Runs file I/O that must happen under the state lock.
///
/// On a multi-threaded runtime the worker is handed off first so other
/// tasks keep running; elsewhere the closure runs inline.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

#[async_trait]
impl ReadRepository for MapFileRepository {
    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<UrlMapping>> {
        let state = self.state.lock();
        Ok(state.mappings.get(code.as_str()).cloned())
    }

    async fn find_by_long_url(&self, _original_url: &str) -> Result<Option<UrlMapping>> {
        Err(StorageError::Unsupported("find_by_long_url"))
    }

    async fn list_by_owner(&self, owner: &UserId) -> Result<Vec<UrlMapping>> {
        let state = self.state.lock();
        Ok(state
            .mappings
            .values()
            .filter(|mapping| mapping.owner == *owner)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<()> {
        Err(StorageError::Unsupported("health_check"))
    }
}

#[async_trait]
impl Deleter for MapFileRepository {
    async fn soft_delete_one(&self, _request: &DeleteRequest) -> Result<()> {
        Err(StorageError::Unsupported("soft_delete_one"))
    }
}

#[async_trait]
impl Repository for MapFileRepository {
    async fn insert(&self, mapping: UrlMapping) -> Result<()> {
        let mut state = self.state.lock();

        if state.long_urls.contains(&mapping.original_url) {
            return Err(StorageError::DuplicateLongUrl(mapping.original_url));
        }
        if state.mappings.contains_key(mapping.short_code.as_str()) {
            return Err(StorageError::DuplicateShortCode(mapping.short_code.to_string()));
        }

        let mut line = serde_json::to_string(&LogEntry::from_mapping(&mapping))
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        line.push('\n');
        let log = &mut state.log;
        blocking(|| {
            log.write_all(line.as_bytes())?;
            log.flush()
        })?;

        state.long_urls.insert(mapping.original_url.clone());
        state
            .mappings
            .insert(mapping.short_code.as_str().to_owned(), mapping);
        Ok(())
    }

    async fn insert_batch(
        &self,
        _owner: &UserId,
        _entries: Vec<BatchEntry>,
    ) -> Result<Vec<BatchEntry>> {
        Err(StorageError::Unsupported("insert_batch"))
    }

    async fn soft_delete_batch(&self, _owner: &UserId, _codes: &[ShortCode]) -> Result<()> {
        Err(StorageError::Unsupported("soft_delete_batch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn open(dir: &TempDir) -> MapFileRepository {
        MapFileRepository::open(dir.path().join("storage.txt")).unwrap()
    }

    #[tokio::test]
    async fn insert_and_find() {
        let dir = TempDir::new().unwrap();
        let repo = open(&dir);
        let owner = UserId::random();

        repo.insert(UrlMapping::new(code("abc123"), "https://example.com", owner))
            .await
            .unwrap();

        let found = repo.find_by_short_code(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(found.original_url, "https://example.com");
        assert_eq!(found.owner, owner);
        assert!(!found.deleted);
        assert!(repo.find_by_short_code(&code("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_long_url_leaves_storage_unchanged() {
        let dir = TempDir::new().unwrap();
        let repo = open(&dir);
        let owner = UserId::random();

        repo.insert(UrlMapping::new(code("first"), "https://example.com", owner))
            .await
            .unwrap();
        let err = repo
            .insert(UrlMapping::new(code("second"), "https://example.com", owner))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DuplicateLongUrl(_)));
        assert!(repo.find_by_short_code(&code("second")).await.unwrap().is_none());
        assert_eq!(repo.list_by_owner(&owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_short_code_is_rejected() {
        let dir = TempDir::new().unwrap();
        let repo = open(&dir);
        let owner = UserId::random();

        repo.insert(UrlMapping::new(code("abc123"), "https://one.example", owner))
            .await
            .unwrap();
        let err = repo
            .insert(UrlMapping::new(code("abc123"), "https://two.example", owner))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DuplicateShortCode(_)));
        let found = repo.find_by_short_code(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(found.original_url, "https://one.example");
    }

    #[tokio::test]
    async fn list_by_owner_filters_other_owners() {
        let dir = TempDir::new().unwrap();
        let repo = open(&dir);
        let alice = UserId::random();
        let bob = UserId::random();

        repo.insert(UrlMapping::new(code("a-one"), "https://a.example/1", alice))
            .await
            .unwrap();
        repo.insert(UrlMapping::new(code("a-two"), "https://a.example/2", alice))
            .await
            .unwrap();
        repo.insert(UrlMapping::new(code("b-one"), "https://b.example/1", bob))
            .await
            .unwrap();

        let mut codes: Vec<String> = repo
            .list_by_owner(&alice)
            .await
            .unwrap()
            .into_iter()
            .map(|mapping| mapping.short_code.to_string())
            .collect();
        codes.sort();
        assert_eq!(codes, vec!["a-one", "a-two"]);
        assert!(repo.list_by_owner(&UserId::random()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopen_replays_log() {
        let dir = TempDir::new().unwrap();
        let owner = UserId::random();

        {
            let repo = open(&dir);
            repo.insert(UrlMapping::new(code("abc123"), "https://example.com", owner))
                .await
                .unwrap();
        }

        let repo = open(&dir);
        let found = repo.find_by_short_code(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(found.original_url, "https://example.com");
        assert_eq!(found.owner, owner);

        // Uniqueness survives the restart.
        let err = repo
            .insert(UrlMapping::new(code("other"), "https://example.com", owner))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateLongUrl(_)));
    }

    #[tokio::test]
    async fn later_log_lines_override_earlier_ones() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.txt");
        let owner = UserId::random();
        let lines = format!(
            "{{\"deleted\":false,\"user_id\":\"{owner}\",\"id\":\"abc123\",\"url\":\"https://old.example\"}}\n\
             {{\"deleted\":true,\"user_id\":\"{owner}\",\"id\":\"abc123\",\"url\":\"https://new.example\"}}\n"
        );
        std::fs::write(&path, lines).unwrap();

        let repo = MapFileRepository::open(&path).unwrap();
        let found = repo.find_by_short_code(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(found.original_url, "https://new.example");
        assert!(found.deleted);
    }

    #[tokio::test]
    async fn overwritten_urls_stay_claimed_after_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.txt");
        let owner = UserId::random();
        let lines = format!(
            "{{\"deleted\":false,\"user_id\":\"{owner}\",\"id\":\"abc123\",\"url\":\"https://old.example\"}}\n\
             {{\"deleted\":false,\"user_id\":\"{owner}\",\"id\":\"abc123\",\"url\":\"https://new.example\"}}\n"
        );
        std::fs::write(&path, lines).unwrap();

        let repo = MapFileRepository::open(&path).unwrap();
        let err = repo
            .insert(UrlMapping::new(code("fresh"), "https://old.example", owner))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateLongUrl(url) if url == "https://old.example"));
        assert!(repo.find_by_short_code(&code("fresh")).await.unwrap().is_none());
    }

    #[test]
    fn malformed_log_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.txt");
        std::fs::write(&path, "{not json}\n").unwrap();

        let err = MapFileRepository::open(&path).unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(message) if message.contains("line 1")));
    }

    #[tokio::test]
    async fn unsupported_operations_say_so() {
        let dir = TempDir::new().unwrap();
        let repo = open(&dir);
        let owner = UserId::random();
        let request = DeleteRequest {
            owner,
            short_code: code("abc123"),
        };

        assert!(matches!(
            repo.find_by_long_url("https://example.com").await,
            Err(StorageError::Unsupported("find_by_long_url"))
        ));
        assert!(matches!(
            repo.health_check().await,
            Err(StorageError::Unsupported(_))
        ));
        assert!(matches!(
            repo.insert_batch(&owner, Vec::new()).await,
            Err(StorageError::Unsupported(_))
        ));
        assert!(matches!(
            repo.soft_delete_batch(&owner, &[code("abc123")]).await,
            Err(StorageError::Unsupported(_))
        ));
        assert!(matches!(
            repo.soft_delete_one(&request).await,
            Err(StorageError::Unsupported(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_are_all_kept() {
        use std::sync::Arc;

        let dir = TempDir::new().unwrap();
        let repo = Arc::new(open(&dir));
        let owner = UserId::random();
        let mut handles = vec![];

        for i in 0..10u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.insert(UrlMapping::new(
                    ShortCode::new_unchecked(format!("code-{:03}", i)),
                    format!("https://example{}.com", i),
                    owner,
                ))
                .await
                .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(repo.list_by_owner(&owner).await.unwrap().len(), 10);
        drop(repo);

        let reopened = open(&dir);
        assert_eq!(reopened.list_by_owner(&owner).await.unwrap().len(), 10);
    }
}
