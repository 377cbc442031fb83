use async_trait::async_trait;
use snip_core::repository::{Deleter, ReadRepository, Repository, Result};
use snip_core::{BatchEntry, DeleteRequest, ShortCode, StorageError, UrlMapping, UserId};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    deleted BOOLEAN NOT NULL DEFAULT 0,
    user_id TEXT NOT NULL,
    short_id TEXT NOT NULL UNIQUE,
    long_url TEXT NOT NULL UNIQUE
)
"#;

const CREATE_OWNER_INDEX: &str = "CREATE INDEX IF NOT EXISTS urls_user_id ON urls (user_id)";

const INSERT_URL: &str = r#"
INSERT INTO urls (deleted, user_id, short_id, long_url)
VALUES (?, ?, ?, ?)
"#;

const SOFT_DELETE: &str = r#"
UPDATE urls
SET deleted = 1
WHERE short_id = ?
  AND user_id = ?
"#;

/// SQLite implementation of the repository contract.
///
/// Uniqueness of both `short_id` and `long_url` is enforced by the schema and
/// covers soft-deleted rows, so a deleted long URL can never be shortened
/// again. Batch operations run in one transaction; the insert and update
/// statements are prepared once per connection and reused for every row.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a repository from an existing pool and makes sure the schema exists.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let repository = Self { pool };
        repository.migrate().await?;
        Ok(repository)
    }

    /// Opens a pool for `dsn` (for example `sqlite://snip.db`), creating the
    /// database file and schema when absent.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(dsn)
            .map_err(map_sqlx_error)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        info!("connected to sqlite storage");
        Self::new(pool).await
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query(CREATE_OWNER_INDEX)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

/// Translates a unique violation into the matching duplicate error.
///
/// SQLite names the offending column in the message
/// (`UNIQUE constraint failed: urls.long_url`).
fn map_insert_error(err: sqlx::Error, short_code: &ShortCode, original_url: &str) -> StorageError {
    if !is_unique_violation(&err) {
        return map_sqlx_error(err);
    }

    let on_long_url = err
        .as_database_error()
        .is_some_and(|db_err| db_err.message().contains("long_url"));

    if on_long_url {
        StorageError::DuplicateLongUrl(original_url.to_owned())
    } else {
        StorageError::DuplicateShortCode(short_code.to_string())
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn mapping_from_row(row: &SqliteRow) -> Result<UrlMapping> {
    let short_id: String = row.try_get("short_id").map_err(map_sqlx_error)?;
    let long_url: String = row.try_get("long_url").map_err(map_sqlx_error)?;
    let user_id: String = row.try_get("user_id").map_err(map_sqlx_error)?;
    let deleted: bool = row.try_get("deleted").map_err(map_sqlx_error)?;

    let owner = user_id.parse::<UserId>().map_err(|e| {
        StorageError::InvalidData(format!("invalid user_id '{}': {e}", user_id))
    })?;

    Ok(UrlMapping {
        short_code: ShortCode::new_unchecked(short_id),
        original_url: long_url,
        owner,
        deleted,
    })
}

#[async_trait]
impl ReadRepository for SqliteRepository {
    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<UrlMapping>> {
        let row = sqlx::query(
            r#"
            SELECT short_id, long_url, user_id, deleted
            FROM urls
            WHERE short_id = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(mapping_from_row).transpose()
    }

    async fn find_by_long_url(&self, original_url: &str) -> Result<Option<UrlMapping>> {
        let row = sqlx::query(
            r#"
            SELECT short_id, long_url, user_id, deleted
            FROM urls
            WHERE long_url = ?
            LIMIT 1
            "#,
        )
        .bind(original_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(mapping_from_row).transpose()
    }

    async fn list_by_owner(&self, owner: &UserId) -> Result<Vec<UrlMapping>> {
        let rows = sqlx::query(
            r#"
            SELECT short_id, long_url, user_id, deleted
            FROM urls
            WHERE user_id = ?
            "#,
        )
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(mapping_from_row).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl Deleter for SqliteRepository {
    async fn soft_delete_one(&self, request: &DeleteRequest) -> Result<()> {
        let result = sqlx::query(SOFT_DELETE)
            .bind(request.short_code.as_str())
            .bind(request.owner.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(
            short_code = %request.short_code,
            owner = %request.owner,
            rows = result.rows_affected(),
            "soft delete applied"
        );
        Ok(())
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn insert(&self, mapping: UrlMapping) -> Result<()> {
        let result = sqlx::query(INSERT_URL)
            .bind(mapping.deleted)
            .bind(mapping.owner.to_string())
            .bind(mapping.short_code.as_str())
            .bind(&mapping.original_url)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(map_insert_error(
                err,
                &mapping.short_code,
                &mapping.original_url,
            )),
        }
    }

    async fn insert_batch(
        &self,
        owner: &UserId,
        entries: Vec<BatchEntry>,
    ) -> Result<Vec<BatchEntry>> {
        let owner = owner.to_string();
        // Dropping the transaction without commit rolls it back.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for entry in &entries {
            sqlx::query(INSERT_URL)
                .bind(false)
                .bind(&owner)
                .bind(entry.short_code.as_str())
                .bind(&entry.original_url)
                .execute(&mut *tx)
                .await
                .map_err(|err| map_insert_error(err, &entry.short_code, &entry.original_url))?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(owner = %owner, rows = entries.len(), "batch inserted");
        Ok(entries)
    }

    async fn soft_delete_batch(&self, owner: &UserId, codes: &[ShortCode]) -> Result<()> {
        let owner = owner.to_string();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for code in codes {
            sqlx::query(SOFT_DELETE)
                .bind(code.as_str())
                .bind(&owner)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(owner = %owner, codes = codes.len(), "batch soft delete applied");
        Ok(())
    }
}
