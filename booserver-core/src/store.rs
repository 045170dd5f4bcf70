//! Persistent metadata store.
//!
//! A single SQLite table keyed by normalized path. File-derived columns are
//! overwritten by the synchronization engine; user-authored columns (label,
//! description, mark, rating, flag, option) belong to the client and survive
//! every upsert. WAL journaling with relaxed sync gives write-ahead
//! durability while the pool accepts concurrent callers; SQLite serializes
//! the writes.

use serde::Serialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::QueryBuilder;

use crate::media::{MediaFile, MediaType};

/// Embedded migrations, run automatically on open.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const MAX_CONNECTIONS: u32 = 5;

/// One persistent metadata record.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct MetaData {
    /// Auto-incremented record identifier.
    pub id: i64,
    /// Absolute forward-slash-normalized path; unique.
    pub path: String,
    /// Lowercase extension including the dot.
    pub ext: String,
    /// File name without extension.
    pub title: String,
    /// `ROOT` or the source-relative directory path.
    pub category: String,
    /// Size in bytes.
    pub length: i64,
    /// Mtime in milliseconds since the Unix epoch.
    pub date: i64,
    /// Playback duration in seconds; 0 for images.
    pub duration: f64,
    /// User-authored display label.
    pub label: String,
    /// User-authored description.
    pub description: String,
    /// User-authored mark.
    pub mark: i64,
    /// User-authored rating.
    pub rating: i64,
    /// User-authored flag.
    pub flag: i64,
    /// Opaque user-authored JSON blob.
    pub option: String,
    /// Insertion time in milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Last mutation time in milliseconds since the Unix epoch.
    pub updated_at: i64,
}

impl MetaData {
    /// Classification derived from the extension.
    pub fn media_type(&self) -> MediaType {
        MediaType::from_ext(&self.ext)
    }
}

/// Errors from the metadata store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection or query failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// SQLite-backed metadata store shared by all sources.
#[derive(Debug, Clone)]
pub struct MetaDataStore {
    pool: SqlitePool,
}

impl MetaDataStore {
    async fn new(options: SqliteConnectOptions, max: u32) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        MIGRATOR.run(&store.pool).await?;
        Ok(store)
    }

    /// Opens (creating if missing) the store at `path`; `:memory:` yields an
    /// ephemeral store.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The database could not be opened
    /// - [`StoreError::Migration`] - The schema could not be applied
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        if path == ":memory:" {
            return Self::open_in_memory().await;
        }
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::new(options, MAX_CONNECTIONS).await
    }

    /// Opens an ephemeral in-memory store (useful for tests).
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The database could not be opened
    /// - [`StoreError::Migration`] - The schema could not be applied
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        // An in-memory database is per-connection; limit the pool to one so
        // every caller sees the same data.
        let options = Self::base_options().filename(":memory:");
        Self::new(options, 1).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Inserts a record for `file` or, when a record at the same path
    /// exists, overwrites its file-derived columns. User-authored columns
    /// are never touched.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The statement failed
    pub async fn upsert(&self, file: &MediaFile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO metadata (path, ext, title, category, length, date, duration)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (path) DO UPDATE SET
                ext = excluded.ext,
                title = excluded.title,
                category = excluded.category,
                length = excluded.length,
                date = excluded.date,
                duration = excluded.duration
            "#,
        )
        .bind(&file.path)
        .bind(&file.ext)
        .bind(&file.title)
        .bind(&file.category)
        .bind(file.length as i64)
        .bind(file.date)
        .bind(file.duration)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record with the given id.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn get_by_id(&self, id: i64) -> Result<Option<MetaData>, StoreError> {
        let record = sqlx::query_as::<_, MetaData>("SELECT * FROM metadata WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Record with the given path.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn get_by_path(&self, path: &str) -> Result<Option<MetaData>, StoreError> {
        let record = sqlx::query_as::<_, MetaData>("SELECT * FROM metadata WHERE path = ?1")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Records for any of the given paths.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn get_by_paths(&self, paths: &[String]) -> Result<Vec<MetaData>, StoreError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT * FROM metadata WHERE path IN (");
        let mut values = query.separated(", ");
        for path in paths {
            values.push_bind(path);
        }
        values.push_unseparated(") ORDER BY path");
        let records = query.build_query_as::<MetaData>().fetch_all(&self.pool).await?;
        Ok(records)
    }

    /// Every record, ordered by path.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn get_all(&self) -> Result<Vec<MetaData>, StoreError> {
        let records = sqlx::query_as::<_, MetaData>("SELECT * FROM metadata ORDER BY path")
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Records with the given flag value.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn get_by_flag(&self, flag: i64) -> Result<Vec<MetaData>, StoreError> {
        let records =
            sqlx::query_as::<_, MetaData>("SELECT * FROM metadata WHERE flag = ?1 ORDER BY path")
                .bind(flag)
                .fetch_all(&self.pool)
                .await?;
        Ok(records)
    }

    /// Records rated at least `min`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn get_by_rating(&self, min: i64) -> Result<Vec<MetaData>, StoreError> {
        let records =
            sqlx::query_as::<_, MetaData>("SELECT * FROM metadata WHERE rating >= ?1 ORDER BY path")
                .bind(min)
                .fetch_all(&self.pool)
                .await?;
        Ok(records)
    }

    /// Records whose label contains `needle`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn search_by_label(&self, needle: &str) -> Result<Vec<MetaData>, StoreError> {
        let records = sqlx::query_as::<_, MetaData>(
            "SELECT * FROM metadata WHERE label LIKE '%' || ?1 || '%' ORDER BY path",
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Records created at or after `since` (ms), oldest first.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn get_created_since(&self, since: i64) -> Result<Vec<MetaData>, StoreError> {
        let records = sqlx::query_as::<_, MetaData>(
            "SELECT * FROM metadata WHERE created_at >= ?1 ORDER BY created_at",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Records mutated at or after `since` (ms), oldest first.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn get_updated_since(&self, since: i64) -> Result<Vec<MetaData>, StoreError> {
        let records = sqlx::query_as::<_, MetaData>(
            "SELECT * FROM metadata WHERE updated_at >= ?1 ORDER BY updated_at",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Distinct categories across all records.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn categories(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT category FROM metadata ORDER BY category")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(category,)| category).collect())
    }

    /// Deletes the record at `path`. Returns whether a record existed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The statement failed
    pub async fn delete(&self, path: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM metadata WHERE path = ?1")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes the records at all given paths. Returns how many existed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The statement failed
    pub async fn delete_many(&self, paths: &[String]) -> Result<u64, StoreError> {
        if paths.is_empty() {
            return Ok(0);
        }
        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("DELETE FROM metadata WHERE path IN (");
        let mut values = query.separated(", ");
        for path in paths {
            values.push_bind(path);
        }
        values.push_unseparated(")");
        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Atomically moves the record at `old_path` to `new_path`, optionally
    /// retitling it; `updated_at` is bumped. Returns false (a no-op) when no
    /// record exists at `old_path`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The statement failed
    pub async fn update_path(
        &self,
        old_path: &str,
        new_path: &str,
        new_title: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE metadata SET path = ?1, title = COALESCE(?2, title) WHERE path = ?3",
        )
        .bind(new_path)
        .bind(new_title)
        .bind(old_path)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flushes and closes the pool. Safe to call more than once.
    pub async fn close(&self) {
        if !self.pool.is_closed() {
            // Let SQLite refresh its query planner statistics on the way out.
            let _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        }
        self.pool.close().await;
    }
}
