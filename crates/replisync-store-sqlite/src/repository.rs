//! `SQLite`-backed record repository.

use crate::record::JsonRecord;
use chrono::{DateTime, Utc};
use replisync_core::{ActionKind, Repository, RepositoryAction, SyncEntity, TransportError};
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, Row};
use std::path::Path;
use uuid::Uuid;

/// One replica's storage: JSON-payload records in a `SQLite` table.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open or create a `SQLite` database.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.init_schema()?;
        Ok(repo)
    }

    /// Create an in-memory repository (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be created.
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.init_schema()?;
        Ok(repo)
    }

    fn init_schema(&self) -> SqliteResult<()> {
        self.conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER,
                token TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_records_updated_at ON records(updated_at);
            CREATE INDEX IF NOT EXISTS idx_records_deleted_at ON records(deleted_at);
            ",
        )?;

        Ok(())
    }

    /// Write a record as the host application would, regenerating its
    /// concurrency token.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub fn put(&self, record: &JsonRecord) -> SqliteResult<()> {
        let mut stamped = record.clone();
        stamped.token = Some(Uuid::new_v4());
        self.write(&stamped)
    }

    /// Load one record by identity.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn get(&self, id: Uuid) -> SqliteResult<Option<JsonRecord>> {
        self.conn
            .query_row(
                "SELECT id, payload, created_at, updated_at, deleted_at, token
                 FROM records WHERE id = ?1",
                [id.to_string()],
                row_to_record,
            )
            .optional()
    }

    /// Number of records, soft-deleted ones included.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn len(&self) -> SqliteResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Whether the repository holds no records at all.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn is_empty(&self) -> SqliteResult<bool> {
        Ok(self.len()? == 0)
    }

    fn write(&self, record: &JsonRecord) -> SqliteResult<()> {
        let payload = serde_json::to_string(&record.payload)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        self.conn.execute(
            r"
            INSERT OR REPLACE INTO records (id, payload, created_at, updated_at, deleted_at, token)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            (
                record.id.to_string(),
                payload,
                record.created_at.timestamp_millis(),
                record.updated_at.timestamp_millis(),
                record.deleted_at.map(|d| d.timestamp_millis()),
                record.token.map(|t| t.to_string()),
            ),
        )?;

        Ok(())
    }

    fn changed_since(&self, since: Option<DateTime<Utc>>) -> SqliteResult<Vec<JsonRecord>> {
        match since {
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, payload, created_at, updated_at, deleted_at, token
                     FROM records ORDER BY updated_at ASC",
                )?;
                let rows = stmt.query_map([], row_to_record)?;
                rows.collect()
            }
            Some(since) => {
                let since_ms = since.timestamp_millis();
                let mut stmt = self.conn.prepare(
                    "SELECT id, payload, created_at, updated_at, deleted_at, token
                     FROM records
                     WHERE created_at > ?1 OR updated_at > ?1 OR deleted_at > ?1
                     ORDER BY updated_at ASC",
                )?;
                let rows = stmt.query_map([since_ms], row_to_record)?;
                rows.collect()
            }
        }
    }
}

impl Repository<JsonRecord> for SqliteRepository {
    async fn fetch_changed_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<JsonRecord>, TransportError> {
        self.changed_since(since)
            .map_err(|e| TransportError::Fetch(e.to_string()))
    }

    async fn apply(&self, action: &RepositoryAction<JsonRecord>) -> Result<(), TransportError> {
        let result = match action.kind {
            ActionKind::Insert | ActionKind::Update => {
                let mut written = action.entity.clone();
                written.token = Some(Uuid::new_v4());
                self.write(&written)
            }
            ActionKind::Delete => {
                // Stamp the deletion with the row's own latest stamp so the
                // write stays inside the cycle's watermark window.
                let stamp = action.entity.latest_timestamp().timestamp_millis();
                self.conn
                    .execute(
                        "UPDATE records SET deleted_at = ?1, token = ?2 WHERE id = ?3",
                        (
                            stamp,
                            Uuid::new_v4().to_string(),
                            action.entity.id.to_string(),
                        ),
                    )
                    .map(|_| ())
            }
            ActionKind::Skip => Ok(()),
        };

        result.map_err(|e| TransportError::Apply(e.to_string()))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<JsonRecord> {
    let id: String = row.get(0)?;
    let payload: String = row.get(1)?;
    let created_ms: i64 = row.get(2)?;
    let updated_ms: i64 = row.get(3)?;
    let deleted_ms: Option<i64> = row.get(4)?;
    let token: Option<String> = row.get(5)?;

    Ok(JsonRecord {
        id: parse_uuid(0, &id)?,
        payload: serde_json::from_str(&payload).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: parse_millis(2, created_ms)?,
        updated_at: parse_millis(3, updated_ms)?,
        deleted_at: deleted_ms.map(|ms| parse_millis(4, ms)).transpose()?,
        token: token.map(|t| parse_uuid(5, &t)).transpose()?,
    })
}

fn parse_uuid(column: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_millis(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(column, millis)
    })
}
