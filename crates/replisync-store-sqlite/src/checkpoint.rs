//! `SQLite`-backed checkpoint store.

use chrono::{DateTime, Utc};
use replisync_core::{CheckpointStore, TransportError};
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;

/// Durable per-entity-type watermarks in a `SQLite` table.
pub struct SqliteCheckpointStore {
    conn: Connection,
}

impl SqliteCheckpointStore {
    /// Open or create a `SQLite` database.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be created.
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> SqliteResult<()> {
        self.conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS checkpoints (
                entity_type TEXT PRIMARY KEY,
                watermark_ms INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )?;

        Ok(())
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, entity_type: &str) -> Result<Option<DateTime<Utc>>, TransportError> {
        let millis: Option<i64> = self
            .conn
            .query_row(
                "SELECT watermark_ms FROM checkpoints WHERE entity_type = ?1",
                [entity_type],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TransportError::Checkpoint(e.to_string()))?;

        millis
            .map(|ms| {
                DateTime::from_timestamp_millis(ms).ok_or_else(|| {
                    TransportError::Checkpoint(format!("watermark out of range: {ms}"))
                })
            })
            .transpose()
    }

    async fn save(
        &self,
        entity_type: &str,
        watermark: DateTime<Utc>,
    ) -> Result<(), TransportError> {
        let now = Utc::now().timestamp_millis();

        self.conn
            .execute(
                r"
                INSERT OR REPLACE INTO checkpoints (entity_type, watermark_ms, updated_at)
                VALUES (?1, ?2, ?3)
                ",
                (entity_type, watermark.timestamp_millis(), now),
            )
            .map_err(|e| TransportError::Checkpoint(e.to_string()))?;

        tracing::debug!(entity_type, %watermark, "Checkpoint saved");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = SqliteCheckpointStore::in_memory().unwrap();

        assert_eq!(store.load("note").await.unwrap(), None);

        store.save("note", ts(1000)).await.unwrap();
        assert_eq!(store.load("note").await.unwrap(), Some(ts(1000)));

        // Later cycle advances the same key.
        store.save("note", ts(2000)).await.unwrap();
        assert_eq!(store.load("note").await.unwrap(), Some(ts(2000)));
    }

    #[tokio::test]
    async fn entity_types_are_independent() {
        let store = SqliteCheckpointStore::in_memory().unwrap();

        store.save("note", ts(1000)).await.unwrap();
        store.save("task", ts(3000)).await.unwrap();

        assert_eq!(store.load("note").await.unwrap(), Some(ts(1000)));
        assert_eq!(store.load("task").await.unwrap(), Some(ts(3000)));
    }

    #[tokio::test]
    async fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");

        {
            let store = SqliteCheckpointStore::open(&path).unwrap();
            store.save("note", ts(1000)).await.unwrap();
        }

        let store = SqliteCheckpointStore::open(&path).unwrap();
        assert_eq!(store.load("note").await.unwrap(), Some(ts(1000)));
    }
}
