//! A JSON-payload record satisfying the synchronization capability traits.

use chrono::{DateTime, Utc};
use replisync_core::{Identified, SoftDeletable, Timestamped, VersionStamped};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A synchronizable record with an arbitrary JSON payload.
///
/// The concurrency token is regenerated on every write the repository
/// performs; hosts mutate records through [`JsonRecord::edit`] and
/// [`JsonRecord::soft_delete`] so the stamps stay coherent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRecord {
    /// Record identity.
    pub id: Uuid,
    /// Application payload.
    pub payload: serde_json::Value,
    /// Creation stamp.
    pub created_at: DateTime<Utc>,
    /// Last-write stamp.
    pub updated_at: DateTime<Utc>,
    /// Deletion stamp; `Some` marks the record soft-deleted.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token.
    pub token: Option<Uuid>,
}

impl JsonRecord {
    /// Create a fresh record stamped at `at`.
    #[must_use]
    pub fn new(id: Uuid, payload: serde_json::Value, at: DateTime<Utc>) -> Self {
        Self {
            id,
            payload,
            created_at: at,
            updated_at: at,
            deleted_at: None,
            token: Some(Uuid::new_v4()),
        }
    }

    /// Replace the payload, bumping the update stamp.
    pub fn edit(&mut self, payload: serde_json::Value, at: DateTime<Utc>) {
        self.payload = payload;
        self.updated_at = at;
    }

    /// Soft-delete the record at `at`.
    pub fn soft_delete(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at.max(self.created_at));
    }
}

impl Identified for JsonRecord {
    type Key = Uuid;

    fn key(&self) -> Uuid {
        self.id
    }
}

impl Timestamped for JsonRecord {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl SoftDeletable for JsonRecord {
    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

impl VersionStamped for JsonRecord {
    fn concurrency_token(&self) -> Option<Uuid> {
        self.token
    }
}
