//! Shared test fixtures.

use crate::entity::{Identified, SoftDeletable, Timestamped, VersionStamped};
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Minimal synchronizable record used across the unit tests.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Note {
    pub id: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub token: Option<Uuid>,
}

impl Identified for Note {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

impl Timestamped for Note {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl SoftDeletable for Note {
    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

impl VersionStamped for Note {
    fn concurrency_token(&self) -> Option<Uuid> {
        self.token
    }
}

impl Note {
    pub fn deleted(mut self, at: i64) -> Self {
        self.deleted_at = Some(ts(at));
        self
    }

    pub fn token(mut self, n: u8) -> Self {
        self.token = Some(Uuid::from_bytes([n; 16]));
        self
    }
}

/// Timestamp at `secs` seconds past the epoch.
pub(crate) fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// A live note created at `created` and last updated at `updated`.
pub(crate) fn note(id: u32, created: i64, updated: i64) -> Note {
    Note {
        id,
        created_at: ts(created),
        updated_at: ts(updated),
        deleted_at: None,
        token: None,
    }
}
