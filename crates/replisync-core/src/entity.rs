//! Entity capability traits and replica-pair types.
//!
//! Synchronizable records are described by small composable traits rather
//! than one wide interface; every component declares exactly the
//! capabilities it reads.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::hash::Hash;
use uuid::Uuid;

/// A record with an opaque comparable identity.
pub trait Identified {
    /// The key type. `Ord` is required so plans can be ordered
    /// deterministically, `Hash` so change sets can be joined.
    type Key: Ord + Hash + Clone + Debug;

    /// Get this record's identity.
    fn key(&self) -> Self::Key;
}

/// A record carrying creation and last-update stamps.
pub trait Timestamped {
    /// When the record was created.
    fn created_at(&self) -> DateTime<Utc>;

    /// When the record was last written.
    fn updated_at(&self) -> DateTime<Utc>;
}

/// A record supporting soft deletion.
///
/// Invariant: a record with the delete flag set has a deletion stamp,
/// and that stamp is never earlier than the creation stamp.
pub trait SoftDeletable {
    /// Whether the record is soft-deleted.
    fn is_deleted(&self) -> bool;

    /// When the record was soft-deleted, if it was.
    fn deleted_at(&self) -> Option<DateTime<Utc>>;
}

/// A record carrying an opaque optimistic-concurrency token.
///
/// The token is regenerated on every successful write; two versions of the
/// same record with equal tokens are the same write observed twice.
pub trait VersionStamped {
    /// The current concurrency token, if the store assigns one.
    fn concurrency_token(&self) -> Option<Uuid>;
}

/// Umbrella trait for anything the synchronization core can move between
/// replicas.
pub trait SyncEntity: Identified + Timestamped + SoftDeletable + VersionStamped + Clone {
    /// The latest stamp carried by this record, across creation, update,
    /// and deletion.
    fn latest_timestamp(&self) -> DateTime<Utc> {
        let mut latest = self.created_at().max(self.updated_at());
        if let Some(deleted) = self.deleted_at() {
            latest = latest.max(deleted);
        }
        latest
    }
}

impl<T> SyncEntity for T where T: Identified + Timestamped + SoftDeletable + VersionStamped + Clone {}

/// Which replicas hold a version of a paired entity.
///
/// Derived purely from presence; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    /// Neither side holds the entity.
    Unspecified,
    /// Only the local replica holds it.
    LocalOnly,
    /// Only the remote replica holds it.
    RemoteOnly,
    /// Both replicas hold a version.
    Both,
}

/// The local and remote versions of one entity, joined by identity.
#[derive(Debug, Clone)]
pub struct EntityPair<E> {
    /// The local replica's version, if any.
    pub local: Option<E>,
    /// The remote replica's version, if any.
    pub remote: Option<E>,
}

impl<E> EntityPair<E> {
    /// Pair up the two sides' versions of one entity.
    #[must_use]
    pub fn new(local: Option<E>, remote: Option<E>) -> Self {
        Self { local, remote }
    }

    /// Which sides are present.
    #[must_use]
    pub fn kind(&self) -> PairKind {
        match (&self.local, &self.remote) {
            (None, None) => PairKind::Unspecified,
            (Some(_), None) => PairKind::LocalOnly,
            (None, Some(_)) => PairKind::RemoteOnly,
            (Some(_), Some(_)) => PairKind::Both,
        }
    }
}
