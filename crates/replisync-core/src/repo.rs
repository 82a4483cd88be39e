//! Collaborator contracts.
//!
//! The core consumes these and never implements them: the host process owns
//! transport, persistence, and scheduling. `replisync-store-sqlite` ships
//! reference implementations.

use crate::conflict::ConcurrencyConflict;
use crate::entity::SyncEntity;
use crate::error::TransportError;
use crate::plan::RepositoryAction;
use chrono::{DateTime, Utc};

/// One replica's storage, as the orchestrator sees it.
#[allow(async_fn_in_trait)]
pub trait Repository<E: SyncEntity> {
    /// Fetch every entity changed since the watermark (all of them when the
    /// watermark is `None`), one row per identity.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on any storage or network failure; the
    /// cycle aborts with its checkpoint untouched.
    async fn fetch_changed_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<E>, TransportError>;

    /// Apply one corrective action.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on failure; the orchestrator aborts the
    /// whole batch, never applying it partially.
    async fn apply(&self, action: &RepositoryAction<E>) -> Result<(), TransportError>;
}

/// Durable per-entity-type watermarks.
///
/// One watermark per entity type, shared by both replicas: it advances to
/// the maximum stamp either snapshot observed, so the corrective writes a
/// cycle itself performs never echo back as fresh changes on the next run.
/// Written only while a cycle is committing; that is the sole point where
/// synchronization state becomes durable.
#[allow(async_fn_in_trait)]
pub trait CheckpointStore {
    /// Load the persisted watermark, if one exists.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the store cannot be read.
    async fn load(&self, entity_type: &str) -> Result<Option<DateTime<Utc>>, TransportError>;

    /// Persist a new watermark.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the store cannot be written.
    async fn save(&self, entity_type: &str, watermark: DateTime<Utc>)
        -> Result<(), TransportError>;
}

/// What a commit attempt reported.
#[derive(Debug, Clone)]
pub enum CommitOutcome<E> {
    /// Every pending write landed.
    Committed,
    /// Some writes hit stale concurrency tokens and did not land.
    Conflicted(Vec<ConcurrencyConflict<E>>),
}

/// A unit-of-work about to commit, supplying the token-mismatch signal the
/// conflict resolver consumes.
#[allow(async_fn_in_trait)]
pub trait ApplicationContext<E: SyncEntity> {
    /// Attempt to commit the pending writes.
    ///
    /// Token mismatches are reported as [`CommitOutcome::Conflicted`], a
    /// normal result, never an error.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] only for storage or network failure.
    async fn commit(&mut self) -> Result<CommitOutcome<E>, TransportError>;

    /// Stage an entity version for the next commit attempt.
    ///
    /// Implementations adopt the currently persisted concurrency token for
    /// the staged row, so a version chosen by conflict resolution commits
    /// cleanly unless the row changes yet again in the meantime.
    fn stage(&mut self, entity: E);
}
