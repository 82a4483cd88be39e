//! Error taxonomy for the synchronization core.
//!
//! Conflicts are *not* errors: they travel as data inside successful
//! results. Only collaborator failures and violated invariants surface
//! through these types.

use chrono::{DateTime, Utc};

/// A collaborator (repository, checkpoint store, commit context) failed.
///
/// Always retryable: the cycle aborts with its checkpoint untouched, so the
/// next cycle re-derives the same change set.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Fetching changed entities from a replica failed.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// Applying a corrective action to a replica failed.
    #[error("apply failed: {0}")]
    Apply(String),
    /// Committing an application context failed.
    #[error("commit failed: {0}")]
    Commit(String),
    /// Reading or writing a checkpoint failed.
    #[error("checkpoint store failed: {0}")]
    Checkpoint(String),
}

/// Errors produced by the synchronization core.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// A collaborator failed; safe to retry the whole cycle.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The baseline watermark is ahead of an entity the collaborator
    /// reported as changed. The watermark and the replica's clock disagree;
    /// operator intervention required.
    #[error("baseline {baseline} is ahead of entity {key} (latest stamp {latest})")]
    InvalidBaseline {
        /// The baseline the snapshot was built against.
        baseline: DateTime<Utc>,
        /// The offending entity's identity, rendered for diagnostics.
        key: String,
        /// The latest stamp the entity carries.
        latest: DateTime<Utc>,
    },

    /// The same identity was created independently on both replicas.
    /// A data-quality condition, never silently merged.
    #[error("identity {key} was created independently on both replicas")]
    DuplicateCreation {
        /// The identity minted twice, rendered for diagnostics.
        key: String,
    },

    /// A cycle for this entity type is already in flight.
    #[error("a synchronization cycle for this entity type is already in flight")]
    CycleInFlight,

    /// The cycle was cancelled between two states.
    #[error("synchronization cycle cancelled")]
    Cancelled,
}

impl SyncError {
    /// Whether retrying the cycle unchanged can succeed.
    ///
    /// Integrity failures need operator intervention first; an in-flight
    /// rejection needs the running cycle to finish.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Cancelled)
    }
}
