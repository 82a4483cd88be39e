//! The synchronization state machine.
//!
//! A cycle walks `Idle → FetchingLocal → FetchingRemote → Comparing →
//! Planning → Applying → Committing → Idle`, with `Failed` reachable from
//! any state. The checkpoint store is written only while committing, after
//! every action landed; a failure anywhere earlier leaves the checkpoints
//! untouched so the next cycle re-derives the same change set
//! (at-least-once redelivery, never at-most-once).

use crate::cancel::CancelToken;
use crate::config::SyncOptions;
use chrono::{DateTime, Utc};
use replisync_core::{
    compare, plan, CheckpointStore, ConcurrencyConflict, DataChange, EntityPair, Repository, SyncEntity, SyncError, SyncTarget, TransportError,
};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tokio::sync::Mutex;

/// The states a cycle moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle running.
    Idle,
    /// Snapshotting the local replica.
    FetchingLocal,
    /// Snapshotting the remote replica.
    FetchingRemote,
    /// Comparing the two snapshots.
    Comparing,
    /// Planning corrective actions.
    Planning,
    /// Applying actions through the repositories.
    Applying,
    /// Persisting the new watermarks. Not cancellable once entered.
    Committing,
    /// The cycle aborted; checkpoints untouched.
    Failed,
}

/// What a completed cycle reports to the caller.
#[derive(Debug, Clone)]
pub enum SyncReport<E> {
    /// The cycle ran to completion and the checkpoint advanced.
    Completed {
        /// How many corrective actions were applied.
        actions_applied: usize,
        /// The new shared watermark, the max stamp either snapshot
        /// observed. `None` when neither side had ever changed.
        watermark: Option<DateTime<Utc>>,
    },
    /// The comparator found conflicts and auto-resolution was off. An
    /// expected business outcome, not an error; the checkpoints did not
    /// advance and the caller decides remediation.
    Conflicted {
        /// One entry per genuinely conflicting entity pair.
        conflicts: Vec<ConcurrencyConflict<E>>,
    },
}

/// Orchestrates synchronization cycles for one entity type.
pub struct SyncEngine<E, L, R, C> {
    entity_type: String,
    local: L,
    remote: R,
    checkpoints: C,
    options: SyncOptions,
    // Serializes cycles for this entity type; concurrent cycles could both
    // read the pre-commit checkpoint and double-apply actions.
    gate: Mutex<()>,
    _entity: PhantomData<E>,
}

impl<E, L, R, C> SyncEngine<E, L, R, C>
where
    E: SyncEntity,
    L: Repository<E>,
    R: Repository<E>,
    C: CheckpointStore,
{
    /// Create an engine for one entity type over its two repositories and
    /// the checkpoint store.
    pub fn new(
        entity_type: impl Into<String>,
        local: L,
        remote: R,
        checkpoints: C,
        options: SyncOptions,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            local,
            remote,
            checkpoints,
            options,
            gate: Mutex::new(()),
            _entity: PhantomData,
        }
    }

    /// The entity type this engine synchronizes.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Run one full cycle without external cancellation.
    ///
    /// # Errors
    ///
    /// See [`run_cycle_with`](Self::run_cycle_with).
    pub async fn run_cycle(&self) -> Result<SyncReport<E>, SyncError> {
        self.run_cycle_with(&CancelToken::new()).await
    }

    /// Run one full cycle, checking `cancel` between states.
    ///
    /// # Errors
    ///
    /// - [`SyncError::CycleInFlight`] if a cycle for this entity type is
    ///   already running.
    /// - [`SyncError::Cancelled`] if the token fired between two states
    ///   before committing started.
    /// - [`SyncError::Transport`] on any collaborator failure; retryable.
    /// - [`SyncError::InvalidBaseline`] / [`SyncError::DuplicateCreation`]
    ///   on integrity violations; these need operator intervention.
    pub async fn run_cycle_with(&self, cancel: &CancelToken) -> Result<SyncReport<E>, SyncError> {
        let Ok(_guard) = self.gate.try_lock() else {
            return Err(SyncError::CycleInFlight);
        };

        tracing::info!(entity_type = %self.entity_type, "Starting synchronization cycle");

        match self.cycle(cancel).await {
            Ok(report) => {
                self.trace_state(SyncState::Idle);
                Ok(report)
            }
            Err(err) => {
                self.trace_state(SyncState::Failed);
                tracing::warn!(
                    entity_type = %self.entity_type,
                    error = %err,
                    retryable = err.is_retryable(),
                    "Synchronization cycle aborted"
                );
                Err(err)
            }
        }
    }

    async fn cycle(&self, cancel: &CancelToken) -> Result<SyncReport<E>, SyncError> {
        let baseline = self.checkpoints.load(&self.entity_type).await?;

        self.enter(SyncState::FetchingLocal, cancel)?;
        let local_rows = self.local.fetch_changed_since(baseline).await?;
        let local_change = DataChange::build(baseline, local_rows)?;

        self.enter(SyncState::FetchingRemote, cancel)?;
        let remote_rows = self.remote.fetch_changed_since(baseline).await?;
        let remote_change = DataChange::build(baseline, remote_rows)?;

        self.enter(SyncState::Comparing, cancel)?;
        let outcome = compare(local_change, remote_change, self.options.auto_resolve)?;
        if !outcome.conflicts.is_empty() {
            tracing::warn!(
                entity_type = %self.entity_type,
                conflicts = outcome.conflicts.len(),
                "Unresolved conflicts; surfacing to caller"
            );
            return Ok(SyncReport::Conflicted {
                conflicts: outcome.conflicts,
            });
        }

        self.enter(SyncState::Planning, cancel)?;
        let pairs = pair_up(&outcome.client, &outcome.server);
        let actions = plan(&pairs, self.options.mode);

        self.enter(SyncState::Applying, cancel)?;
        for action in &actions {
            match action.target {
                SyncTarget::Local => self.local.apply(action).await?,
                SyncTarget::Remote => self.remote.apply(action).await?,
                SyncTarget::Unspecified => {
                    return Err(TransportError::Apply(
                        "action without a target replica".into(),
                    )
                    .into());
                }
            }
        }

        // The atomic boundary: cancellation is no longer honored and the
        // watermark becomes durable only here, after the whole batch landed.
        self.enter(SyncState::Committing, cancel)?;
        let watermark = merged_watermark(&outcome.client, &outcome.server);
        if let Some(watermark) = watermark {
            self.checkpoints.save(&self.entity_type, watermark).await?;
        }

        tracing::info!(
            entity_type = %self.entity_type,
            actions = actions.len(),
            ?watermark,
            "Synchronization cycle committed"
        );

        Ok(SyncReport::Completed {
            actions_applied: actions.len(),
            watermark,
        })
    }

    fn enter(&self, state: SyncState, cancel: &CancelToken) -> Result<(), SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        self.trace_state(state);
        Ok(())
    }

    fn trace_state(&self, state: SyncState) {
        tracing::debug!(entity_type = %self.entity_type, ?state, "State transition");
    }
}

/// The checkpoint both replicas advance to: the max stamp either snapshot
/// observed, so a cycle's own corrective writes never echo back as fresh
/// changes on the next run.
fn merged_watermark<E: SyncEntity>(
    local: &DataChange<E>,
    remote: &DataChange<E>,
) -> Option<DateTime<Utc>> {
    match (local.next_watermark(), remote.next_watermark()) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Join the two snapshots by identity into planner input.
fn pair_up<E: SyncEntity>(local: &DataChange<E>, remote: &DataChange<E>) -> Vec<EntityPair<E>> {
    let mut by_key: BTreeMap<E::Key, EntityPair<E>> = BTreeMap::new();

    for entity in local.entities() {
        by_key
            .entry(entity.key())
            .or_insert_with(|| EntityPair::new(None, None))
            .local = Some(entity.clone());
    }
    for entity in remote.entities() {
        by_key
            .entry(entity.key())
            .or_insert_with(|| EntityPair::new(None, None))
            .remote = Some(entity.clone());
    }

    by_key.into_values().collect()
}
