//! Corrective action planning.
//!
//! Given entity pairs joined by identity, the planner emits the ordered
//! list of repository actions that make the replicas converge. Planning is
//! pure; applying the actions is the orchestrator's job.
//!
//! # Decision tables
//!
//! One-way (remote authoritative): remote rows are inserted or updated
//! locally when newer, remote deletions propagate, and local rows without a
//! remote counterpart are deleted as orphans.
//!
//! Two-way: evaluated symmetrically per side, up to two actions per pair.
//! A deleted flag on either side dominates a concurrent update on the
//! other, on the rationale that silently resurrecting a deleted record is
//! unsafe.

use crate::entity::{EntityPair, SyncEntity};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which replica an action is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SyncTarget {
    /// No target; only meaningful as a default.
    Unspecified,
    /// The local replica.
    Local,
    /// The remote replica.
    Remote,
}

/// What an action does to its target replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Insert the entity.
    Insert,
    /// Overwrite the target's version with the entity.
    Update,
    /// Soft-delete the target's row.
    Delete,
    /// Nothing to do; never emitted by the planner.
    Skip,
}

impl ActionKind {
    /// Rank used for deterministic batch ordering: deletes first, then
    /// updates, then inserts, so an insert and a delete touching
    /// overlapping keys never trip a transient unique-key violation.
    fn order_rank(self) -> u8 {
        match self {
            Self::Delete => 0,
            Self::Update => 1,
            Self::Insert => 2,
            Self::Skip => 3,
        }
    }
}

/// One corrective write against one replica. Immutable value; the planner
/// never mutates entities in place.
#[derive(Debug, Clone)]
pub struct RepositoryAction<E> {
    /// The replica to write to.
    pub target: SyncTarget,
    /// What to do there.
    pub kind: ActionKind,
    /// The entity version to write (for deletes, the target's own row).
    pub entity: E,
}

impl<E> RepositoryAction<E> {
    /// An insert of `entity` into `target`.
    #[must_use]
    pub fn insert(target: SyncTarget, entity: E) -> Self {
        Self {
            target,
            kind: ActionKind::Insert,
            entity,
        }
    }

    /// An update of `target`'s version to `entity`.
    #[must_use]
    pub fn update(target: SyncTarget, entity: E) -> Self {
        Self {
            target,
            kind: ActionKind::Update,
            entity,
        }
    }

    /// A soft-delete of `entity` on `target`.
    #[must_use]
    pub fn delete(target: SyncTarget, entity: E) -> Self {
        Self {
            target,
            kind: ActionKind::Delete,
            entity,
        }
    }
}

/// Synchronization direction for a configured entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncMode {
    /// The remote replica is authoritative; only the local side is written.
    #[default]
    OneWay,
    /// Both replicas converge on each other.
    TwoWay,
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one-way" => Ok(Self::OneWay),
            "two-way" => Ok(Self::TwoWay),
            other => Err(format!("unknown sync mode '{other}'")),
        }
    }
}

/// Plan the corrective actions that converge the paired entities.
///
/// The output is deterministic: grouped by target replica, deletes before
/// updates before inserts within each group, ties broken by entity key.
/// Pairs needing no correction contribute nothing.
#[must_use]
pub fn plan<E: SyncEntity>(pairs: &[EntityPair<E>], mode: SyncMode) -> Vec<RepositoryAction<E>> {
    let mut actions = Vec::new();

    for pair in pairs {
        match mode {
            SyncMode::OneWay => plan_one_way(pair, &mut actions),
            SyncMode::TwoWay => plan_two_way(pair, &mut actions),
        }
    }

    actions.sort_by(|a, b| {
        (a.target, a.kind.order_rank(), a.entity.key()).cmp(&(
            b.target,
            b.kind.order_rank(),
            b.entity.key(),
        ))
    });

    tracing::debug!(actions = actions.len(), ?mode, "Planned corrective actions");

    actions
}

/// Remote is authoritative; only the local replica is written.
fn plan_one_way<E: SyncEntity>(pair: &EntityPair<E>, out: &mut Vec<RepositoryAction<E>>) {
    match (&pair.local, &pair.remote) {
        (None, None) => {}
        (None, Some(remote)) => {
            if !remote.is_deleted() {
                out.push(RepositoryAction::insert(SyncTarget::Local, remote.clone()));
            }
        }
        (Some(local), None) => {
            // No remote counterpart: the local row is an orphan.
            out.push(RepositoryAction::delete(SyncTarget::Local, local.clone()));
        }
        (Some(local), Some(remote)) => {
            if remote.is_deleted() {
                out.push(RepositoryAction::delete(SyncTarget::Local, local.clone()));
            } else if remote.updated_at() > local.updated_at() {
                out.push(RepositoryAction::update(SyncTarget::Local, remote.clone()));
            }
        }
    }
}

/// Symmetric evaluation; each side's own stamps decide independently.
fn plan_two_way<E: SyncEntity>(pair: &EntityPair<E>, out: &mut Vec<RepositoryAction<E>>) {
    match (&pair.local, &pair.remote) {
        (None, None) => {}
        (Some(local), None) => {
            if !local.is_deleted() {
                out.push(RepositoryAction::insert(SyncTarget::Remote, local.clone()));
            }
        }
        (None, Some(remote)) => {
            if !remote.is_deleted() {
                out.push(RepositoryAction::insert(SyncTarget::Local, remote.clone()));
            }
        }
        (Some(local), Some(remote)) => match (local.is_deleted(), remote.is_deleted()) {
            (true, true) => {}
            // Delete dominates update, regardless of stamps.
            (true, false) => {
                out.push(RepositoryAction::delete(SyncTarget::Remote, remote.clone()));
            }
            (false, true) => {
                out.push(RepositoryAction::delete(SyncTarget::Local, local.clone()));
            }
            (false, false) => {
                if remote.updated_at() > local.updated_at() {
                    out.push(RepositoryAction::update(SyncTarget::Local, remote.clone()));
                } else if local.updated_at() > remote.updated_at() {
                    out.push(RepositoryAction::update(SyncTarget::Remote, local.clone()));
                }
            }
        },
    }
}
