//! # replisync-core
//!
//! Pure synchronization logic for converging two independently evolving
//! data replicas.
//!
//! This crate provides:
//! - Entity capability traits (identity, timestamps, soft-delete, version stamp)
//! - Incremental change snapshots partitioned into created/modified/deleted
//! - Change-set comparison with optional last-writer-wins auto-resolution
//! - Deterministic per-replica action planning (one-way and two-way)
//! - Collaborator contracts for repositories, checkpoints, and commit contexts
//!
//! No I/O happens here; everything observable is a value. The orchestration
//! that drives these pieces against real collaborators lives in
//! `replisync-engine`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod change;
pub mod compare;
pub mod conflict;
pub mod entity;
pub mod error;
pub mod plan;
pub mod repo;

#[cfg(test)]
pub(crate) mod fixtures;

pub use change::DataChange;
pub use compare::{compare, CompareOutcome};
pub use conflict::{ConcurrencyConflict, ResolveOutcome, ResolvePolicy};
pub use entity::{
    EntityPair, Identified, PairKind, SoftDeletable, SyncEntity, Timestamped, VersionStamped,
};
pub use error::{SyncError, TransportError};
pub use plan::{plan, ActionKind, RepositoryAction, SyncMode, SyncTarget};
pub use repo::{ApplicationContext, CheckpointStore, CommitOutcome, Repository};
