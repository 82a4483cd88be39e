//! # replisync-engine
//!
//! Drives the `replisync-core` algorithms end to end: snapshot both
//! replicas, compare, plan, apply through the host's repository
//! collaborators, and checkpoint only on full success.
//!
//! One engine owns one entity type. Engines for different entity types are
//! independent and may run in parallel; cycles for the same entity type are
//! serialized by the engine itself.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod config;
pub mod orchestrator;
pub mod resolve;

pub use cancel::CancelToken;
pub use config::{ConfigError, SyncOptions};
pub use orchestrator::{SyncEngine, SyncReport, SyncState};
pub use resolve::ConflictResolver;
