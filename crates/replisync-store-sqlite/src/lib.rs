//! # replisync-store-sqlite
//!
//! `SQLite`-backed collaborator implementations for replisync: a durable
//! checkpoint store and a repository over JSON-payload records. Useful for
//! local-first hosts and for exercising the engine against real storage.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod record;
pub mod repository;

pub use checkpoint::SqliteCheckpointStore;
pub use record::JsonRecord;
pub use repository::SqliteRepository;
