//! Comparison of two change snapshots taken over the same window.
//!
//! Finds the identities both replicas touched and decides which overlaps
//! are genuine conflicts. With auto-resolution enabled the comparator
//! settles them by last-writer-wins; otherwise it hands them back untouched
//! for the caller to settle.

use crate::change::DataChange;
use crate::conflict::ConcurrencyConflict;
use crate::entity::{Identified, SyncEntity};
use crate::error::SyncError;
use std::collections::{HashMap, HashSet};

/// The result of comparing a client and a server snapshot.
#[derive(Debug, Clone)]
pub struct CompareOutcome<E> {
    /// The client snapshot, pruned of auto-resolved losers.
    pub client: DataChange<E>,
    /// The server snapshot, pruned of auto-resolved losers.
    pub server: DataChange<E>,
    /// Unresolved conflicts. Always empty when auto-resolution ran.
    pub conflicts: Vec<ConcurrencyConflict<E>>,
}

/// Compare two snapshots of the same window, one per replica.
///
/// Creations are accepted as-is when they happened on exactly one side.
/// For identities modified or deleted on both sides, equal concurrency
/// tokens (or equal update stamps, when either side lacks a token) mean the
/// same edit was observed twice and nothing conflicts. Diverging tokens are
/// conflicts: with `auto_resolve` the later update stamp wins (ties go to
/// the server, which is authoritative by convention) and the loser is
/// removed from its side so the planner never double-applies it; without
/// it, both sides stay untouched and the conflict is returned as data.
///
/// # Errors
///
/// Returns [`SyncError::DuplicateCreation`] when the same identity was
/// minted independently on both replicas. That is a data-quality condition
/// requiring operator intervention, never a merge.
pub fn compare<E: SyncEntity>(
    client: DataChange<E>,
    server: DataChange<E>,
    auto_resolve: bool,
) -> Result<CompareOutcome<E>, SyncError> {
    let mut client = client;
    let mut server = server;

    let client_created: HashSet<E::Key> = client.created.iter().map(Identified::key).collect();
    if let Some(dup) = server
        .created
        .iter()
        .find(|e| client_created.contains(&e.key()))
    {
        return Err(SyncError::DuplicateCreation {
            key: format!("{:?}", dup.key()),
        });
    }

    let client_touched: HashMap<E::Key, E> = client
        .modified
        .iter()
        .chain(client.deleted.iter())
        .map(|e| (e.key(), e.clone()))
        .collect();

    let mut conflicts = Vec::new();
    let mut prune_client = Vec::new();
    let mut prune_server = Vec::new();

    for server_version in server.modified.iter().chain(server.deleted.iter()) {
        let Some(client_version) = client_touched.get(&server_version.key()) else {
            continue;
        };

        if same_write(client_version, server_version) {
            continue;
        }

        if auto_resolve {
            // Last writer wins; ties go to the server.
            if client_version.updated_at() > server_version.updated_at() {
                prune_server.push(server_version.key());
            } else {
                prune_client.push(server_version.key());
            }
        } else {
            conflicts.push(ConcurrencyConflict {
                expected: client_version.clone(),
                actual: server_version.clone(),
            });
        }
    }

    remove_keys(&mut client, &prune_client);
    remove_keys(&mut server, &prune_server);

    tracing::debug!(
        conflicts = conflicts.len(),
        auto_resolved = prune_client.len() + prune_server.len(),
        "Compared change snapshots"
    );

    Ok(CompareOutcome {
        client,
        server,
        conflicts,
    })
}

/// Whether two versions of one entity are the same write observed twice.
fn same_write<E: SyncEntity>(a: &E, b: &E) -> bool {
    match (a.concurrency_token(), b.concurrency_token()) {
        (Some(ta), Some(tb)) => ta == tb,
        _ => a.updated_at() == b.updated_at(),
    }
}

fn remove_keys<E: SyncEntity>(change: &mut DataChange<E>, keys: &[E::Key]) {
    if keys.is_empty() {
        return;
    }
    change.modified.retain(|e| !keys.contains(&e.key()));
    change.deleted.retain(|e| !keys.contains(&e.key()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{note, ts, Note};

    fn snapshot(
        baseline: i64,
        created: Vec<Note>,
        modified: Vec<Note>,
        deleted: Vec<Note>,
    ) -> DataChange<Note> {
        let mut change = DataChange::empty(Some(ts(baseline)));
        change.created = created;
        change.modified = modified;
        change.deleted = deleted;
        change
    }

    #[test]
    fn one_sided_creations_pass_through() {
        let client = snapshot(0, vec![note(1, 100, 100)], vec![], vec![]);
        let server = snapshot(0, vec![note(2, 100, 100)], vec![], vec![]);

        let outcome = compare(client, server, false).unwrap();

        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.client.created.len(), 1);
        assert_eq!(outcome.server.created.len(), 1);
    }

    #[test]
    fn double_creation_is_an_integrity_error() {
        let client = snapshot(0, vec![note(7, 100, 100)], vec![], vec![]);
        let server = snapshot(0, vec![note(7, 110, 110)], vec![], vec![]);

        let err = compare(client, server, false).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateCreation { .. }));
    }

    #[test]
    fn equal_tokens_are_idempotent() {
        let client = snapshot(0, vec![], vec![note(1, 50, 200).token(9)], vec![]);
        let server = snapshot(0, vec![], vec![note(1, 50, 200).token(9)], vec![]);

        let outcome = compare(client, server, false).unwrap();

        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.client.modified.len(), 1);
        assert_eq!(outcome.server.modified.len(), 1);
    }

    #[test]
    fn missing_tokens_fall_back_to_update_stamps() {
        let client = snapshot(0, vec![], vec![note(1, 50, 200)], vec![]);
        let server = snapshot(0, vec![], vec![note(1, 50, 200)], vec![]);

        let outcome = compare(client, server, false).unwrap();
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn one_conflict_per_doubly_touched_pair() {
        let client = snapshot(
            0,
            vec![],
            vec![note(1, 50, 200).token(1), note(2, 50, 210).token(3)],
            vec![note(3, 50, 100).token(5).deleted(220)],
        );
        let server = snapshot(
            0,
            vec![],
            vec![note(1, 50, 205).token(2), note(2, 50, 215).token(4)],
            vec![note(3, 50, 100).token(6).deleted(230)],
        );

        let outcome = compare(client, server, false).unwrap();

        assert_eq!(outcome.conflicts.len(), 3);
        // Without auto-resolution both sides stay untouched.
        assert_eq!(outcome.client.modified.len(), 2);
        assert_eq!(outcome.client.deleted.len(), 1);
        assert_eq!(outcome.server.modified.len(), 2);
        assert_eq!(outcome.server.deleted.len(), 1);
    }

    #[test]
    fn auto_resolve_keeps_the_later_writer() {
        let client = snapshot(0, vec![], vec![note(1, 50, 300).token(1)], vec![]);
        let server = snapshot(0, vec![], vec![note(1, 50, 200).token(2)], vec![]);

        let outcome = compare(client, server, true).unwrap();

        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.client.modified.len(), 1);
        assert!(outcome.server.modified.is_empty());
    }

    #[test]
    fn auto_resolve_ties_go_to_the_server() {
        let client = snapshot(0, vec![], vec![note(1, 50, 200).token(1)], vec![]);
        let server = snapshot(0, vec![], vec![note(1, 50, 200).token(2)], vec![]);

        let outcome = compare(client, server, true).unwrap();

        assert!(outcome.conflicts.is_empty());
        assert!(outcome.client.modified.is_empty());
        assert_eq!(outcome.server.modified.len(), 1);
    }

    #[test]
    fn auto_resolve_prunes_the_losing_deletion() {
        let client = snapshot(0, vec![], vec![], vec![note(1, 50, 100).token(1).deleted(150)]);
        let server = snapshot(0, vec![], vec![note(1, 50, 400).token(2)], vec![]);

        let outcome = compare(client, server, true).unwrap();

        assert!(outcome.conflicts.is_empty());
        assert!(outcome.client.deleted.is_empty());
        assert_eq!(outcome.server.modified.len(), 1);
    }
}
