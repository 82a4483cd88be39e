//! Incremental change snapshots.
//!
//! A [`DataChange`] is a point-in-time view of one replica: everything that
//! changed since a baseline watermark, partitioned into created, modified,
//! and deleted entities. It is built fresh each cycle and never persisted;
//! only the watermark it computes survives, and only after the cycle fully
//! succeeds.

use crate::entity::SyncEntity;
use crate::error::SyncError;
use chrono::{DateTime, Utc};

/// The changes one replica accumulated since a baseline watermark.
///
/// Invariant: the three partitions are pairwise disjoint by identity. The
/// builder assigns each entity to exactly one partition, so the invariant
/// holds structurally as long as the input rows are unique by identity
/// (which the fetching collaborator guarantees).
#[derive(Debug, Clone)]
pub struct DataChange<E> {
    /// The watermark this snapshot was built against. `None` means a full
    /// sync: every row counts as changed.
    pub baseline: Option<DateTime<Utc>>,
    /// Entities created since the baseline.
    pub created: Vec<E>,
    /// Entities modified since the baseline.
    pub modified: Vec<E>,
    /// Entities soft-deleted since the baseline.
    pub deleted: Vec<E>,
    next_watermark: Option<DateTime<Utc>>,
}

impl<E: SyncEntity> DataChange<E> {
    /// An empty snapshot carrying the baseline through unchanged.
    #[must_use]
    pub fn empty(baseline: Option<DateTime<Utc>>) -> Self {
        Self {
            baseline,
            created: Vec::new(),
            modified: Vec::new(),
            deleted: Vec::new(),
            next_watermark: baseline,
        }
    }

    /// Partition a replica's changed rows into a snapshot.
    ///
    /// `rows` must already be filtered to "changed since `baseline`" by the
    /// fetching collaborator; this builder only decides *which kind* of
    /// change each row is, in priority order: deletion, then creation, then
    /// modification. Rows matching none are unchanged and excluded.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidBaseline`] if the baseline is strictly
    /// ahead of every stamp a row carries. That means the watermark and the
    /// replica's clock disagree; the builder never silently clamps.
    pub fn build(baseline: Option<DateTime<Utc>>, rows: Vec<E>) -> Result<Self, SyncError> {
        let mut change = Self::empty(baseline);
        let mut watermark = None;

        for row in rows {
            let latest = row.latest_timestamp();

            let partition = match baseline {
                None => {
                    if row.is_deleted() {
                        &mut change.deleted
                    } else {
                        &mut change.created
                    }
                }
                Some(b) => {
                    if row.is_deleted() && row.deleted_at().is_some_and(|d| d > b) {
                        &mut change.deleted
                    } else if row.created_at() > b {
                        &mut change.created
                    } else if row.updated_at() > b {
                        &mut change.modified
                    } else if latest < b {
                        return Err(SyncError::InvalidBaseline {
                            baseline: b,
                            key: format!("{:?}", row.key()),
                            latest,
                        });
                    } else {
                        // Unchanged at the watermark boundary.
                        continue;
                    }
                }
            };

            partition.push(row);
            watermark = Some(watermark.map_or(latest, |w: DateTime<Utc>| w.max(latest)));
        }

        change.next_watermark = watermark.or(baseline);

        tracing::debug!(
            created = change.created.len(),
            modified = change.modified.len(),
            deleted = change.deleted.len(),
            watermark = ?change.next_watermark,
            "Built change snapshot"
        );

        Ok(change)
    }

    /// The checkpoint to persist once the cycle this snapshot belongs to
    /// has fully succeeded.
    #[must_use]
    pub fn next_watermark(&self) -> Option<DateTime<Utc>> {
        self.next_watermark
    }

    /// Whether the snapshot carries no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Iterate over every entity in the snapshot, across all partitions.
    pub fn entities(&self) -> impl Iterator<Item = &E> {
        self.created
            .iter()
            .chain(self.modified.iter())
            .chain(self.deleted.iter())
    }
}
