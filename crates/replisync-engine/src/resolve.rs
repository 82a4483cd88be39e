//! Commit-time concurrency conflict resolution.
//!
//! Operates at single-application-context commit granularity, independent
//! of the two-way cycle: attempt the commit, and for every entity whose
//! persisted token no longer matches the expected one, pick a winner per
//! policy, stage it into a fresh context, and retry once. Whatever cannot
//! be resolved stays in the outcome for the caller.

use replisync_core::{
    ApplicationContext, CommitOutcome, ConcurrencyConflict, ResolveOutcome, ResolvePolicy,
    SyncEntity, TransportError,
};

/// Caller-supplied merge for conflicts the policy leaves open.
pub type MergeFn<E> = Box<dyn Fn(&ConcurrencyConflict<E>) -> Option<E> + Send + Sync>;

/// Resolves optimistic-concurrency violations detected at commit time.
pub struct ConflictResolver<E> {
    policy: ResolvePolicy,
    merge: Option<MergeFn<E>>,
}

impl<E: SyncEntity> ConflictResolver<E> {
    /// A resolver applying `policy` to every conflict.
    #[must_use]
    pub fn new(policy: ResolvePolicy) -> Self {
        Self {
            policy,
            merge: None,
        }
    }

    /// A resolver that consults `merge` for conflicts the policy leaves
    /// open (only the `Manual` policy does).
    #[must_use]
    pub fn with_merge(policy: ResolvePolicy, merge: MergeFn<E>) -> Self {
        Self {
            policy,
            merge: Some(merge),
        }
    }

    /// Commit `ctx`, resolving token mismatches per policy.
    ///
    /// Winners are re-applied through a fresh context from `fresh` and
    /// committed once more; conflicts surviving the retry, and conflicts
    /// the policy declined to settle, are returned in the outcome. The
    /// caller checks [`ResolveOutcome::has_conflicts`] to decide whether to
    /// surface a user-facing conflict or treat the commit as successful.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] only for storage failure; conflicts
    /// never become errors here.
    pub async fn resolve_commit<C, F>(
        &self,
        mut ctx: C,
        mut fresh: F,
    ) -> Result<ResolveOutcome<E>, TransportError>
    where
        C: ApplicationContext<E>,
        F: FnMut() -> C,
    {
        let conflicts = match ctx.commit().await? {
            CommitOutcome::Committed => return Ok(ResolveOutcome::clean()),
            CommitOutcome::Conflicted(conflicts) => conflicts,
        };

        tracing::debug!(
            conflicts = conflicts.len(),
            policy = ?self.policy,
            "Commit hit stale concurrency tokens"
        );

        let mut unresolved = Vec::new();
        let mut winners = Vec::new();
        for conflict in conflicts {
            match self.choose(&conflict) {
                Some(winner) => winners.push(winner),
                None => unresolved.push(conflict),
            }
        }

        if !winners.is_empty() {
            let mut retry = fresh();
            for winner in winners {
                retry.stage(winner);
            }
            if let CommitOutcome::Conflicted(remaining) = retry.commit().await? {
                unresolved.extend(remaining);
            }
        }

        if !unresolved.is_empty() {
            tracing::warn!(
                unresolved = unresolved.len(),
                "Concurrency conflicts left for the caller"
            );
        }

        Ok(ResolveOutcome {
            conflicted: unresolved,
        })
    }

    fn choose(&self, conflict: &ConcurrencyConflict<E>) -> Option<E> {
        self.policy
            .choose(conflict)
            .or_else(|| self.merge.as_ref().and_then(|merge| merge(conflict)))
    }
}
