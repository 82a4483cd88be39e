//! Optimistic-concurrency conflict values and resolution policy.

use crate::entity::SyncEntity;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Two versions of one entity whose concurrency tokens diverged.
///
/// `expected` is the version the writer believed current (the in-memory or
/// client version); `actual` is what the store really holds (the persisted
/// or server version).
#[derive(Debug, Clone)]
pub struct ConcurrencyConflict<E> {
    /// The version the writer expected.
    pub expected: E,
    /// The version actually persisted.
    pub actual: E,
}

/// How commit-time concurrency violations are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResolvePolicy {
    /// The in-memory version overwrites what the store holds.
    PreferIncoming,
    /// The persisted version wins; the in-memory edit is dropped.
    PreferStored,
    /// Nothing is resolved automatically; the caller decides.
    #[default]
    Manual,
}

impl ResolvePolicy {
    /// Pick the winning version for one conflict, or `None` when the policy
    /// leaves the decision to the caller.
    #[must_use]
    pub fn choose<E: SyncEntity>(self, conflict: &ConcurrencyConflict<E>) -> Option<E> {
        match self {
            Self::PreferIncoming => Some(conflict.expected.clone()),
            Self::PreferStored => Some(conflict.actual.clone()),
            Self::Manual => None,
        }
    }
}

impl FromStr for ResolvePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prefer-incoming" => Ok(Self::PreferIncoming),
            "prefer-stored" => Ok(Self::PreferStored),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown resolve policy '{other}'")),
        }
    }
}

/// The outcome of one commit attempt after resolution ran.
#[derive(Debug, Clone)]
pub struct ResolveOutcome<E> {
    /// Conflicts the resolver could not settle.
    pub conflicted: Vec<ConcurrencyConflict<E>>,
}

impl<E> ResolveOutcome<E> {
    /// An outcome with nothing left unresolved.
    #[must_use]
    pub fn clean() -> Self {
        Self {
            conflicted: Vec::new(),
        }
    }

    /// Whether anything remains for the caller to settle.
    ///
    /// Derived from the list so the flag and the list can never drift apart.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::note;

    #[test]
    fn policy_chooses_sides() {
        let conflict = ConcurrencyConflict {
            expected: note(1, 100, 200).token(1),
            actual: note(1, 100, 300).token(2),
        };

        assert_eq!(
            ResolvePolicy::PreferIncoming.choose(&conflict).unwrap().id,
            1
        );
        assert_eq!(
            ResolvePolicy::PreferIncoming
                .choose(&conflict)
                .unwrap()
                .updated_at,
            conflict.expected.updated_at
        );
        assert_eq!(
            ResolvePolicy::PreferStored
                .choose(&conflict)
                .unwrap()
                .updated_at,
            conflict.actual.updated_at
        );
        assert!(ResolvePolicy::Manual.choose(&conflict).is_none());
    }

    #[test]
    fn has_conflicts_is_derived() {
        let mut outcome = ResolveOutcome::<crate::fixtures::Note>::clean();
        assert!(!outcome.has_conflicts());

        outcome.conflicted.push(ConcurrencyConflict {
            expected: note(1, 100, 200),
            actual: note(1, 100, 300),
        });
        assert!(outcome.has_conflicts());
    }

    #[test]
    fn policy_parses_from_str() {
        assert_eq!(
            "prefer-incoming".parse::<ResolvePolicy>().unwrap(),
            ResolvePolicy::PreferIncoming
        );
        assert_eq!(
            "prefer-stored".parse::<ResolvePolicy>().unwrap(),
            ResolvePolicy::PreferStored
        );
        assert_eq!(
            "manual".parse::<ResolvePolicy>().unwrap(),
            ResolvePolicy::Manual
        );
        assert!("merge".parse::<ResolvePolicy>().is_err());
    }
}
