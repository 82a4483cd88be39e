//! Engine configuration.

use replisync_core::{ResolvePolicy, SyncMode};

/// A configuration value could not be parsed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid value for {var}: {reason}")]
pub struct ConfigError {
    /// The environment variable at fault.
    pub var: String,
    /// Why its value was rejected.
    pub reason: String,
}

/// Per-entity-type synchronization options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Synchronization direction.
    pub mode: SyncMode,
    /// Whether the comparator settles conflicts by last-writer-wins instead
    /// of surfacing them to the caller.
    pub auto_resolve: bool,
    /// How commit-time concurrency violations are resolved.
    pub resolve_policy: ResolvePolicy,
}

impl SyncOptions {
    /// Load options from environment variables, falling back to defaults.
    ///
    /// # Environment Variables
    ///
    /// - `REPLISYNC_MODE`: "one-way" or "two-way"
    /// - `REPLISYNC_AUTO_RESOLVE`: "true" or "false"
    /// - `REPLISYNC_RESOLVE_POLICY`: "prefer-incoming", "prefer-stored", or "manual"
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is present but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut options = Self::default();

        if let Ok(mode) = std::env::var("REPLISYNC_MODE") {
            options.mode = mode.parse().map_err(|reason| ConfigError {
                var: "REPLISYNC_MODE".into(),
                reason,
            })?;
        }

        if let Ok(auto) = std::env::var("REPLISYNC_AUTO_RESOLVE") {
            options.auto_resolve = auto.parse().map_err(|_| ConfigError {
                var: "REPLISYNC_AUTO_RESOLVE".into(),
                reason: format!("expected 'true' or 'false', got '{auto}'"),
            })?;
        }

        if let Ok(policy) = std::env::var("REPLISYNC_RESOLVE_POLICY") {
            options.resolve_policy = policy.parse().map_err(|reason| ConfigError {
                var: "REPLISYNC_RESOLVE_POLICY".into(),
                reason,
            })?;
        }

        Ok(options)
    }
}
