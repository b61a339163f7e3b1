//! Error types for the simulation core.
//!
//! Lookup misses (unknown object or player IDs) are not errors:
//! the collider and registries answer them with `None` or an empty result.
//! What remains here are configuration failures, faults reported by tick
//! systems, and scheduler lifecycle failures.

use thiserror::Error;

/// Failure while loading or validating a [`crate::config::SimConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Error returned from [`crate::ticker::TickSystem::update`].
///
/// The scheduler logs it, bumps the system's error counter and moves on to
/// the next system. It never aborts the tick.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("system {system} failed: {reason}")]
    Failed { system: String, reason: String },
}

impl SystemError {
    pub fn failed(system: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            system: system.into(),
            reason: reason.into(),
        }
    }
}

/// Scheduler lifecycle errors.
#[derive(Debug, Error)]
pub enum TickerError {
    /// `Stop` is terminal; a stopped ticker cannot be started again.
    #[error("ticker has been stopped and cannot be restarted")]
    AlreadyStopped,

    #[error("failed to spawn tick loop thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to build timer runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
