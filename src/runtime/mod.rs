//! Runtime core and public API
//!
//! This module groups the subsystems behind the control surface: the lifecycle
//! controller that enforces single initialization, the code loader that turns
//! a code package into an invocable handle, the dispatcher that schedules
//! activations on a bounded worker pool, and the per-activation environment.

use serde::{Deserialize, Serialize};

// Submodules
pub mod dispatcher;
pub mod entry_point;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod markers;

pub use dispatcher::{Backpressure, Dispatcher, InvocationRequest, InvocationResult};
pub use lifecycle::{LifecycleController, LifecycleState};
pub use loader::{ActionLoader, DylibLoader, Loadable};

/// Environment variable the orchestrator sets to enable concurrent activations.
///
/// Parsed as a case-insensitive boolean; anything other than `true` leaves the
/// proxy in serialized mode (one activation at a time).
pub const ALLOW_CONCURRENT_ENV: &str = "__OW_ALLOW_CONCURRENT";

/// Configuration for the action proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// TCP port the control surface listens on
    pub port: u16,

    /// Whether `/run` requests may execute concurrently
    pub allow_concurrent: bool,

    /// Maximum number of activations running user code at once
    pub max_workers: usize,

    /// Maximum number of admitted activations waiting for a worker
    pub queue_capacity: usize,

    /// What happens to an activation arriving while workers and queue are full
    pub backpressure: Backpressure,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            allow_concurrent: false,
            max_workers: 25,
            queue_capacity: 30,
            backpressure: Backpressure::Block,
        }
    }
}

impl ProxyConfig {
    /// Build a configuration from the process environment.
    ///
    /// Reads [`ALLOW_CONCURRENT_ENV`]; everything else keeps its default.
    pub fn from_env() -> Self {
        let allow_concurrent = std::env::var(ALLOW_CONCURRENT_ENV)
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            allow_concurrent,
            ..Self::default()
        }
    }

    /// Number of workers the dispatcher should be built with.
    ///
    /// Serialized mode pins the pool to a single worker regardless of
    /// `max_workers`, matching the deployment switch in the platform contract.
    pub fn effective_workers(&self) -> usize {
        if self.allow_concurrent {
            self.max_workers.max(1)
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_matches_platform_sizing() {
        let config = ProxyConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_workers, 25);
        assert_eq!(config.queue_capacity, 30);
        assert!(!config.allow_concurrent);
    }

    #[test]
    fn serialized_mode_uses_one_worker() {
        let config = ProxyConfig::default();
        assert_eq!(config.effective_workers(), 1);

        let concurrent = ProxyConfig {
            allow_concurrent: true,
            ..ProxyConfig::default()
        };
        assert_eq!(concurrent.effective_workers(), 25);
    }
}
