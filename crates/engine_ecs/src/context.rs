//! Process-scoped engine context.
//!
//! Everything a world needs from its surroundings (the worker pool and the
//! optional network bridge) is passed in through an [`EngineContext`]
//! instead of living in globals, so several independent worlds can coexist
//! in one process and in tests.

use std::fmt;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::network::NetworkBridge;

/// Tunables for the engine runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker thread count; `None` uses the hardware concurrency.
    pub worker_threads: Option<usize>,
    /// Prefix for worker thread names.
    pub thread_name: String,
    /// Number of entities a world reserves room for up front.
    pub entity_capacity: usize,
    /// Warn when a tick runs past its time budget.
    pub tick_budget_warn: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "ecs-worker".to_string(),
            entity_capacity: 4000,
            tick_budget_warn: true,
        }
    }
}

/// Shared runtime services for one or more worlds.
pub struct EngineContext {
    config: EngineConfig,
    pool: ThreadPool,
    network: Option<Arc<dyn NetworkBridge>>,
}

impl EngineContext {
    /// Build a context and its worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EcsError::ThreadPool`] if the pool cannot be created.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new();
        if let Some(threads) = config.worker_threads {
            builder = builder.num_threads(threads);
        }
        let prefix = config.thread_name.clone();
        let pool = builder
            .thread_name(move |index| format!("{prefix}-{index}"))
            .build()?;

        info!(
            workers = pool.current_num_threads(),
            entity_capacity = config.entity_capacity,
            "engine context ready"
        );

        Ok(Self {
            config,
            pool,
            network: None,
        })
    }

    /// Attach a network bridge notified about network identities.
    #[must_use]
    pub fn with_network(mut self, bridge: Arc<dyn NetworkBridge>) -> Self {
        self.network = Some(bridge);
        self
    }

    /// The configuration this context was built from.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared worker pool.
    #[must_use]
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// The network bridge, if any.
    #[must_use]
    pub fn network(&self) -> Option<&Arc<dyn NetworkBridge>> {
        self.network.as_ref()
    }

    /// Number of worker threads in the pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .field("workers", &self.worker_count())
            .field("network", &self.network.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.entity_capacity, 4000);
        assert!(config.worker_threads.is_none());
    }

    #[test]
    fn test_explicit_worker_count() {
        let ctx = EngineContext::new(EngineConfig {
            worker_threads: Some(3),
            ..EngineConfig::default()
        })
        .unwrap();
        assert_eq!(ctx.worker_count(), 3);
        assert!(ctx.network().is_none());
    }

    #[test]
    fn test_worker_thread_names() {
        let ctx = EngineContext::new(EngineConfig {
            worker_threads: Some(1),
            thread_name: "unit".to_string(),
            ..EngineConfig::default()
        })
        .unwrap();
        let name = ctx
            .pool()
            .install(|| std::thread::current().name().map(str::to_string));
        assert_eq!(name.as_deref(), Some("unit-0"));
    }
}
