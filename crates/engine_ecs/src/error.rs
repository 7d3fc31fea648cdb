//! Error types for the ECS runtime.

use engine_component::StoreError;

use crate::entity::EntityId;

/// Error returned by a system's per-entity tick.
pub type SystemError = Box<dyn std::error::Error + Send + Sync>;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EcsError>;

/// Errors surfaced by entities, worlds and the tick scheduler.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// A single-component lookup failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The frame's ordering constraints contain a cycle.
    #[error("task graph contains a cycle through: {}", .cycle.join(", "))]
    InvalidGraph {
        /// Names of the tasks left on the cycle.
        cycle: Vec<String>,
    },

    /// A system's tick failed; the rest of the frame was abandoned.
    #[error("system '{system}' failed")]
    SystemFailed {
        /// Name of the failing system or task.
        system: String,
        /// The underlying failure.
        #[source]
        source: SystemError,
    },

    /// The worker pool could not be created.
    #[error("failed to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The entity already belongs to a world.
    #[error("entity {0} is already spawned")]
    AlreadySpawned(EntityId),

    /// The entity does not belong to this world.
    #[error("entity {0} is not spawned in this world")]
    NotSpawned(EntityId),
}
