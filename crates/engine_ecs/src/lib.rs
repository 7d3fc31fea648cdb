//! # engine_ecs
//!
//! The "E" and "S" in ECS: entities, worlds, systems and the per-frame
//! parallel tick.
//!
//! - [`Entity`] — a bundle of components with lifecycle hooks.
//! - [`World`] — spawned entities, their merged component index, and
//!   [`World::tick`].
//! - [`System`] / [`SystemRegistry`] — behaviour ticked over component types,
//!   with before/after ordering and timed variants.
//! - [`FrameScheduler`] / [`TaskGraph`] — the per-frame dependency graph run
//!   on a rayon pool owned by the [`EngineContext`].
//! - Integration points for an external physics solver, gameplay scripts,
//!   a network bridge and a renderer ([`physics`], [`script`], [`network`],
//!   [`frame`]).

pub mod child;
pub mod context;
pub mod entity;
pub mod error;
pub mod frame;
pub mod graph;
pub mod network;
pub mod physics;
pub mod registry;
pub mod scheduler;
pub mod script;
pub mod system;
pub mod world;

pub use child::ChildEntity;
pub use context::{EngineConfig, EngineContext};
pub use entity::{Entity, EntityBehavior, EntityId};
pub use error::{EcsError, Result, SystemError};
pub use frame::{FrameBuffers, FrameData, RenderItem};
pub use graph::{TaskGraph, TaskId};
pub use network::{NetworkBridge, NetworkIdentity};
pub use physics::{
    NullSolver, PhysicsBody, PhysicsLinkSystemRead, PhysicsLinkSystemWrite, PhysicsSolver,
    RigidBodyDynamic, RigidBodyStatic,
};
pub use registry::{SystemEntry, SystemRegistry, TimedSystemEntry};
pub use scheduler::FrameScheduler;
pub use script::{Script, ScriptComponent, ScriptSystem};
pub use system::{FnSystem, System, SystemId};
pub use world::{PhysicsState, World, WorldBuilder, WorldHooks};
