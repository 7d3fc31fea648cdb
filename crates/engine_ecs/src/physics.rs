//! Physics integration points.
//!
//! The solver itself is opaque. The world reaches it three ways:
//!
//! - body components (capability [`Capabilities::PHYSICS_BODY`]) spawn and
//!   destroy solver actors through the world's add/remove hooks;
//! - [`PhysicsLinkSystemWrite`] pushes entity state into the solver and
//!   [`PhysicsLinkSystemRead`] pulls simulated state back out;
//! - the scheduler runs [`PhysicsSolver::tick`] once per frame, after every
//!   write task and before every read task.

use std::sync::Arc;

use engine_component::{Capabilities, Component, ComponentTypeId};

use crate::entity::Entity;
use crate::error::SystemError;
use crate::script::ScriptSystem;
use crate::system::{System, SystemId};

/// An external physics simulation.
pub trait PhysicsSolver: Send + Sync {
    /// Create a simulated actor for `entity`.
    fn spawn(&self, entity: &Arc<Entity>);

    /// Remove `entity`'s simulated actor.
    fn destroy(&self, entity: &Arc<Entity>);

    /// Copy `entity`'s state into the simulation.
    fn write_entity(&self, _entity: &Arc<Entity>) {}

    /// Copy simulated state back onto `entity`.
    fn read_entity(&self, _entity: &Arc<Entity>) {}

    /// Advance the simulation by one frame.
    fn tick(&self, scale: f32);
}

/// A solver that simulates nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSolver;

impl PhysicsSolver for NullSolver {
    fn spawn(&self, _entity: &Arc<Entity>) {}

    fn destroy(&self, _entity: &Arc<Entity>) {}

    fn tick(&self, _scale: f32) {}
}

/// Base type every body component is indexed under.
#[derive(Debug)]
pub struct PhysicsBody;

impl Component for PhysicsBody {
    fn type_name() -> &'static str {
        "PhysicsBody"
    }
}

/// A body moved by the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBodyDynamic {
    /// Mass in kilograms.
    pub mass: f32,
}

impl Default for RigidBodyDynamic {
    fn default() -> Self {
        Self { mass: 1.0 }
    }
}

impl Component for RigidBodyDynamic {
    fn type_name() -> &'static str {
        "RigidBodyDynamic"
    }

    fn alternate_types() -> Vec<ComponentTypeId> {
        vec![PhysicsBody::component_type_id()]
    }

    fn capabilities() -> Capabilities {
        Capabilities::PHYSICS_BODY
    }
}

/// A body that collides but never moves.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RigidBodyStatic;

impl Component for RigidBodyStatic {
    fn type_name() -> &'static str {
        "RigidBodyStatic"
    }

    fn alternate_types() -> Vec<ComponentTypeId> {
        vec![PhysicsBody::component_type_id()]
    }

    fn capabilities() -> Capabilities {
        Capabilities::PHYSICS_BODY
    }
}

/// Pushes entity state into the solver before it steps.
pub struct PhysicsLinkSystemWrite {
    solver: Arc<dyn PhysicsSolver>,
}

impl PhysicsLinkSystemWrite {
    #[must_use]
    pub fn new(solver: Arc<dyn PhysicsSolver>) -> Self {
        Self { solver }
    }
}

impl System for PhysicsLinkSystemWrite {
    fn name(&self) -> &str {
        "PhysicsLinkSystemWrite"
    }

    fn query_types(&self) -> Vec<ComponentTypeId> {
        vec![
            RigidBodyDynamic::component_type_id(),
            RigidBodyStatic::component_type_id(),
        ]
    }

    fn tick(&self, _scale: f32, entity: &Arc<Entity>) -> Result<(), SystemError> {
        self.solver.write_entity(entity);
        Ok(())
    }
}

/// Pulls simulated state back onto entities after the solver steps.
///
/// Runs before script ticking so scripts observe this frame's simulation.
pub struct PhysicsLinkSystemRead {
    solver: Arc<dyn PhysicsSolver>,
}

impl PhysicsLinkSystemRead {
    #[must_use]
    pub fn new(solver: Arc<dyn PhysicsSolver>) -> Self {
        Self { solver }
    }
}

impl System for PhysicsLinkSystemRead {
    fn name(&self) -> &str {
        "PhysicsLinkSystemRead"
    }

    fn query_types(&self) -> Vec<ComponentTypeId> {
        vec![RigidBodyDynamic::component_type_id()]
    }

    fn must_run_before(&self) -> Vec<SystemId> {
        vec![SystemId::of::<ScriptSystem>()]
    }

    fn tick(&self, _scale: f32, entity: &Arc<Entity>) -> Result<(), SystemError> {
        self.solver.read_entity(entity);
        Ok(())
    }
}
