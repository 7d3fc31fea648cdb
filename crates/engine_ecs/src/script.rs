//! Gameplay scripts.
//!
//! A [`ScriptComponent`] carries a boxed [`Script`]. The world starts the
//! script when the component joins it and stops it when the component leaves;
//! [`ScriptSystem`], registered in every world, ticks it each frame.

use std::fmt;
use std::sync::Arc;

use engine_component::{Capabilities, Component, ComponentTypeId};

use crate::entity::Entity;
use crate::error::SystemError;
use crate::system::System;

/// Per-entity gameplay logic.
pub trait Script: Send + Sync {
    /// Called when the script's entity is spawned (or the script is attached
    /// to an already spawned entity).
    fn start(&self, _entity: &Arc<Entity>) {}

    /// Called when the script leaves its world.
    fn stop(&self, _entity: &Arc<Entity>) {}

    /// Called once per frame from a worker thread.
    ///
    /// # Errors
    ///
    /// Any error aborts the rest of the frame.
    fn tick(&self, entity: &Arc<Entity>, scale: f32) -> Result<(), SystemError>;
}

/// Component wrapping a [`Script`].
pub struct ScriptComponent {
    script: Box<dyn Script>,
}

impl ScriptComponent {
    #[must_use]
    pub fn new(script: impl Script + 'static) -> Self {
        Self {
            script: Box::new(script),
        }
    }

    /// The wrapped script.
    #[must_use]
    pub fn script(&self) -> &dyn Script {
        self.script.as_ref()
    }
}

impl fmt::Debug for ScriptComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptComponent").finish_non_exhaustive()
    }
}

impl Component for ScriptComponent {
    fn type_name() -> &'static str {
        "ScriptComponent"
    }

    fn capabilities() -> Capabilities {
        Capabilities::SCRIPT
    }
}

/// Ticks every [`ScriptComponent`].
///
/// The system runs once per script component and ticks every script on the
/// entity, so an entity should carry a single script component.
#[derive(Debug, Default)]
pub struct ScriptSystem;

impl System for ScriptSystem {
    fn name(&self) -> &str {
        "ScriptSystem"
    }

    fn query_types(&self) -> Vec<ComponentTypeId> {
        vec![ScriptComponent::component_type_id()]
    }

    fn tick(&self, scale: f32, entity: &Arc<Entity>) -> Result<(), SystemError> {
        for component in entity.get_all_components_of_type::<ScriptComponent>() {
            component.script().tick(entity, scale)?;
        }
        Ok(())
    }
}
