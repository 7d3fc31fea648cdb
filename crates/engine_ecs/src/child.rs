//! Parent/child entity attachment.

use std::sync::Arc;

use engine_component::{Capabilities, Component};

use crate::entity::Entity;

/// Attaches a child entity to its owner.
///
/// When the owner joins a world the child is spawned into the same world;
/// when the owner leaves (or this component is removed) the child is
/// destroyed.
#[derive(Debug, Clone)]
pub struct ChildEntity {
    entity: Arc<Entity>,
}

impl ChildEntity {
    #[must_use]
    pub fn new(entity: Arc<Entity>) -> Self {
        Self { entity }
    }

    /// The attached child.
    #[must_use]
    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }
}

impl Component for ChildEntity {
    fn type_name() -> &'static str {
        "ChildEntity"
    }

    fn capabilities() -> Capabilities {
        Capabilities::CHILD_ENTITY
    }
}
