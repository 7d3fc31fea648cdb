//! Entities: addressable bundles of components.
//!
//! An [`Entity`] is always handled as `Arc<Entity>`. It owns a
//! [`ComponentStore`] of its own and, once spawned, a weak back-reference to
//! the [`World`] it lives in. Components attached to a spawned entity are
//! propagated to the world's merged store so world-level queries see them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use engine_component::{Component, ComponentCell, ComponentStore, NoHooks, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::system::{System, SystemId};
use crate::world::World;

/// Process-unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Allocate a fresh id. Ids start at 1 and are never reused.
    #[must_use]
    pub fn allocate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Lifecycle callbacks for an entity.
///
/// The world calls `start` and `stop`. It never calls `tick` itself: drive
/// it with [`Entity::tick`] from a system or script. Since that may happen on
/// any worker thread, implementations must synchronise their own state.
pub trait EntityBehavior: Send + Sync {
    /// Called once when the entity is spawned, before its components are
    /// merged into the world.
    fn start(&self, _entity: &Arc<Entity>) {}

    /// Called once when the entity is destroyed.
    fn stop(&self, _entity: &Arc<Entity>) {}

    /// Per-frame entity logic.
    fn tick(&self, _entity: &Arc<Entity>, _scale: f32) {}
}

/// A bundle of components with lifecycle hooks.
pub struct Entity {
    id: EntityId,
    me: Weak<Entity>,
    components: ComponentStore<Entity>,
    world: RwLock<Weak<World>>,
    systems_order: RwLock<Vec<SystemId>>,
    behavior: Option<Box<dyn EntityBehavior>>,
}

impl Entity {
    /// Create an entity with no behaviour.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    /// Create an entity driven by `behavior`.
    #[must_use]
    pub fn with_behavior(behavior: impl EntityBehavior + 'static) -> Arc<Self> {
        Self::build(Some(Box::new(behavior)))
    }

    fn build(behavior: Option<Box<dyn EntityBehavior>>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id: EntityId::allocate(),
            me: me.clone(),
            components: ComponentStore::new(),
            world: RwLock::new(Weak::new()),
            systems_order: RwLock::new(Vec::new()),
            behavior,
        })
    }

    /// This entity's id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The entity-local component store.
    #[must_use]
    pub fn components(&self) -> &ComponentStore<Entity> {
        &self.components
    }

    // -- Components --

    /// Attach a shared component.
    ///
    /// The owner back-reference is set before the component is stored, so
    /// add hooks can already resolve it. If the entity is spawned, the
    /// component is also added to the world's store.
    pub fn add_component<T: Component>(&self, value: Arc<T>) -> Arc<T> {
        let cell = ComponentCell::with_owner(Arc::clone(&value), &self.me);
        if self.components.insert(Arc::clone(&cell), &NoHooks)
            && let Some(world) = self.world()
        {
            world.components().insert(Arc::clone(&cell), &*world);
            // A destroy that ran concurrently may have unmerged before the insert.
            if !world.owns(self) {
                world.components().remove(&cell, &*world);
            }
        }
        value
    }

    /// Construct and attach a component.
    pub fn emplace_component<T: Component>(&self, value: T) -> Arc<T> {
        self.add_component(Arc::new(value))
    }

    /// Detach a component. Returns `true` if it was attached.
    ///
    /// If the entity is spawned, the component is also removed from the
    /// world's store.
    pub fn remove_component<T: Component>(&self, value: &Arc<T>) -> bool {
        let Some(cell) = self.components.find(value) else {
            return false;
        };
        let removed = self.components.remove(&cell, &NoHooks);
        if removed && let Some(world) = self.world() {
            world.components().remove(&cell, &*world);
        }
        removed
    }

    /// The first component of type `T` (or a subclass of `T`).
    ///
    /// # Errors
    ///
    /// See [`ComponentStore::get_component`].
    pub fn get_component<T: Component>(&self) -> Result<Arc<T>, StoreError> {
        self.components.get_component::<T>()
    }

    /// Returns `true` if a component of type `T` (or a subclass) is attached.
    #[must_use]
    pub fn has_component_of_type<T: Component>(&self) -> bool {
        self.components.has_component_of_type::<T>()
    }

    /// Every attached component of exactly type `T`.
    #[must_use]
    pub fn get_all_components_of_type<T: Component>(&self) -> Vec<Arc<T>> {
        self.components.get_all_components_of_type::<T>()
    }

    /// Rebind every component's owner back-reference to this entity.
    pub fn sync(&self) {
        for cell in self.components.cells() {
            cell.set_owner(&self.me);
        }
    }

    // -- World membership --

    /// The world this entity is spawned in.
    #[must_use]
    pub fn world(&self) -> Option<Arc<World>> {
        self.world.read().upgrade()
    }

    /// Returns `true` if the entity is spawned in a live world.
    #[must_use]
    pub fn is_in_world(&self) -> bool {
        self.world.read().strong_count() > 0
    }

    pub(crate) fn world_slot(&self) -> &RwLock<Weak<World>> {
        &self.world
    }

    // -- Systems order --

    /// Append system `S` to this entity's systems order.
    ///
    /// Duplicates are kept; position in the list is the intended order.
    pub fn add_system<S: System>(&self) {
        self.systems_order.write().push(SystemId::of::<S>());
    }

    /// Remove every occurrence of system `S` from the systems order.
    pub fn remove_system<S: System>(&self) {
        let id = SystemId::of::<S>();
        self.systems_order.write().retain(|&s| s != id);
    }

    /// Copy of the systems order.
    #[must_use]
    pub fn systems_order(&self) -> Vec<SystemId> {
        self.systems_order.read().clone()
    }

    // -- Lifecycle --

    fn strong(&self) -> Option<Arc<Entity>> {
        self.me.upgrade()
    }

    /// Run the start hook.
    pub fn start(&self) {
        if let (Some(behavior), Some(me)) = (&self.behavior, self.strong()) {
            behavior.start(&me);
        }
    }

    /// Run the stop hook.
    pub fn stop(&self) {
        if let (Some(behavior), Some(me)) = (&self.behavior, self.strong()) {
            behavior.stop(&me);
        }
    }

    /// Run the per-frame hook. Not called by the world.
    pub fn tick(&self, scale: f32) {
        if let (Some(behavior), Some(me)) = (&self.behavior, self.strong()) {
            behavior.tick(&me, scale);
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("components", &self.components.len())
            .field("in_world", &self.is_in_world())
            .finish_non_exhaustive()
    }
}
