//! The world: spawned entities, the merged component index and the tick.
//!
//! A [`World`] is always handled as `Arc<World>`. It owns every spawned
//! entity and a [`ComponentStore`] holding the union of their components, so
//! systems can find every component of a type without visiting entities.
//!
//! ## Tick
//!
//! [`World::tick`] runs three phases:
//!
//! 1. apply spawns/destroys buffered since the previous tick, then
//!    [`WorldHooks::pretick`];
//! 2. [`World::tick_ecs`]: select systems, build the frame's task graph
//!    and run it on the context's pool, blocking until it completes;
//! 3. [`WorldHooks::posttick`].
//!
//! Spawns and destroys requested while the graph is running are queued and
//! applied at the start of the next tick, so every task of a frame sees the
//! same entity set. An entity is queued at most once per direction, so a
//! repeated request in the same frame is refused just like a repeated
//! immediate one.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use dashmap::{DashMap, DashSet};
use engine_component::{
    Capabilities, Component, ComponentRef, ComponentStore, ComponentTypeId, StoreHooks,
};
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, error, info, warn};

use crate::child::ChildEntity;
use crate::context::EngineContext;
use crate::entity::{Entity, EntityId};
use crate::error::{EcsError, Result};
use crate::frame::{FrameBuffers, FrameData};
use crate::network::NetworkIdentity;
use crate::physics::{NullSolver, PhysicsLinkSystemRead, PhysicsLinkSystemWrite, PhysicsSolver};
use crate::registry::SystemRegistry;
use crate::scheduler::FrameScheduler;
use crate::script::{ScriptComponent, ScriptSystem};
use crate::system::{System, SystemId};

/// Single-threaded callbacks around the parallel part of a tick.
pub trait WorldHooks: Send + Sync {
    /// Runs before the frame's task graph.
    fn pretick(&self, _world: &World, _scale: f32) {}

    /// Runs after the frame's task graph completed.
    fn posttick(&self, _world: &World, _scale: f32) {}
}

/// Whether the physics link systems are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsState {
    /// [`World::init_physics`] has not been called.
    Inactive,
    /// Link systems are registered and the solver steps every tick.
    Active,
}

/// Builder for a [`World`].
pub struct WorldBuilder {
    context: Arc<EngineContext>,
    solver: Arc<dyn PhysicsSolver>,
    hooks: Option<Box<dyn WorldHooks>>,
    render_types: Vec<ComponentTypeId>,
}

impl WorldBuilder {
    /// Use `solver` for physics instead of [`NullSolver`].
    #[must_use]
    pub fn solver(mut self, solver: Arc<dyn PhysicsSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// Install pre/post tick hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: impl WorldHooks + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    /// Capture components of type `T` into the frame buffers every tick.
    #[must_use]
    pub fn render_type<T: Component>(mut self) -> Self {
        self.render_types.push(T::component_type_id());
        self
    }

    /// Build the world. [`ScriptSystem`] is registered up front.
    #[must_use]
    pub fn build(self) -> Arc<World> {
        let capacity = self.context.config().entity_capacity;
        let (spawn_tx, spawn_rx) = unbounded();
        let (destroy_tx, destroy_rx) = unbounded();

        let mut registry = SystemRegistry::new();
        registry.register_system(Arc::new(ScriptSystem));

        Arc::new_cyclic(|me| World {
            me: me.clone(),
            context: self.context,
            components: ComponentStore::new(),
            entities: DashMap::with_capacity(capacity),
            spawn_tx,
            spawn_rx,
            destroy_tx,
            destroy_rx,
            pending_spawns: DashSet::new(),
            pending_destroys: DashSet::new(),
            registry: RwLock::new(registry),
            solver: self.solver,
            hooks: self.hooks,
            physics_active: AtomicBool::new(false),
            ticking: AtomicBool::new(false),
            tick_count: AtomicU64::new(0),
            render_types: self.render_types,
            frames: FrameBuffers::new(),
        })
    }
}

/// Registry of spawned entities plus their merged components.
pub struct World {
    me: Weak<World>,
    context: Arc<EngineContext>,
    components: ComponentStore<Entity>,
    entities: DashMap<EntityId, Arc<Entity>>,
    spawn_tx: Sender<Arc<Entity>>,
    spawn_rx: Receiver<Arc<Entity>>,
    destroy_tx: Sender<Arc<Entity>>,
    destroy_rx: Receiver<Arc<Entity>>,
    pending_spawns: DashSet<EntityId>,
    pending_destroys: DashSet<EntityId>,
    registry: RwLock<SystemRegistry>,
    solver: Arc<dyn PhysicsSolver>,
    hooks: Option<Box<dyn WorldHooks>>,
    physics_active: AtomicBool,
    ticking: AtomicBool,
    tick_count: AtomicU64,
    render_types: Vec<ComponentTypeId>,
    frames: FrameBuffers,
}

impl World {
    /// A world with default settings.
    #[must_use]
    pub fn new(context: Arc<EngineContext>) -> Arc<Self> {
        Self::builder(context).build()
    }

    /// Start configuring a world.
    #[must_use]
    pub fn builder(context: Arc<EngineContext>) -> WorldBuilder {
        WorldBuilder {
            context,
            solver: Arc::new(NullSolver),
            hooks: None,
            render_types: Vec::new(),
        }
    }

    // -- Accessors --

    /// The merged component store.
    #[must_use]
    pub fn components(&self) -> &ComponentStore<Entity> {
        &self.components
    }

    /// The engine context.
    #[must_use]
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    /// The physics solver.
    #[must_use]
    pub fn solver(&self) -> &Arc<dyn PhysicsSolver> {
        &self.solver
    }

    /// Component types captured for the renderer.
    #[must_use]
    pub fn render_types(&self) -> &[ComponentTypeId] {
        &self.render_types
    }

    /// The renderer's double buffer.
    #[must_use]
    pub fn frames(&self) -> &FrameBuffers {
        &self.frames
    }

    /// The most recently published frame.
    #[must_use]
    pub fn frame(&self) -> RwLockReadGuard<'_, FrameData> {
        self.frames.read()
    }

    /// Returns `true` once per published frame.
    pub fn take_new_frame(&self) -> bool {
        self.frames.take_new_frame()
    }

    /// Number of ticks started so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Acquire)
    }

    /// Copies of every spawned entity.
    #[must_use]
    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.entities.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Number of spawned entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if `entity` is spawned in this world.
    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        self.entities.contains_key(&entity.id())
    }

    /// Every spawned component of exactly type `T`.
    #[must_use]
    pub fn get_all_components_of_type<T: Component>(&self) -> Vec<Arc<T>> {
        self.components.get_all_components_of_type::<T>()
    }

    /// Every spawned component declaring `T` as an alternate type.
    #[must_use]
    pub fn get_all_components_of_subclass<T: Component>(&self) -> Vec<ComponentRef<Entity>> {
        self.components.get_all_components_of_subclass::<T>()
    }

    // -- Systems --

    /// Register an always-tick system.
    pub fn register_system<S: System>(&self, system: Arc<S>) -> SystemId {
        self.registry.write().register_system(system)
    }

    /// Register a system that runs at most once per `interval`.
    pub fn register_timed_system<S: System>(&self, system: Arc<S>, interval: Duration) -> SystemId {
        self.registry.write().register_timed_system(system, interval)
    }

    /// Run `f` with exclusive access to the system registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut SystemRegistry) -> R) -> R {
        f(&mut self.registry.write())
    }

    /// Install the physics link systems. Returns `false` if already active.
    pub fn init_physics(&self) -> bool {
        if self
            .physics_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let mut registry = self.registry.write();
        registry.register_system(Arc::new(PhysicsLinkSystemWrite::new(Arc::clone(
            &self.solver,
        ))));
        registry.register_system(Arc::new(PhysicsLinkSystemRead::new(Arc::clone(
            &self.solver,
        ))));
        info!("physics initialised");
        true
    }

    /// Current physics state.
    #[must_use]
    pub fn physics_state(&self) -> PhysicsState {
        if self.is_physics_active() {
            PhysicsState::Active
        } else {
            PhysicsState::Inactive
        }
    }

    /// Returns `true` once [`World::init_physics`] has succeeded.
    #[must_use]
    pub fn is_physics_active(&self) -> bool {
        self.physics_active.load(Ordering::Acquire)
    }

    // -- Spawn / destroy --

    /// Add `entity` to this world. Returns `false` if it already belongs to
    /// a world.
    ///
    /// While a tick is running the spawn is queued for the next tick.
    pub fn spawn(&self, entity: &Arc<Entity>) -> bool {
        match self.try_spawn(entity) {
            Ok(()) => true,
            Err(err) => {
                debug!(%err, "spawn ignored");
                false
            }
        }
    }

    /// Like [`World::spawn`], reporting why a spawn was refused.
    ///
    /// # Errors
    ///
    /// [`EcsError::AlreadySpawned`] if the entity belongs to a world or is
    /// already queued for spawning here.
    pub fn try_spawn(&self, entity: &Arc<Entity>) -> Result<()> {
        if self.ticking.load(Ordering::Acquire) {
            if entity.is_in_world() || !self.spawn_deferred(Arc::clone(entity)) {
                return Err(EcsError::AlreadySpawned(entity.id()));
            }
            return Ok(());
        }
        self.spawn_now(entity)
    }

    /// Remove `entity` from this world. Returns `false` if it is not spawned
    /// here.
    ///
    /// While a tick is running the destroy is queued for the next tick.
    pub fn destroy(&self, entity: &Arc<Entity>) -> bool {
        match self.try_destroy(entity) {
            Ok(()) => true,
            Err(err) => {
                debug!(%err, "destroy ignored");
                false
            }
        }
    }

    /// Like [`World::destroy`], reporting why a destroy was refused.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotSpawned`] if the entity is not in this world or is
    /// already queued for destruction.
    pub fn try_destroy(&self, entity: &Arc<Entity>) -> Result<()> {
        if self.ticking.load(Ordering::Acquire) {
            if !self.owns(entity) || !self.destroy_deferred(Arc::clone(entity)) {
                return Err(EcsError::NotSpawned(entity.id()));
            }
            return Ok(());
        }
        self.destroy_now(entity)
    }

    /// Queue `entity` to be spawned at the start of the next tick.
    ///
    /// Returns `false` if it is already queued.
    pub fn spawn_deferred(&self, entity: Arc<Entity>) -> bool {
        let id = entity.id();
        if !self.pending_spawns.insert(id) {
            return false;
        }
        if self.spawn_tx.send(entity).is_err() {
            self.pending_spawns.remove(&id);
            warn!(entity = %id, "spawn queue closed");
            return false;
        }
        true
    }

    /// Queue `entity` to be destroyed at the start of the next tick.
    ///
    /// Returns `false` if it is already queued.
    pub fn destroy_deferred(&self, entity: Arc<Entity>) -> bool {
        let id = entity.id();
        if !self.pending_destroys.insert(id) {
            return false;
        }
        if self.destroy_tx.send(entity).is_err() {
            self.pending_destroys.remove(&id);
            warn!(entity = %id, "destroy queue closed");
            return false;
        }
        true
    }

    /// Apply every queued spawn, then every queued destroy.
    ///
    /// Returns the number of requests that took effect.
    pub fn apply_pending(&self) -> usize {
        let mut applied = 0;
        for entity in self.spawn_rx.try_iter() {
            self.pending_spawns.remove(&entity.id());
            applied += usize::from(self.spawn_now(&entity).is_ok());
        }
        for entity in self.destroy_rx.try_iter() {
            self.pending_destroys.remove(&entity.id());
            applied += usize::from(self.destroy_now(&entity).is_ok());
        }
        applied
    }

    /// Number of queued spawn and destroy requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending_spawns.len() + self.pending_destroys.len()
    }

    pub(crate) fn owns(&self, entity: &Entity) -> bool {
        std::ptr::eq(entity.world_slot().read().as_ptr(), self)
    }

    fn spawn_now(&self, entity: &Arc<Entity>) -> Result<()> {
        {
            let mut slot = entity.world_slot().write();
            if slot.strong_count() > 0 {
                return Err(EcsError::AlreadySpawned(entity.id()));
            }
            *slot = self.me.clone();
        }
        self.entities.insert(entity.id(), Arc::clone(entity));
        entity.sync();
        entity.start();
        let merged = self.components.merge(entity.components(), self);
        debug!(entity = %entity.id(), components = merged, "spawned entity");
        Ok(())
    }

    fn destroy_now(&self, entity: &Arc<Entity>) -> Result<()> {
        {
            let mut slot = entity.world_slot().write();
            if !std::ptr::eq(slot.as_ptr(), self) {
                return Err(EcsError::NotSpawned(entity.id()));
            }
            *slot = Weak::new();
        }
        entity.stop();
        let unmerged = self.components.unmerge(entity.components(), self);
        self.entities.remove(&entity.id());
        debug!(entity = %entity.id(), components = unmerged, "destroyed entity");
        Ok(())
    }

    // -- Tick --

    /// Run one frame: pending mutations, pretick, the task graph, posttick.
    ///
    /// # Errors
    ///
    /// Any error from [`World::tick_ecs`]; the posttick hook is skipped and
    /// the world stays usable for the next tick.
    pub fn tick(&self, scale: f32) -> Result<()> {
        self.tick_at(scale, Instant::now())
    }

    /// [`World::tick`] with an explicit frame timestamp for timed systems.
    ///
    /// # Errors
    ///
    /// See [`World::tick`].
    pub fn tick_at(&self, scale: f32, now: Instant) -> Result<()> {
        self.apply_pending();
        self.tick_count.fetch_add(1, Ordering::AcqRel);
        if let Some(hooks) = &self.hooks {
            hooks.pretick(self, scale);
        }
        self.tick_ecs_at(scale, now)?;
        if let Some(hooks) = &self.hooks {
            hooks.posttick(self, scale);
        }
        Ok(())
    }

    /// Build and run this frame's task graph, blocking until it completes.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidGraph`] if ordering constraints form a cycle, or
    /// the first [`EcsError::SystemFailed`] raised by a system.
    pub fn tick_ecs(&self, scale: f32) -> Result<()> {
        self.tick_ecs_at(scale, Instant::now())
    }

    fn tick_ecs_at(&self, scale: f32, now: Instant) -> Result<()> {
        let systems = self.registry.write().select_for_frame(now);
        let graph = FrameScheduler::build(self, &systems, scale);

        let result = {
            let _ticking = TickingGuard::enter(&self.ticking);
            graph.run(self.context.pool())
        };

        if let Err(err) = &result {
            error!(%err, tick = self.tick_count(), "frame aborted");
        }
        result
    }
}

/// Marks a world as ticking until dropped, including during unwinding.
struct TickingGuard<'a>(&'a AtomicBool);

impl<'a> TickingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for TickingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl StoreHooks<Entity> for World {
    fn on_add_component(&self, cell: &ComponentRef<Entity>) {
        let caps = cell.capabilities();
        if caps.is_empty() {
            return;
        }
        let Some(owner) = cell.owner() else {
            return;
        };

        if caps.contains(Capabilities::SCRIPT)
            && let Some(script) = cell.downcast::<ScriptComponent>()
        {
            script.script().start(&owner);
        }
        if caps.contains(Capabilities::PHYSICS_BODY) {
            self.solver.spawn(&owner);
        }
        if caps.contains(Capabilities::NETWORK_IDENTITY)
            && let Some(identity) = cell.downcast::<NetworkIdentity>()
            && identity.trigger_message()
            && let Some(bridge) = self.context.network()
        {
            bridge.spawn(&owner, &identity);
        }
        if caps.contains(Capabilities::CHILD_ENTITY)
            && let Some(child) = cell.downcast::<ChildEntity>()
        {
            self.spawn(child.entity());
        }
    }

    fn on_remove_component(&self, cell: &ComponentRef<Entity>) {
        let caps = cell.capabilities();
        if caps.is_empty() {
            return;
        }
        let Some(owner) = cell.owner() else {
            return;
        };

        if caps.contains(Capabilities::SCRIPT)
            && let Some(script) = cell.downcast::<ScriptComponent>()
        {
            script.script().stop(&owner);
        }
        if caps.contains(Capabilities::PHYSICS_BODY) {
            self.solver.destroy(&owner);
        }
        if caps.contains(Capabilities::NETWORK_IDENTITY)
            && let Some(identity) = cell.downcast::<NetworkIdentity>()
            && identity.trigger_message()
            && let Some(bridge) = self.context.network()
        {
            bridge.destroy(&owner, &identity);
        }
        if caps.contains(Capabilities::CHILD_ENTITY)
            && let Some(child) = cell.downcast::<ChildEntity>()
        {
            self.destroy(child.entity());
        }
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("components", &self.components.len())
            .field("physics", &self.physics_state())
            .field("ticks", &self.tick_count())
            .finish_non_exhaustive()
    }
}
