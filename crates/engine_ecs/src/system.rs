//! The [`System`] trait and system identifiers.
//!
//! A system declares which component types it queries and how it must be
//! ordered relative to other systems. Every frame the scheduler invokes
//! [`System::tick`] once per component of each queried type, passing the
//! component's owning entity. Calls arrive concurrently from worker threads.

use std::fmt;
use std::sync::Arc;

use engine_component::{Component, ComponentTypeId, fnv1a};

use crate::entity::Entity;
use crate::error::SystemError;

/// Stable identity of a system, used as the task graph node key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub u64);

impl SystemId {
    /// Identity of the system type `S`.
    #[must_use]
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self(fnv1a(std::any::type_name::<S>()))
    }

    /// Identity derived from an explicit name.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        Self(fnv1a(name))
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Behaviour ticked over every component of its query types.
pub trait System: Send + Sync + 'static {
    /// Identity used for registration and ordering.
    ///
    /// Defaults to the identity of the implementing type.
    fn id(&self) -> SystemId {
        SystemId::of::<Self>()
    }

    /// Human-readable name for logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Component types whose instances drive this system's ticks.
    fn query_types(&self) -> Vec<ComponentTypeId>;

    /// Systems whose tasks must start only after this system's tasks finish.
    fn must_run_before(&self) -> Vec<SystemId> {
        Vec::new()
    }

    /// Systems whose tasks must finish before this system's tasks start.
    fn must_run_after(&self) -> Vec<SystemId> {
        Vec::new()
    }

    /// Run once per matching component, with the component's owner.
    ///
    /// # Errors
    ///
    /// Any error aborts the rest of the current frame.
    fn tick(&self, scale: f32, entity: &Arc<Entity>) -> Result<(), SystemError>;
}

/// A system built from a closure.
///
/// ```rust
/// use engine_ecs::{FnSystem, System};
/// # use engine_component::Component;
/// # struct Health;
/// # impl Component for Health { fn type_name() -> &'static str { "Health" } }
///
/// let regen = FnSystem::new("regen", |_scale, _entity| Ok(())).query::<Health>();
/// assert_eq!(regen.name(), "regen");
/// assert_eq!(regen.query_types().len(), 1);
/// ```
pub struct FnSystem<F> {
    id: SystemId,
    name: String,
    queries: Vec<ComponentTypeId>,
    before: Vec<SystemId>,
    after: Vec<SystemId>,
    func: F,
}

impl<F> FnSystem<F>
where
    F: Fn(f32, &Arc<Entity>) -> Result<(), SystemError> + Send + Sync + 'static,
{
    /// Create a system with no queries. Its id is derived from `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, func: F) -> Self {
        let name = name.into();
        Self {
            id: SystemId::from_name(&name),
            name,
            queries: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            func,
        }
    }

    /// Query components of type `T`.
    #[must_use]
    pub fn query<T: Component>(self) -> Self {
        self.query_id(T::component_type_id())
    }

    /// Query components by raw type id.
    #[must_use]
    pub fn query_id(mut self, id: ComponentTypeId) -> Self {
        self.queries.push(id);
        self
    }

    /// Require this system to run before `other`.
    #[must_use]
    pub fn before(mut self, other: SystemId) -> Self {
        self.before.push(other);
        self
    }

    /// Require this system to run after `other`.
    #[must_use]
    pub fn after(mut self, other: SystemId) -> Self {
        self.after.push(other);
        self
    }
}

impl<F> System for FnSystem<F>
where
    F: Fn(f32, &Arc<Entity>) -> Result<(), SystemError> + Send + Sync + 'static,
{
    fn id(&self) -> SystemId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn query_types(&self) -> Vec<ComponentTypeId> {
        self.queries.clone()
    }

    fn must_run_before(&self) -> Vec<SystemId> {
        self.before.clone()
    }

    fn must_run_after(&self) -> Vec<SystemId> {
        self.after.clone()
    }

    fn tick(&self, scale: f32, entity: &Arc<Entity>) -> Result<(), SystemError> {
        (self.func)(scale, entity)
    }
}

impl<F> fmt::Debug for FnSystem<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSystem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("queries", &self.queries)
            .finish_non_exhaustive()
    }
}
