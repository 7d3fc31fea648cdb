//! Type-erased handle to one attached component instance.
//!
//! A [`ComponentCell`] is what the store indexes. It carries the concrete
//! type id, the alternate ids it is also indexed under, its capability tags,
//! and a weak back-reference to the owner (an entity, in practice). The owner
//! reference never keeps the owner alive; once the owner is dropped,
//! [`ComponentCell::owner`] reports `None`.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::component::{Capabilities, Component, ComponentTypeId};

/// Identity of a component instance: the address of its shared value.
///
/// Stable for as long as any store holds the cell, since the cell keeps the
/// value alive.
pub type ComponentKey = usize;

/// Shared handle to a [`ComponentCell`].
pub type ComponentRef<O> = Arc<ComponentCell<O>>;

/// One component instance together with its index metadata.
pub struct ComponentCell<O> {
    key: ComponentKey,
    type_id: ComponentTypeId,
    type_name: &'static str,
    alternates: Vec<ComponentTypeId>,
    capabilities: Capabilities,
    owner: RwLock<Weak<O>>,
    value: Arc<dyn Any + Send + Sync>,
}

impl<O> ComponentCell<O> {
    /// Wrap a shared component value. The cell starts without an owner.
    #[must_use]
    pub fn new<T: Component>(value: Arc<T>) -> ComponentRef<O> {
        Arc::new(Self {
            key: key_of(&value),
            type_id: T::component_type_id(),
            type_name: T::type_name(),
            alternates: T::alternate_types(),
            capabilities: T::capabilities(),
            owner: RwLock::new(Weak::new()),
            value,
        })
    }

    /// Wrap a shared component value already bound to `owner`.
    #[must_use]
    pub fn with_owner<T: Component>(value: Arc<T>, owner: &Weak<O>) -> ComponentRef<O> {
        let cell = Self::new(value);
        cell.set_owner(owner);
        cell
    }

    /// Identity key of the wrapped value.
    #[must_use]
    pub fn key(&self) -> ComponentKey {
        self.key
    }

    /// Concrete type id.
    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    /// Concrete type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Alternate (base/capability) type ids.
    #[must_use]
    pub fn alternate_types(&self) -> &[ComponentTypeId] {
        &self.alternates
    }

    /// Capability tags declared by the concrete type.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Resolve the owner, or `None` if it was never set or has been dropped.
    #[must_use]
    pub fn owner(&self) -> Option<Arc<O>> {
        self.owner.read().upgrade()
    }

    /// Bind the owner back-reference.
    pub fn set_owner(&self, owner: &Weak<O>) {
        *self.owner.write() = owner.clone();
    }

    /// Forget the owner.
    pub fn clear_owner(&self) {
        *self.owner.write() = Weak::new();
    }

    /// Returns `true` if the wrapped value is a `T`.
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Strong reference to the wrapped value as `T`.
    #[must_use]
    pub fn downcast<T: Component>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Returns `true` if this cell wraps the same instance as `value`.
    #[must_use]
    pub fn wraps<T: Component>(&self, value: &Arc<T>) -> bool {
        self.key == key_of(value)
    }
}

impl<O> fmt::Debug for ComponentCell<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCell")
            .field("key", &format_args!("{:#x}", self.key))
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Identity key for a shared component value.
#[must_use]
pub fn key_of<T>(value: &Arc<T>) -> ComponentKey {
    Arc::as_ptr(value) as *const () as usize
}
