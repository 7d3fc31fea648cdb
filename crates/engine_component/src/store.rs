//! The per-owner Component Store.
//!
//! A [`ComponentStore`] keeps two indexes keyed by [`ComponentTypeId`]:
//!
//! - **components** — concrete type → the instances of exactly that type.
//! - **redundant** — alternate/base type → every instance that declared it.
//!
//! Every cell present under its concrete type is also present under each of
//! its alternate types, and removal clears both. Each type bucket is guarded
//! by its own shard lock (via [`DashMap`]), so writers touching different
//! types do not contend. Alternate entries are written while the concrete
//! bucket is locked, so an insert and a remove of the same cell never
//! interleave. Sequences of calls are not atomic as a group.
//!
//! Owners react to membership changes through [`StoreHooks`]. Hooks are
//! always invoked after bucket locks have been released, so a hook may
//! freely query or mutate the store that called it.

use std::sync::Arc;

use dashmap::DashMap;

use crate::cell::{ComponentCell, ComponentRef, key_of};
use crate::component::{Component, ComponentTypeId};
use crate::error::StoreError;
use crate::set::ComponentSet;

/// Callbacks fired when a cell enters or leaves a store.
pub trait StoreHooks<O>: Send + Sync {
    /// Invoked after `cell` was added.
    fn on_add_component(&self, _cell: &ComponentRef<O>) {}

    /// Invoked after `cell` was removed.
    fn on_remove_component(&self, _cell: &ComponentRef<O>) {}
}

/// Hooks that do nothing. Used by entity-local stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<O> StoreHooks<O> for NoHooks {}

/// Two-index component storage. See the [module docs](self).
#[derive(Debug)]
pub struct ComponentStore<O> {
    components: DashMap<ComponentTypeId, ComponentSet<O>>,
    redundant: DashMap<ComponentTypeId, ComponentSet<O>>,
}

impl<O> ComponentStore<O> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: DashMap::new(),
            redundant: DashMap::new(),
        }
    }

    // -- Membership --

    /// Insert a cell under its concrete type and every alternate type.
    ///
    /// Returns `false` (and fires no hook) if the cell was already present.
    pub fn insert(&self, cell: ComponentRef<O>, hooks: &dyn StoreHooks<O>) -> bool {
        {
            let mut concrete = self.components.entry(cell.type_id()).or_default();
            if !concrete.insert(Arc::clone(&cell)) {
                return false;
            }
            for alt in cell.alternate_types() {
                self.redundant
                    .entry(*alt)
                    .or_default()
                    .insert(Arc::clone(&cell));
            }
        }
        hooks.on_add_component(&cell);
        true
    }

    /// Remove a cell from its concrete bucket and every alternate bucket.
    ///
    /// Returns `false` (and fires no hook) if the cell was not present.
    pub fn remove(&self, cell: &ComponentRef<O>, hooks: &dyn StoreHooks<O>) -> bool {
        let type_id = cell.type_id();
        {
            let Some(mut concrete) = self.components.get_mut(&type_id) else {
                return false;
            };
            if concrete.remove(cell.key()).is_none() {
                return false;
            }
            for alt in cell.alternate_types() {
                Self::remove_from(&self.redundant, *alt, cell.key());
            }
        }
        self.components.remove_if(&type_id, |_, set| set.is_empty());
        hooks.on_remove_component(cell);
        true
    }

    fn remove_from(
        map: &DashMap<ComponentTypeId, ComponentSet<O>>,
        type_id: ComponentTypeId,
        key: usize,
    ) -> bool {
        let removed = map
            .get_mut(&type_id)
            .and_then(|mut set| set.remove(key))
            .is_some();
        if removed {
            map.remove_if(&type_id, |_, set| set.is_empty());
        }
        removed
    }

    /// Attach a shared component with no owner and return it.
    pub fn add_component<T: Component>(&self, value: Arc<T>, hooks: &dyn StoreHooks<O>) -> Arc<T> {
        self.insert(ComponentCell::new(Arc::clone(&value)), hooks);
        value
    }

    /// Detach a component by instance. Returns `true` if it was present.
    pub fn remove_component<T: Component>(&self, value: &Arc<T>, hooks: &dyn StoreHooks<O>) -> bool {
        match self.find(value) {
            Some(cell) => self.remove(&cell, hooks),
            None => false,
        }
    }

    /// Find the cell wrapping `value`.
    #[must_use]
    pub fn find<T: Component>(&self, value: &Arc<T>) -> Option<ComponentRef<O>> {
        self.components
            .get(&T::component_type_id())
            .and_then(|set| set.get(key_of(value)).cloned())
    }

    /// Returns `true` if the cell is indexed under its concrete type.
    #[must_use]
    pub fn contains(&self, cell: &ComponentCell<O>) -> bool {
        self.components
            .get(&cell.type_id())
            .is_some_and(|set| set.contains(cell.key()))
    }

    /// Remove every component without firing hooks.
    pub fn clear(&self) {
        self.components.clear();
        self.redundant.clear();
    }

    // -- Single lookups --

    /// The first component of exactly type `T`, falling back to the
    /// subclass index for `T`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if neither index has an entry for `T`;
    /// [`StoreError::TypeMismatch`] if the only match is a different
    /// concrete type indexed under `T` as an alternate.
    pub fn get_component<T: Component>(&self) -> Result<Arc<T>, StoreError> {
        let id = T::component_type_id();
        let exact = self
            .components
            .get(&id)
            .and_then(|set| set.first().cloned());
        let cell = match exact {
            Some(cell) => cell,
            None => self.subclass_first(id, T::type_name())?,
        };
        cell.downcast::<T>().ok_or(StoreError::TypeMismatch {
            expected: T::type_name(),
            found: cell.type_name(),
        })
    }

    /// The first component indexed under `T` as an alternate type.
    ///
    /// Which one is returned is unspecified when several qualify.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if nothing declares `T` as an alternate.
    pub fn get_component_of_subclass<T: Component>(&self) -> Result<ComponentRef<O>, StoreError> {
        self.subclass_first(T::component_type_id(), T::type_name())
    }

    fn subclass_first(
        &self,
        id: ComponentTypeId,
        type_name: &'static str,
    ) -> Result<ComponentRef<O>, StoreError> {
        self.redundant
            .get(&id)
            .and_then(|set| set.first().cloned())
            .ok_or(StoreError::NotFound { type_name })
    }

    /// Returns `true` if a component of type `T` or of a subclass of `T`
    /// is present.
    #[must_use]
    pub fn has_component_of_type<T: Component>(&self) -> bool {
        self.has_type_id(T::component_type_id()) || self.has_component_of_subclass::<T>()
    }

    /// Returns `true` if a component declaring `T` as an alternate is present.
    #[must_use]
    pub fn has_component_of_subclass<T: Component>(&self) -> bool {
        self.has_subclass_id(T::component_type_id())
    }

    /// Returns `true` if the concrete bucket for `id` is non-empty.
    #[must_use]
    pub fn has_type_id(&self, id: ComponentTypeId) -> bool {
        self.components.get(&id).is_some_and(|set| !set.is_empty())
    }

    /// Returns `true` if the alternate bucket for `id` is non-empty.
    #[must_use]
    pub fn has_subclass_id(&self, id: ComponentTypeId) -> bool {
        self.redundant.get(&id).is_some_and(|set| !set.is_empty())
    }

    // -- Bulk lookups (copies) --

    /// Copies of every component of exactly type `T`.
    #[must_use]
    pub fn get_all_components_of_type<T: Component>(&self) -> Vec<Arc<T>> {
        self.with_type_fast_path(T::component_type_id(), |cells| {
            cells.iter().filter_map(|c| c.downcast::<T>()).collect()
        })
    }

    /// Every component declaring `T` as an alternate type.
    ///
    /// A `T` instance appears here only if `T` lists itself among its own
    /// alternates; plain `T` instances are found with
    /// [`ComponentStore::get_all_components_of_type`].
    #[must_use]
    pub fn get_all_components_of_subclass<T: Component>(&self) -> Vec<ComponentRef<O>> {
        self.get_all_of_subclass_id(T::component_type_id())
    }

    /// Copy of the concrete bucket for `id`.
    #[must_use]
    pub fn get_all_of_type_id(&self, id: ComponentTypeId) -> Vec<ComponentRef<O>> {
        self.with_type_fast_path(id, |cells| cells.to_vec())
    }

    /// Copy of the alternate bucket for `id`.
    #[must_use]
    pub fn get_all_of_subclass_id(&self, id: ComponentTypeId) -> Vec<ComponentRef<O>> {
        self.with_subclass_fast_path(id, |cells| cells.to_vec())
    }

    // -- Fast paths --

    /// Borrow the live concrete bucket for `id` without copying.
    ///
    /// The bucket's lock is held while `f` runs: `f` must not add or remove
    /// components of this type on the same store.
    pub fn with_type_fast_path<R>(
        &self,
        id: ComponentTypeId,
        f: impl FnOnce(&[ComponentRef<O>]) -> R,
    ) -> R {
        match self.components.get(&id) {
            Some(set) => f(set.as_slice()),
            None => f(&[]),
        }
    }

    /// Borrow the live alternate bucket for `id` without copying.
    ///
    /// Same locking caveat as [`ComponentStore::with_type_fast_path`].
    pub fn with_subclass_fast_path<R>(
        &self,
        id: ComponentTypeId,
        f: impl FnOnce(&[ComponentRef<O>]) -> R,
    ) -> R {
        match self.redundant.get(&id) {
            Some(set) => f(set.as_slice()),
            None => f(&[]),
        }
    }

    /// Immutable snapshot of the concrete bucket for `id`.
    ///
    /// Cheap to share between threads; later store mutations are not
    /// reflected in it.
    #[must_use]
    pub fn snapshot_of_type(&self, id: ComponentTypeId) -> Arc<[ComponentRef<O>]> {
        self.with_type_fast_path(id, |cells| Arc::from(cells))
    }

    // -- Merge --

    /// Add every component of `other` to this store.
    ///
    /// Hooks fire once per newly added cell; cells already present are
    /// skipped, so merging twice is harmless. Returns the number added.
    pub fn merge(&self, other: &ComponentStore<O>, hooks: &dyn StoreHooks<O>) -> usize {
        if std::ptr::eq(self, other) {
            return 0;
        }
        other
            .cells()
            .into_iter()
            .filter(|cell| self.insert(Arc::clone(cell), hooks))
            .count()
    }

    /// Remove from this store every component that is present in `other`.
    ///
    /// Hooks fire once per removed cell. Returns the number removed.
    pub fn unmerge(&self, other: &ComponentStore<O>, hooks: &dyn StoreHooks<O>) -> usize {
        if std::ptr::eq(self, other) {
            return 0;
        }
        other
            .cells()
            .iter()
            .filter(|cell| self.remove(cell, hooks))
            .count()
    }

    // -- Introspection --

    /// Copies of every cell, once each.
    #[must_use]
    pub fn cells(&self) -> Vec<ComponentRef<O>> {
        self.components
            .iter()
            .flat_map(|bucket| bucket.value().to_vec())
            .collect()
    }

    /// Concrete type ids with at least one component.
    #[must_use]
    pub fn type_ids(&self) -> Vec<ComponentTypeId> {
        self.components.iter().map(|bucket| *bucket.key()).collect()
    }

    /// Alternate type ids with at least one component.
    #[must_use]
    pub fn subclass_type_ids(&self) -> Vec<ComponentTypeId> {
        self.redundant.iter().map(|bucket| *bucket.key()).collect()
    }

    /// Total number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.iter().map(|bucket| bucket.len()).sum()
    }

    /// Returns `true` if the store holds no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl<O> Default for ComponentStore<O> {
    fn default() -> Self {
        Self::new()
    }
}
