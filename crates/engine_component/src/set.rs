//! Unordered, deduplicating set of component cells.
//!
//! Backed by a dense vector for iteration plus a key → slot index so that
//! membership and removal are O(1). Removal swaps the last element into the
//! hole, so iteration order is unspecified.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cell::{ComponentKey, ComponentRef};

/// A set of [`ComponentRef`]s keyed by instance identity.
#[derive(Debug)]
pub struct ComponentSet<O> {
    items: Vec<ComponentRef<O>>,
    offsets: HashMap<ComponentKey, usize>,
}

impl<O> ComponentSet<O> {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            offsets: HashMap::new(),
        }
    }

    /// Insert a cell. Returns `false` if the same instance is already present.
    pub fn insert(&mut self, cell: ComponentRef<O>) -> bool {
        if self.offsets.contains_key(&cell.key()) {
            return false;
        }
        self.offsets.insert(cell.key(), self.items.len());
        self.items.push(cell);
        true
    }

    /// Remove the cell with the given key, returning it if it was present.
    pub fn remove(&mut self, key: ComponentKey) -> Option<ComponentRef<O>> {
        let slot = self.offsets.remove(&key)?;
        let removed = self.items.swap_remove(slot);
        if let Some(moved) = self.items.get(slot) {
            self.offsets.insert(moved.key(), slot);
        }
        Some(removed)
    }

    /// Returns `true` if the instance with this key is present.
    #[must_use]
    pub fn contains(&self, key: ComponentKey) -> bool {
        self.offsets.contains_key(&key)
    }

    /// Look up a cell by key.
    #[must_use]
    pub fn get(&self, key: ComponentKey) -> Option<&ComponentRef<O>> {
        self.offsets.get(&key).map(|&slot| &self.items[slot])
    }

    /// The first cell in iteration order.
    #[must_use]
    pub fn first(&self) -> Option<&ComponentRef<O>> {
        self.items.first()
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the set holds no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over the cells.
    pub fn iter(&self) -> std::slice::Iter<'_, ComponentRef<O>> {
        self.items.iter()
    }

    /// The live cells as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[ComponentRef<O>] {
        &self.items
    }

    /// Copy the cells out.
    #[must_use]
    pub fn to_vec(&self) -> Vec<ComponentRef<O>> {
        self.items.iter().map(Arc::clone).collect()
    }
}

impl<O> Default for ComponentSet<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, O> IntoIterator for &'a ComponentSet<O> {
    type Item = &'a ComponentRef<O>;
    type IntoIter = std::slice::Iter<'a, ComponentRef<O>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
