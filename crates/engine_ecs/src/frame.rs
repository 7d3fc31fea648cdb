//! Double-buffered frame data for an external renderer.
//!
//! Each tick the scheduler clears the back buffer, copies the configured
//! render component types into it, then swaps it to the front. The renderer
//! reads the front buffer while the next frame is being built.
//!
//! ```text
//!   ┌──────────┐   swap   ┌──────────┐
//!   │  back    │ ───────▶ │  front   │ ──▶ renderer
//!   │ (tasks)  │ ◀─────── │          │
//!   └──────────┘          └──────────┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use engine_component::{Component, ComponentRef, ComponentTypeId};
use parking_lot::{RwLock, RwLockReadGuard};

use crate::entity::{Entity, EntityId};

/// One renderable component captured for a frame.
#[derive(Debug, Clone)]
pub struct RenderItem {
    /// Owner of the component.
    pub entity: EntityId,
    /// The component.
    pub component: ComponentRef<Entity>,
}

/// Everything the renderer needs from one tick.
#[derive(Debug, Default, Clone)]
pub struct FrameData {
    /// Tick that produced this frame.
    pub tick: u64,
    items: HashMap<ComponentTypeId, Vec<RenderItem>>,
}

impl FrameData {
    /// Forget every captured item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.tick = 0;
    }

    /// Record an item under its component type.
    pub fn push(&mut self, type_id: ComponentTypeId, item: RenderItem) {
        self.items.entry(type_id).or_default().push(item);
    }

    /// Items captured for a component type.
    #[must_use]
    pub fn items(&self, type_id: ComponentTypeId) -> &[RenderItem] {
        self.items
            .get(&type_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Captured components of type `T`.
    #[must_use]
    pub fn components_of<T: Component>(&self) -> Vec<Arc<T>> {
        self.items(T::component_type_id())
            .iter()
            .filter_map(|item| item.component.downcast::<T>())
            .collect()
    }

    /// Total number of captured items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Front/back pair of [`FrameData`].
#[derive(Debug, Default)]
pub struct FrameBuffers {
    buffers: [RwLock<FrameData>; 2],
    front: AtomicUsize,
    fresh: AtomicBool,
}

impl FrameBuffers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the back buffer.
    pub fn write_back<R>(&self, f: impl FnOnce(&mut FrameData) -> R) -> R {
        let back = self.front.load(Ordering::Acquire) ^ 1;
        f(&mut self.buffers[back].write())
    }

    /// Publish the back buffer as the new front.
    pub fn swap(&self) {
        self.front.fetch_xor(1, Ordering::AcqRel);
        self.fresh.store(true, Ordering::Release);
    }

    /// Read the front buffer.
    #[must_use]
    pub fn read(&self) -> RwLockReadGuard<'_, FrameData> {
        self.buffers[self.front.load(Ordering::Acquire)].read()
    }

    /// Returns `true` once per swap.
    pub fn take_new_frame(&self) -> bool {
        self.fresh.swap(false, Ordering::AcqRel)
    }
}
