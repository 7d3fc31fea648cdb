//! Core [`Component`] trait, type identifiers and capability tags.
//!
//! Every piece of data attached to an entity must implement [`Component`].
//! The trait requires `Send + Sync + 'static` because components are shared
//! between the owning entity, the world-level index and worker threads that
//! tick systems over them.
//!
//! ## Type Identity
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! the FNV-1a 64-bit hash algorithm. The same name always yields the same id,
//! so base/alternate types can be named without a shared registry.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a type name using FNV-1a 64-bit.
    ///
    /// # Algorithm (FNV-1a 64-bit)
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325          (offset basis)
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3  (prime)
    /// return hash
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        Self(fnv1a(name))
    }

    /// Compute the [`ComponentTypeId`] for a component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        T::component_type_id()
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// FNV-1a 64-bit hash of a UTF-8 name.
///
/// Shared by component and system identifiers so both hash the same way.
#[must_use]
pub const fn fnv1a(name: &str) -> u64 {
    let bytes = name.as_bytes();
    let mut hash = ComponentTypeId::FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(ComponentTypeId::FNV_PRIME);
        i += 1;
    }
    hash
}

bitflags! {
    /// Cross-cutting capabilities a component type can declare.
    ///
    /// Stores owned by a world dispatch their add/remove hooks on these tags
    /// instead of probing the concrete type of each component.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        /// The component carries gameplay script callbacks.
        const SCRIPT = 1 << 0;
        /// The component is a body simulated by the physics solver.
        const PHYSICS_BODY = 1 << 1;
        /// The component identifies its owner to the network layer.
        const NETWORK_IDENTITY = 1 << 2;
        /// The component attaches a child entity to its owner.
        const CHILD_ENTITY = 1 << 3;
    }
}

/// The core component trait.
///
/// Components are shared as `Arc<T>`. Any state a system mutates during a
/// tick must use interior mutability (atomics, locks) because the same
/// component may be reached from several worker threads.
///
/// # Examples
///
/// ```rust
/// use engine_component::{Component, ComponentTypeId};
///
/// struct Collider;
/// impl Component for Collider {
///     fn type_name() -> &'static str { "Collider" }
/// }
///
/// struct BoxCollider { half_extent: f32 }
/// impl Component for BoxCollider {
///     fn type_name() -> &'static str { "BoxCollider" }
///     fn alternate_types() -> Vec<ComponentTypeId> {
///         vec![Collider::component_type_id()]
///     }
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// A human-readable name for this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    ///
    /// The default implementation hashes [`Component::type_name()`] with
    /// FNV-1a 64-bit.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }

    /// The base or capability types this component is also indexed under.
    ///
    /// A component that should answer subclass queries for its own type must
    /// list its own id here.
    fn alternate_types() -> Vec<ComponentTypeId> {
        Vec::new()
    }

    /// Capability tags used for hook dispatch.
    fn capabilities() -> Capabilities {
        Capabilities::empty()
    }
}
