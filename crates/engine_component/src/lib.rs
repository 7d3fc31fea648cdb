//! # engine_component
//!
//! The "C" in ECS: what a component is and how an owner stores it.
//!
//! This crate provides:
//!
//! - [`Component`] trait and [`ComponentTypeId`], the contract all attached
//!   data must satisfy.
//! - [`ComponentCell`], a type-erased handle carrying index metadata and a
//!   weak owner back-reference.
//! - [`ComponentSet`], an unordered set with O(1) insert and removal.
//! - [`ComponentStore`], the two-index store (exact type and alternate type)
//!   shared by entities and worlds, with merge/unmerge and [`StoreHooks`].
//!
//! The store is generic over the owner type so that higher layers can plug in
//! their own entity without a dependency cycle.

pub mod cell;
pub mod component;
pub mod error;
pub mod set;
pub mod store;

pub use cell::{ComponentCell, ComponentKey, ComponentRef, key_of};
pub use component::{Capabilities, Component, ComponentTypeId, fnv1a};
pub use error::StoreError;
pub use set::ComponentSet;
pub use store::{ComponentStore, NoHooks, StoreHooks};
