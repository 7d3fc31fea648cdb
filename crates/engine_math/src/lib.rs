//! # engine_math
//!
//! Math types for the engine. Re-exports [`glam`] for linear algebra and
//! defines spatial components that implement
//! [`Component`](engine_component::Component).

pub mod transform;

pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

pub use transform::{Motion, Transform, Transform3D, Velocity};
