//! Spatial components.
//!
//! [`Transform3D`] is a plain value. Components live behind `Arc` once they
//! are attached to an entity, so the attachable versions ([`Transform`] and
//! [`Velocity`]) wrap their value in a lock and are updated in place by
//! systems.

use engine_component::Component;
use glam::{Quat, Vec3};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Position, rotation and scale in 3D space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform3D {
    /// World-space position.
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform3D {
    /// Origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::IDENTITY
        }
    }

    /// The 4×4 model matrix.
    #[must_use]
    pub fn to_matrix(&self) -> glam::Mat4 {
        glam::Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    #[must_use]
    pub fn translated(mut self, offset: Vec3) -> Self {
        self.position += offset;
        self
    }

    #[must_use]
    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation * self.rotation;
        self
    }

    #[must_use]
    pub fn scaled(mut self, factor: f32) -> Self {
        self.scale *= factor;
        self
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Attachable transform. Readers take a copy, writers update in place.
#[derive(Debug, Default)]
pub struct Transform(RwLock<Transform3D>);

impl Transform {
    #[must_use]
    pub fn new(value: Transform3D) -> Self {
        Self(RwLock::new(value))
    }

    /// A copy of the current value.
    #[must_use]
    pub fn get(&self) -> Transform3D {
        *self.0.read()
    }

    pub fn set(&self, value: Transform3D) {
        *self.0.write() = value;
    }

    /// Mutate the value under the write lock and return the result.
    pub fn update<R>(&self, f: impl FnOnce(&mut Transform3D) -> R) -> R {
        f(&mut self.0.write())
    }
}

impl From<Transform3D> for Transform {
    fn from(value: Transform3D) -> Self {
        Self::new(value)
    }
}

impl Component for Transform {
    fn type_name() -> &'static str {
        "Transform"
    }
}

/// Linear and angular velocity, in units and radians per second.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Motion {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl Motion {
    /// Advance `transform` by `dt` seconds of this motion.
    #[must_use]
    pub fn integrate(&self, transform: Transform3D, dt: f32) -> Transform3D {
        let spin = self.angular * dt;
        let rotation = if spin.length_squared() > 0.0 {
            Quat::from_scaled_axis(spin)
        } else {
            Quat::IDENTITY
        };
        transform
            .translated(self.linear * dt)
            .rotated(rotation)
    }
}

/// Attachable velocity.
#[derive(Debug, Default)]
pub struct Velocity(RwLock<Motion>);

impl Velocity {
    #[must_use]
    pub fn new(linear: Vec3, angular: Vec3) -> Self {
        Self(RwLock::new(Motion { linear, angular }))
    }

    #[must_use]
    pub fn get(&self) -> Motion {
        *self.0.read()
    }

    pub fn set(&self, value: Motion) {
        *self.0.write() = value;
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Motion) -> R) -> R {
        f(&mut self.0.write())
    }
}

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}
