//! Rigid object poses.

use std::fmt;

use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Position, rotation and uniform scale of an object in the scene.
#[derive(Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub position: Point3<f32>,
    pub rotation: UnitQuaternion<f32>,
    /// Uniform scale factor. Never negative.
    pub scale: f32,
}

impl RigidTransform {
    /// The transform that leaves an object where it is.
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
            scale: 1.0,
        }
    }

    pub fn new(position: Point3<f32>, rotation: UnitQuaternion<f32>, scale: f32) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Maps a point from the object's local space into its parent's space.
    ///
    /// The point is scaled first, then rotated, then translated.
    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        self.position + self.rotation * (point.coords * self.scale)
    }

    /// Rotates and scales a direction vector, ignoring the translation.
    pub fn transform_vector(&self, vector: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * (vector * self.scale)
    }

    /// Returns `true` if every component of the transform is a finite number.
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite())
            && self.rotation.coords.iter().all(|c| c.is_finite())
            && self.scale.is_finite()
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for RigidTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (roll, pitch, yaw) = self.rotation.euler_angles();
        write!(
            f,
            "RigidTransform(pos=[{:.3}, {:.3}, {:.3}], rot=[{:.1}, {:.1}, {:.1}] deg, scale={:.4})",
            self.position.x,
            self.position.y,
            self.position.z,
            roll.to_degrees(),
            pitch.to_degrees(),
            yaw.to_degrees(),
            self.scale,
        )
    }
}
