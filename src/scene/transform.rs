//! Decomposed transforms
//!
//! Section deformations and the primitive's world placement are stored as
//! matrices. Every component call that takes one accepts a [`Transform`] as
//! well, since it converts into a `Mat4`.

use glam::{Mat4, Quat, Vec3};

/// Translation, rotation and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Create transform from position, rotation (euler angles in radians), and scale
    pub fn from_components(position: Vec3, rotation_euler: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::from_euler(
                glam::EulerRot::XYZ,
                rotation_euler.x,
                rotation_euler.y,
                rotation_euler.z,
            ),
            scale,
        }
    }

    /// Decompose an affine matrix
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Scale, then rotate, then translate
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }
}

impl From<Transform> for Mat4 {
    fn from(transform: Transform) -> Self {
        transform.matrix()
    }
}
