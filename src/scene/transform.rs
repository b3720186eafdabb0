//! Object placement

use crate::backend::types::ObjectUniform;
use glam::{Mat4, Quat, Vec3};

/// Position, rotation and scale of a mesh in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Get the model matrix for this transform
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Rotate around an axis
    pub fn rotate_axis(&mut self, axis: Vec3, angle: f32) {
        let delta = Quat::from_axis_angle(axis, angle);
        self.rotation = delta * self.rotation;
    }

    /// Build uniform data for the vertex stage
    pub fn uniform_data(&self) -> ObjectUniform {
        ObjectUniform::from_model(self.matrix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let t = Transform::default().with_scale(Vec3::new(2.0, 1.0, 1.0));
        let u = t.uniform_data();
        // a normal of a plane tilted in XY must stay perpendicular after scaling
        let tangent = u.model.transform_vector3(Vec3::new(1.0, -1.0, 0.0));
        let normal = u.normal_matrix.transform_vector3(Vec3::new(1.0, 1.0, 0.0));
        assert!(tangent.dot(normal).abs() < 1e-6);
    }
}
