//! Viewpoint of the geometry pass

use crate::scene::Frustum;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Right-handed perspective projection with depth mapped to `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self::perspective(45.0, 16.0 / 9.0, 0.1, 1000.0)
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }
}

/// Look-at camera
///
/// The aspect ratio stored in the projection is only a default: both
/// backends replace it with the aspect of the target they render into, see
/// [`Camera::fitted_to`].
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO)
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            projection: Projection::default(),
        }
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.projection.aspect = width / height;
        }
    }

    /// Copy of this camera with the aspect of a `width` x `height` target
    pub fn fitted_to(&self, width: u32, height: u32) -> Self {
        let mut camera = self.clone();
        camera.set_aspect(width as f32, height as f32);
        camera
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection.matrix() * Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// World-space planes used to cull meshes before drawing
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection_matrix())
    }

    pub fn uniform_data(&self) -> CameraUniformData {
        CameraUniformData {
            view_proj: self.view_projection_matrix(),
        }
    }
}

/// Contents of the camera uniform buffer (group 0, binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniformData {
    pub view_proj: Mat4,
}
