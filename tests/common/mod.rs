//! Shared helpers for the G-buffer integration tests

#![allow(dead_code)]

use deferred_gbuffer::backend::types::{CullMode, Vertex};
use deferred_gbuffer::pipeline::GBufferAttachment;
use deferred_gbuffer::resources::{Material, Mesh, MeshBuilder, Surface, SurfaceData};
use deferred_gbuffer::scene::{Camera, Projection};
use deferred_gbuffer::{BackendType, CpuGBuffer, GBufferConfig, GBufferRenderer};
use glam::{Vec2, Vec3, Vec4};
use std::sync::Arc;

pub const WIDTH: u32 = 32;
pub const HEIGHT: u32 = 32;

/// Backends the tests run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Software,
    Wgpu,
}

pub struct TestContext {
    pub renderer: GBufferRenderer,
}

impl TestContext {
    /// `None` when the backend cannot be created on this machine
    pub fn new(backend: Backend) -> Option<Self> {
        Self::with_cull_mode(backend, CullMode::Back)
    }

    pub fn with_cull_mode(backend: Backend, cull_mode: CullMode) -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();

        let config = GBufferConfig {
            width: WIDTH,
            height: HEIGHT,
            backend: match backend {
                Backend::Software => BackendType::Software,
                Backend::Wgpu => BackendType::Wgpu,
            },
            cull_mode,
            filter: None,
        };
        match GBufferRenderer::new(&config) {
            Ok(renderer) => Some(Self { renderer }),
            Err(e) => {
                log::warn!("{:?} backend unavailable: {}", backend, e);
                None
            }
        }
    }

    pub fn render(&mut self, camera: &Camera, meshes: &[&Mesh]) -> CpuGBuffer {
        self.renderer
            .render(camera, meshes)
            .expect("G-buffer render should succeed")
            .0
    }
}

/// Camera on +Z looking at the origin, square aspect
pub fn front_camera() -> Camera {
    Camera::new(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO)
        .with_projection(Projection::perspective(60.0, 1.0, 0.1, 50.0))
}

/// Quad in the XY plane at depth `z`, facing +Z, with a constant second UV
pub fn quad_with_second_uv(z: f32, second_uv: Vec2, material: Material) -> Mesh {
    let v = |x: f32, y: f32, u: f32, vv: f32| {
        Vertex::new(
            Vec3::new(x, y, z),
            Vec3::Z,
            Vec2::new(u, vv),
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            second_uv,
        )
    };
    let data = SurfaceData::new(
        vec![
            v(-1.0, -1.0, 0.0, 1.0),
            v(1.0, -1.0, 1.0, 1.0),
            v(1.0, 1.0, 1.0, 0.0),
            v(-1.0, 1.0, 0.0, 0.0),
        ],
        vec![0, 1, 2, 0, 2, 3],
    )
    .expect("quad indices are valid");

    MeshBuilder::new("quad")
        .with_surface(Surface::new(Arc::new(data)).with_material(material))
        .build()
}

pub fn quad(z: f32, material: Material) -> Mesh {
    quad_with_second_uv(z, Vec2::splat(0.5), material)
}

/// RGBA8 value of one pixel of an attachment
pub fn pixel(gbuffer: &CpuGBuffer, attachment: GBufferAttachment, x: u32, y: u32) -> [u8; 4] {
    let bytes = gbuffer.to_rgba8(attachment);
    let i = ((y * gbuffer.width() + x) * 4) as usize;
    [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]
}

/// Compare with a per-channel tolerance for unorm rounding differences
pub fn assert_pixel(actual: [u8; 4], expected: [u8; 4], tolerance: u8, what: &str) {
    for c in 0..4 {
        let diff = (actual[c] as i16 - expected[c] as i16).unsigned_abs();
        assert!(
            diff <= tolerance as u16,
            "{what}: got {actual:?}, expected {expected:?} (channel {c})"
        );
    }
}

pub fn center() -> (u32, u32) {
    (WIDTH / 2, HEIGHT / 2)
}
