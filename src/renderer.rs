//! Backend-independent front end for filling a G-buffer

use crate::backend::traits::*;
use crate::backend::wgpu_backend::WgpuBackend;
use crate::pipeline::{GBufferPass, GpuMesh};
use crate::raster::{CpuGBuffer, SoftwareRasterizer};
use crate::resources::Mesh;
use crate::scene::Camera;
use crate::{BackendType, GBufferConfig};
use log::info;

/// What one [`GBufferRenderer::render`] call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub meshes_drawn: u32,
    pub meshes_culled: u32,
    pub triangles: u32,
}

/// Renderer wrapper to abstract over the GPU and the software path
pub enum GBufferRenderer {
    Wgpu {
        backend: Box<WgpuBackend>,
        pass: GBufferPass,
    },
    Software {
        rasterizer: SoftwareRasterizer,
        target: CpuGBuffer,
    },
}

impl GBufferRenderer {
    /// Create a renderer for the configured backend (native only - use new_async on web)
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(config: &GBufferConfig) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(config))
    }

    pub async fn new_async(config: &GBufferConfig) -> BackendResult<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(BackendError::InitializationFailed(format!(
                "G-buffer size must be non-zero, got {}x{}",
                config.width, config.height
            )));
        }

        match config.backend {
            BackendType::Wgpu => {
                let mut backend = Box::new(WgpuBackend::new_async().await?);
                let mut pass =
                    GBufferPass::new(backend.as_mut(), config.width, config.height, config.cull_mode)?;
                pass.set_filter_override(config.filter);
                Ok(GBufferRenderer::Wgpu { backend, pass })
            }
            BackendType::Software => {
                info!(
                    "Using the software G-buffer rasterizer ({}x{})",
                    config.width, config.height
                );
                let mut rasterizer = SoftwareRasterizer::new(config.cull_mode);
                rasterizer.filter_override = config.filter;
                Ok(GBufferRenderer::Software {
                    rasterizer,
                    target: CpuGBuffer::new(config.width, config.height),
                })
            }
        }
    }

    pub fn backend_type(&self) -> BackendType {
        match self {
            GBufferRenderer::Wgpu { .. } => BackendType::Wgpu,
            GBufferRenderer::Software { .. } => BackendType::Software,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            GBufferRenderer::Wgpu { pass, .. } => (pass.width(), pass.height()),
            GBufferRenderer::Software { target, .. } => (target.width(), target.height()),
        }
    }

    /// GPU objects currently owned by the wgpu path; `None` for software
    pub fn live_gpu_resources(&self) -> Option<LiveResources> {
        match self {
            GBufferRenderer::Wgpu { backend, .. } => Some(backend.live_resources()),
            GBufferRenderer::Software { .. } => None,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) -> BackendResult<()> {
        match self {
            GBufferRenderer::Wgpu { backend, pass } => pass.resize(backend.as_mut(), width, height),
            GBufferRenderer::Software { target, .. } => {
                *target = CpuGBuffer::new(width, height);
                Ok(())
            }
        }
    }

    /// Fill the G-buffer with `meshes` seen from `camera` and return it on the CPU
    pub fn render(
        &mut self,
        camera: &Camera,
        meshes: &[&Mesh],
    ) -> BackendResult<(CpuGBuffer, FrameStats)> {
        match self {
            GBufferRenderer::Wgpu { backend, pass } => {
                let backend = backend.as_mut();
                let mut gpu_meshes = Vec::with_capacity(meshes.len());
                for mesh in meshes {
                    match pass.prepare_mesh(backend, mesh) {
                        Ok(gpu_mesh) => gpu_meshes.push(gpu_mesh),
                        Err(e) => {
                            for gpu_mesh in gpu_meshes {
                                gpu_mesh.destroy(backend);
                            }
                            return Err(e);
                        }
                    }
                }

                let draws: Vec<(&Mesh, &GpuMesh)> =
                    meshes.iter().copied().zip(gpu_meshes.iter()).collect();
                let result = pass
                    .execute(backend, camera, &draws)
                    .and_then(|stats| Ok((stats, pass.read_back(backend)?)));

                for gpu_mesh in gpu_meshes {
                    gpu_mesh.destroy(backend);
                }
                let (stats, image) = result?;

                Ok((
                    CpuGBuffer::from_image(&image),
                    FrameStats {
                        meshes_drawn: stats.meshes_drawn,
                        meshes_culled: stats.meshes_culled,
                        triangles: stats.triangles,
                    },
                ))
            }
            GBufferRenderer::Software { rasterizer, target } => {
                let stats = rasterizer.render(target, camera, meshes);
                let drawn = meshes.len() as u32 - stats.meshes_culled;
                Ok((
                    target.clone(),
                    FrameStats {
                        meshes_drawn: drawn,
                        meshes_culled: stats.meshes_culled,
                        triangles: stats.triangles_submitted,
                    },
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn software_renderer_reports_stats() {
        let config = GBufferConfig {
            width: 64,
            height: 48,
            ..Default::default()
        };
        let mut renderer = GBufferRenderer::new(&config).unwrap();
        assert_eq!(renderer.backend_type(), BackendType::Software);

        let cube = Mesh::cube();
        let far_away = Mesh::cube()
            .with_transform(crate::scene::Transform::from_position(Vec3::new(0.0, 0.0, 5000.0)));
        let camera = Camera::new(Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO);

        let (gbuffer, stats) = renderer.render(&camera, &[&cube, &far_away]).unwrap();
        assert_eq!(stats.meshes_drawn, 1);
        assert_eq!(stats.meshes_culled, 1);
        assert_eq!(stats.triangles, 12);
        assert_eq!((gbuffer.width(), gbuffer.height()), (64, 48));
        assert!(gbuffer.coverage() > 0);
    }

    #[test]
    fn zero_size_is_rejected() {
        let config = GBufferConfig {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(
            GBufferRenderer::new(&config),
            Err(BackendError::InitializationFailed(_))
        ));
    }
}
