//! Deferred G-buffer - the geometry pass of a deferred renderer
//!
//! Meshes are drawn into three color attachments and a depth buffer:
//! alpha-tested diffuse color, normal-mapped world-space normal with a
//! specular mask, and lightmap ambient. Two implementations fill it:
//! - **wgpu**: headless GPU pass recorded through [`backend::GraphicsBackend`]
//! - **Software**: CPU rasterizer running the same shading function
//!
//! # Features
//! - Per-fragment shading in [`shading::shade_fragment`], mirrored by the WGSL in
//!   [`pipeline::GBUFFER_SHADER`]
//! - Shader validation and SPIR-V output through naga
//! - Meshes made of surfaces, each with its own material
//! - Frustum culling on cached bounding boxes
//! - PNG export of every attachment

pub mod backend;
pub mod pipeline;
pub mod raster;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod shading;

pub use backend::wgpu_backend::WgpuBackend;
pub use pipeline::GBufferPass;
pub use raster::{CpuGBuffer, SoftwareRasterizer};
pub use renderer::GBufferRenderer;

use backend::types::{CullMode, FilterMode};

/// Backend selection for filling the G-buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Headless wgpu device
    Wgpu,
    /// CPU rasterizer, always available
    #[default]
    Software,
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wgpu" | "gpu" => Ok(BackendType::Wgpu),
            "software" | "cpu" => Ok(BackendType::Software),
            other => Err(format!("unknown backend '{other}', expected 'wgpu' or 'software'")),
        }
    }
}

/// Configuration for the G-buffer renderer
#[derive(Debug, Clone)]
pub struct GBufferConfig {
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
    /// Which backend to use
    pub backend: BackendType,
    /// Face culling of the geometry pass
    pub cull_mode: CullMode,
    /// Replaces the filter of every material sampler when set
    pub filter: Option<FilterMode>,
}

impl Default for GBufferConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            backend: BackendType::Software,
            cull_mode: CullMode::Back,
            filter: None,
        }
    }
}

/// Install `env_logger` with an `info` default; later calls are ignored
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
