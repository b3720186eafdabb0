//! Deferred geometry pass
//!
//! The G-buffer holds three color attachments and a depth buffer:
//!
//! - slot 0, color: diffuse albedo, alpha always 1 where geometry was drawn
//! - slot 1, normal: world-space normal encoded as `n * 0.5 + 0.5`, specular mask in alpha
//! - slot 2, ambient: lightmap contribution, alpha always 1 where geometry was drawn
//!
//! Pixels no geometry reaches keep the clear values, so a lighting pass can
//! tell background apart by alpha 0 or by depth 1.

pub mod decode;
pub mod gbuffer_pass;
pub mod shader;

pub use decode::DecodedSurface;
pub use gbuffer_pass::{GBufferImage, GBufferPass, GpuMesh, GpuSurface, PassStats, GBUFFER_SHADER};

use crate::backend::types::TextureFormat;

/// One color attachment of the G-buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GBufferAttachment {
    Color,
    Normal,
    Ambient,
}

impl GBufferAttachment {
    /// Attachments in fragment output order
    pub const ALL: [GBufferAttachment; 3] = [
        GBufferAttachment::Color,
        GBufferAttachment::Normal,
        GBufferAttachment::Ambient,
    ];

    /// `@location` of the attachment in the fragment stage
    pub fn slot(&self) -> u32 {
        match self {
            GBufferAttachment::Color => 0,
            GBufferAttachment::Normal => 1,
            GBufferAttachment::Ambient => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GBufferAttachment::Color => "color",
            GBufferAttachment::Normal => "normal",
            GBufferAttachment::Ambient => "ambient",
        }
    }

    pub fn format(&self) -> TextureFormat {
        GBufferLayout::COLOR_FORMAT
    }

    pub fn clear_value(&self) -> [f32; 4] {
        [0.0, 0.0, 0.0, 0.0]
    }
}

/// Formats and clear values shared by the GPU pass and the software rasterizer
#[derive(Debug, Clone, Copy)]
pub struct GBufferLayout;

impl GBufferLayout {
    pub const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
    pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
    pub const DEPTH_CLEAR: f32 = 1.0;
    pub const ATTACHMENT_COUNT: usize = GBufferAttachment::ALL.len();
}
