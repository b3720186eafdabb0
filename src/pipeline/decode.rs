//! Reading G-buffer texels back into surface attributes
//!
//! This is the consumer side of the attachment encoding, as a lighting pass
//! would see it.

use crate::pipeline::GBufferLayout;
use crate::shading::{decode_normal, GBufferTexel};
use glam::{Vec3, Vec4, Vec4Swizzles};

/// Surface attributes stored in one G-buffer pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedSurface {
    pub albedo: Vec3,
    /// Unit world-space normal
    pub normal: Vec3,
    pub specular: f32,
    pub ambient: Vec3,
}

impl DecodedSurface {
    /// Decode one pixel; `None` where no geometry was drawn
    pub fn decode(color: Vec4, normal: Vec4, ambient: Vec4, depth: f32) -> Option<Self> {
        if depth >= GBufferLayout::DEPTH_CLEAR {
            return None;
        }

        Some(Self {
            albedo: color.xyz(),
            normal: decode_normal(normal.xyz()).normalize_or_zero(),
            specular: normal.w,
            ambient: ambient.xyz(),
        })
    }

    pub fn from_texel(texel: &GBufferTexel) -> Self {
        Self {
            albedo: texel.color.xyz(),
            normal: decode_normal(texel.normal.xyz()).normalize_or_zero(),
            specular: texel.normal.w,
            ambient: texel.ambient.xyz(),
        }
    }
}
