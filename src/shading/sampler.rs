//! CPU texture sampling matching the GPU sampler state

use super::Sample2d;
use crate::backend::types::{AddressMode, FilterMode, SamplerDescriptor};
use crate::resources::TextureData;
use glam::{Vec2, Vec4};

/// Resolve an integer texel coordinate against an address mode
pub fn wrap_texel(i: i64, size: u32, mode: AddressMode) -> u32 {
    let n = size.max(1) as i64;
    let wrapped = match mode {
        AddressMode::ClampToEdge => i.clamp(0, n - 1),
        AddressMode::Repeat => i.rem_euclid(n),
        AddressMode::MirrorRepeat => {
            let m = i.rem_euclid(2 * n);
            if m < n {
                m
            } else {
                2 * n - 1 - m
            }
        }
    };
    wrapped as u32
}

/// A texture paired with the sampler it is read through
///
/// There is a single mip level, so only `mag_filter` is consulted.
#[derive(Debug, Clone, Copy)]
pub struct BoundTexture<'a> {
    pub texture: &'a TextureData,
    pub sampler: &'a SamplerDescriptor,
}

impl<'a> BoundTexture<'a> {
    pub fn new(texture: &'a TextureData, sampler: &'a SamplerDescriptor) -> Self {
        Self { texture, sampler }
    }

    fn fetch(&self, x: i64, y: i64) -> Vec4 {
        let tx = wrap_texel(x, self.texture.width, self.sampler.address_mode_u);
        let ty = wrap_texel(y, self.texture.height, self.sampler.address_mode_v);
        self.texture.texel(tx, ty)
    }
}

impl Sample2d for BoundTexture<'_> {
    fn sample(&self, uv: Vec2) -> Vec4 {
        let size = Vec2::new(self.texture.width as f32, self.texture.height as f32);
        let p = uv * size;

        match self.sampler.mag_filter {
            FilterMode::Nearest => self.fetch(p.x.floor() as i64, p.y.floor() as i64),
            FilterMode::Linear => {
                // texel centers sit at half-integer coordinates
                let p = p - 0.5;
                let base = p.floor();
                let f = p - base;
                let (x0, y0) = (base.x as i64, base.y as i64);

                let top = self.fetch(x0, y0).lerp(self.fetch(x0 + 1, y0), f.x);
                let bottom = self.fetch(x0, y0 + 1).lerp(self.fetch(x0 + 1, y0 + 1), f.x);
                top.lerp(bottom, f.y)
            }
        }
    }
}
