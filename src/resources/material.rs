//! Material definitions for the geometry pass
//!
//! A material is what the fragment stage sees as its uniform bindings: one
//! diffuse color and four textures, all sampled through the same sampler.

use crate::backend::types::SamplerDescriptor;
use crate::resources::TextureData;
use crate::shading::{BoundTexture, MaterialBindings};
use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use std::sync::Arc;

/// The four texture bindings of a material, in binding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Diffuse,
    Normal,
    Specular,
    Lightmap,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 4] = [
        TextureSlot::Diffuse,
        TextureSlot::Normal,
        TextureSlot::Specular,
        TextureSlot::Lightmap,
    ];

    /// Binding index inside the material bind group (0 is the uniform buffer)
    pub fn binding(&self) -> u32 {
        match self {
            TextureSlot::Diffuse => 1,
            TextureSlot::Normal => 2,
            TextureSlot::Specular => 3,
            TextureSlot::Lightmap => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextureSlot::Diffuse => "diffuse",
            TextureSlot::Normal => "normal",
            TextureSlot::Specular => "specular",
            TextureSlot::Lightmap => "lightmap",
        }
    }

    /// Texture bound when the material leaves the slot empty
    pub fn fallback(&self) -> TextureData {
        match self {
            TextureSlot::Diffuse => TextureData::white(),
            TextureSlot::Normal => TextureData::default_normal(),
            TextureSlot::Specular => TextureData::black(),
            TextureSlot::Lightmap => TextureData::black(),
        }
    }
}

/// Textures bound in place of empty material slots
#[derive(Debug, Clone)]
pub struct DefaultTextures {
    pub diffuse: Arc<TextureData>,
    pub normal: Arc<TextureData>,
    pub specular: Arc<TextureData>,
    pub lightmap: Arc<TextureData>,
}

impl Default for DefaultTextures {
    fn default() -> Self {
        Self {
            diffuse: Arc::new(TextureSlot::Diffuse.fallback()),
            normal: Arc::new(TextureSlot::Normal.fallback()),
            specular: Arc::new(TextureSlot::Specular.fallback()),
            lightmap: Arc::new(TextureSlot::Lightmap.fallback()),
        }
    }
}

impl DefaultTextures {
    pub fn get(&self, slot: TextureSlot) -> &Arc<TextureData> {
        match slot {
            TextureSlot::Diffuse => &self.diffuse,
            TextureSlot::Normal => &self.normal,
            TextureSlot::Specular => &self.specular,
            TextureSlot::Lightmap => &self.lightmap,
        }
    }
}

/// Geometry pass material
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub diffuse_color: Vec4,
    pub diffuse_texture: Option<Arc<TextureData>>,
    pub normal_texture: Option<Arc<TextureData>>,
    pub specular_texture: Option<Arc<TextureData>>,
    pub lightmap_texture: Option<Arc<TextureData>>,
    pub sampler: SamplerDescriptor,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            diffuse_color: Vec4::ONE,
            diffuse_texture: None,
            normal_texture: None,
            specular_texture: None,
            lightmap_texture: None,
            sampler: SamplerDescriptor::default(),
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_diffuse_color(mut self, color: Vec4) -> Self {
        self.diffuse_color = color;
        self
    }

    pub fn with_texture(mut self, slot: TextureSlot, texture: Arc<TextureData>) -> Self {
        *self.slot_mut(slot) = Some(texture);
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerDescriptor) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&Arc<TextureData>> {
        match slot {
            TextureSlot::Diffuse => self.diffuse_texture.as_ref(),
            TextureSlot::Normal => self.normal_texture.as_ref(),
            TextureSlot::Specular => self.specular_texture.as_ref(),
            TextureSlot::Lightmap => self.lightmap_texture.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: TextureSlot) -> &mut Option<Arc<TextureData>> {
        match slot {
            TextureSlot::Diffuse => &mut self.diffuse_texture,
            TextureSlot::Normal => &mut self.normal_texture,
            TextureSlot::Specular => &mut self.specular_texture,
            TextureSlot::Lightmap => &mut self.lightmap_texture,
        }
    }

    /// Texture for `slot`, or the fallback when the slot is empty
    pub fn texture_or_default<'a>(
        &'a self,
        slot: TextureSlot,
        defaults: &'a DefaultTextures,
    ) -> &'a TextureData {
        self.texture(slot).unwrap_or_else(|| defaults.get(slot))
    }

    /// CPU-side bindings for the fragment shading function
    pub fn bindings<'a>(&'a self, defaults: &'a DefaultTextures) -> MaterialBindings<BoundTexture<'a>> {
        self.bindings_with_sampler(defaults, &self.sampler)
    }

    /// Like [`Material::bindings`], sampling through another sampler
    pub fn bindings_with_sampler<'a>(
        &'a self,
        defaults: &'a DefaultTextures,
        sampler: &'a SamplerDescriptor,
    ) -> MaterialBindings<BoundTexture<'a>> {
        let bind = |slot| BoundTexture::new(self.texture_or_default(slot, defaults), sampler);
        MaterialBindings {
            diffuse_color: self.diffuse_color,
            diffuse: bind(TextureSlot::Diffuse),
            normal: bind(TextureSlot::Normal),
            specular: bind(TextureSlot::Specular),
            lightmap: bind(TextureSlot::Lightmap),
        }
    }

    /// Create a uniform data struct for GPU
    pub fn uniform_data(&self) -> MaterialUniformData {
        MaterialUniformData {
            diffuse_color: self.diffuse_color,
        }
    }

    // Presets

    /// Flat colored material with no textures
    pub fn solid(color: Vec4) -> Self {
        Self::new("solid").with_diffuse_color(color)
    }

    /// Alpha-tested material: texels with alpha below one half are cut out
    pub fn cutout(diffuse: Arc<TextureData>) -> Self {
        Self::new("cutout").with_texture(TextureSlot::Diffuse, diffuse)
    }
}

/// Material uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialUniformData {
    pub diffuse_color: Vec4,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shading::Sample2d;
    use glam::Vec2;

    #[test]
    fn bindings_use_fallbacks_for_empty_slots() {
        let defaults = DefaultTextures::default();
        let material = Material::solid(Vec4::new(1.0, 0.0, 0.0, 1.0));
        let b = material.bindings(&defaults);

        assert_eq!(b.diffuse.sample(Vec2::new(0.3, 0.7)), Vec4::ONE);
        assert_eq!(b.specular.sample(Vec2::ZERO).x, 0.0);
        assert_eq!(b.lightmap.sample(Vec2::ZERO).truncate(), glam::Vec3::ZERO);
        assert!((b.normal.sample(Vec2::ZERO).z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn slots_are_bound_after_the_uniform() {
        let bindings: Vec<u32> = TextureSlot::ALL.iter().map(|s| s.binding()).collect();
        assert_eq!(bindings, vec![1, 2, 3, 4]);
    }

    #[test]
    fn with_texture_fills_the_right_slot() {
        let tex = Arc::new(TextureData::checkerboard(16, [0; 4], [255; 4]));
        let m = Material::new("m").with_texture(TextureSlot::Lightmap, tex.clone());
        assert!(m.texture(TextureSlot::Lightmap).is_some());
        assert!(m.texture(TextureSlot::Diffuse).is_none());
    }
}
