//! Fragment shading for the geometry pass
//!
//! [`shade_fragment`] is the per-pixel function of the G-buffer fill. It maps
//! one interpolated surface sample and the material bindings to the three
//! attachment values, or to nothing when the fragment is cut out:
//!
//! | slot | attachment | contents |
//! |------|------------|----------|
//! | 0 | color   | `diffuse_color * diffuse(uv)`, alpha forced to 1 |
//! | 1 | normal  | encoded normal in `xyz`, specular mask in `w` |
//! | 2 | ambient | lightmap sample at the second UV set, alpha 1 |
//!
//! The WGSL fragment stage in [`crate::pipeline::GBUFFER_SHADER`] computes the
//! same values on the GPU.

mod sampler;

pub use sampler::*;

use glam::{Mat3, Vec2, Vec3, Vec4, Vec4Swizzles};

/// Fragments whose combined diffuse alpha is below this value are discarded
pub const ALPHA_CUTOFF: f32 = 0.5;

/// Anything the fragment stage can sample at a texture coordinate
pub trait Sample2d {
    fn sample(&self, uv: Vec2) -> Vec4;
}

impl<F: Fn(Vec2) -> Vec4> Sample2d for F {
    fn sample(&self, uv: Vec2) -> Vec4 {
        self(uv)
    }
}

/// Interpolated vertex outputs for one fragment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub normal: Vec3,
    pub tangent: Vec3,
    pub binormal: Vec3,
    pub tex_coord: Vec2,
    pub second_tex_coord: Vec2,
}

impl SurfaceSample {
    /// A sample with the canonical frame: tangent X, binormal Y, normal Z
    pub fn facing_z(tex_coord: Vec2, second_tex_coord: Vec2) -> Self {
        Self {
            normal: Vec3::Z,
            tangent: Vec3::X,
            binormal: Vec3::Y,
            tex_coord,
            second_tex_coord,
        }
    }
}

/// Uniform bindings of the fragment stage
#[derive(Debug, Clone)]
pub struct MaterialBindings<T> {
    pub diffuse_color: Vec4,
    pub diffuse: T,
    pub normal: T,
    pub specular: T,
    pub lightmap: T,
}

/// Values written to the three color attachments for one fragment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GBufferTexel {
    pub color: Vec4,
    pub normal: Vec4,
    pub ambient: Vec4,
}

/// Map a unit vector from `[-1, 1]` to `[0, 1]` for storage
#[inline]
pub fn encode_normal(n: Vec3) -> Vec3 {
    n * 0.5 + 0.5
}

/// Inverse of [`encode_normal`]
#[inline]
pub fn decode_normal(encoded: Vec3) -> Vec3 {
    encoded * 2.0 - 1.0
}

/// Decode a normal map texel into a unit tangent-space normal.
///
/// Only `xyz` takes part; the texel's alpha is ignored. A texel that decodes
/// to the zero vector yields `+Z` so the surface normal is kept unchanged.
pub fn decode_tangent_normal(texel: Vec4) -> Vec3 {
    decode_normal(texel.xyz()).try_normalize().unwrap_or(Vec3::Z)
}

/// Matrix taking tangent-space vectors into the space of the given frame
#[inline]
pub fn tangent_basis(tangent: Vec3, binormal: Vec3, normal: Vec3) -> Mat3 {
    Mat3::from_cols(tangent, binormal, normal)
}

/// Shade one fragment of the geometry pass.
///
/// Returns `None` when the fragment fails the alpha test; in that case nothing
/// at all may be written for the pixel, depth included.
pub fn shade_fragment<T: Sample2d>(
    surface: &SurfaceSample,
    material: &MaterialBindings<T>,
) -> Option<GBufferTexel> {
    let mut color = material.diffuse_color * material.diffuse.sample(surface.tex_coord);
    if color.w < ALPHA_CUTOFF {
        return None;
    }
    color.w = 1.0;

    let mapped = decode_tangent_normal(material.normal.sample(surface.tex_coord));
    let basis = tangent_basis(surface.tangent, surface.binormal, surface.normal);
    let normal = (basis * mapped).try_normalize().unwrap_or(mapped);
    let specular = material.specular.sample(surface.tex_coord).x;

    let lightmap = material.lightmap.sample(surface.second_tex_coord);

    Some(GBufferTexel {
        color,
        normal: encode_normal(normal).extend(specular),
        ambient: lightmap.xyz().extend(1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: Vec4) -> impl Fn(Vec2) -> Vec4 {
        move |_| value
    }

    fn bindings(
        diffuse_color: Vec4,
        diffuse: Vec4,
    ) -> MaterialBindings<Box<dyn Fn(Vec2) -> Vec4>> {
        MaterialBindings {
            diffuse_color,
            diffuse: Box::new(constant(diffuse)),
            normal: Box::new(constant(Vec4::new(0.5, 0.5, 1.0, 1.0))),
            specular: Box::new(constant(Vec4::new(0.25, 0.9, 0.9, 1.0))),
            lightmap: Box::new(constant(Vec4::new(0.1, 0.2, 0.3, 0.0))),
        }
    }

    #[test]
    fn cutout_discards_below_threshold() {
        let sample = SurfaceSample::facing_z(Vec2::ZERO, Vec2::ZERO);
        let b = bindings(Vec4::new(1.0, 1.0, 1.0, 0.9), Vec4::new(1.0, 1.0, 1.0, 0.5));
        // 0.9 * 0.5 = 0.45
        assert!(shade_fragment(&sample, &b).is_none());
    }

    #[test]
    fn exact_threshold_is_kept() {
        let sample = SurfaceSample::facing_z(Vec2::ZERO, Vec2::ZERO);
        let b = bindings(Vec4::ONE, Vec4::new(0.2, 0.4, 0.6, 0.5));
        let texel = shade_fragment(&sample, &b).expect("alpha 0.5 passes");
        assert_eq!(texel.color, Vec4::new(0.2, 0.4, 0.6, 1.0));
    }

    #[test]
    fn color_is_modulated_and_opaque() {
        let sample = SurfaceSample::facing_z(Vec2::ZERO, Vec2::ZERO);
        let b = bindings(Vec4::new(0.5, 1.0, 0.25, 1.0), Vec4::new(1.0, 0.5, 1.0, 0.75));
        let texel = shade_fragment(&sample, &b).unwrap();
        assert_eq!(texel.color, Vec4::new(0.5, 0.5, 0.25, 1.0));
    }

    #[test]
    fn flat_normal_map_keeps_surface_normal() {
        let sample = SurfaceSample {
            normal: Vec3::Y,
            tangent: Vec3::X,
            binormal: -Vec3::Z,
            tex_coord: Vec2::ZERO,
            second_tex_coord: Vec2::ZERO,
        };
        let texel = shade_fragment(&sample, &bindings(Vec4::ONE, Vec4::ONE)).unwrap();
        let n = decode_normal(texel.normal.xyz());
        assert!((n - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn normal_map_is_rotated_into_the_frame() {
        let sample = SurfaceSample {
            normal: Vec3::X,
            tangent: -Vec3::Z,
            binormal: Vec3::Y,
            tex_coord: Vec2::ZERO,
            second_tex_coord: Vec2::ZERO,
        };
        let mut b = bindings(Vec4::ONE, Vec4::ONE);
        // tangent-space +X
        b.normal = Box::new(constant(Vec4::new(1.0, 0.5, 0.5, 1.0)));
        let texel = shade_fragment(&sample, &b).unwrap();
        let n = decode_normal(texel.normal.xyz());
        assert!((n - -Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn degenerate_frame_keeps_tangent_space_normal() {
        let sample = SurfaceSample {
            normal: Vec3::ZERO,
            tangent: Vec3::ZERO,
            binormal: Vec3::ZERO,
            tex_coord: Vec2::ZERO,
            second_tex_coord: Vec2::ZERO,
        };
        let texel = shade_fragment(&sample, &bindings(Vec4::ONE, Vec4::ONE)).unwrap();
        assert!((decode_normal(texel.normal.xyz()) - Vec3::Z).length() < 1e-5);

        let mut b = bindings(Vec4::ONE, Vec4::ONE);
        b.normal = Box::new(constant(Vec4::new(1.0, 0.5, 0.5, 1.0)));
        let texel = shade_fragment(&sample, &b).unwrap();
        assert!((decode_normal(texel.normal.xyz()) - Vec3::X).length() < 1e-5);
        assert!(texel.normal.is_finite());
    }

    #[test]
    fn specular_red_channel_packs_into_normal_alpha() {
        let sample = SurfaceSample::facing_z(Vec2::ZERO, Vec2::ZERO);
        let texel = shade_fragment(&sample, &bindings(Vec4::ONE, Vec4::ONE)).unwrap();
        assert_eq!(texel.normal.w, 0.25);
    }

    #[test]
    fn ambient_is_lightmap_rgb_with_opaque_alpha() {
        let sample = SurfaceSample::facing_z(Vec2::ZERO, Vec2::ZERO);
        let texel = shade_fragment(&sample, &bindings(Vec4::ONE, Vec4::ONE)).unwrap();
        assert_eq!(texel.ambient, Vec4::new(0.1, 0.2, 0.3, 1.0));
    }

    #[test]
    fn lightmap_uses_second_uv_set() {
        let sample = SurfaceSample::facing_z(Vec2::new(0.1, 0.1), Vec2::new(0.9, 0.9));
        let mut b = bindings(Vec4::ONE, Vec4::ONE);
        b.lightmap = Box::new(|uv: Vec2| uv.extend(0.0).extend(0.0));
        let texel = shade_fragment(&sample, &b).unwrap();
        assert_eq!(texel.ambient, Vec4::new(0.9, 0.9, 0.0, 1.0));
    }

    #[test]
    fn encode_decode_roundtrip() {
        for n in [
            Vec3::X,
            -Vec3::Y,
            Vec3::new(0.3, -0.4, 0.866).normalize(),
            Vec3::new(-1.0, 1.0, -1.0).normalize(),
        ] {
            assert!((decode_normal(encode_normal(n)) - n).length() < 1e-6);
        }
    }

    #[test]
    fn zero_normal_texel_falls_back_to_surface() {
        assert_eq!(decode_tangent_normal(Vec4::new(0.5, 0.5, 0.5, 1.0)), Vec3::Z);
    }
}
