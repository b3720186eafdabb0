//! Software G-buffer fill
//!
//! A reference rasterizer that runs the same vertex transform and the same
//! [`shade_fragment`] as the GPU pass. It is used where no adapter is
//! available and to check GPU output in tests.

mod gbuffer;

pub use gbuffer::*;

use crate::backend::types::{CompareFunction, CullMode, FilterMode, FrontFace, Vertex};
use crate::resources::{DefaultTextures, Mesh, Surface};
use crate::scene::Camera;
use crate::shading::{shade_fragment, SurfaceSample};
use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};
use log::debug;
use std::ops::{Add, Mul};

/// Counters of one rasterizer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub meshes_culled: u32,
    pub triangles_submitted: u32,
    /// Back/front face culled or degenerate
    pub triangles_culled: u32,
    /// Entirely behind the near plane
    pub triangles_clipped: u32,
    /// Fragments that passed the depth test and ran the fragment function
    pub fragments_shaded: u32,
    /// Fragments rejected by the alpha test
    pub fragments_discarded: u32,
    pub fragments_written: u32,
}

/// Interpolated vertex outputs
#[derive(Debug, Clone, Copy, PartialEq)]
struct Varyings {
    normal: Vec3,
    tangent: Vec3,
    binormal: Vec3,
    tex_coord: Vec2,
    second_tex_coord: Vec2,
}

impl Add for Varyings {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            normal: self.normal + rhs.normal,
            tangent: self.tangent + rhs.tangent,
            binormal: self.binormal + rhs.binormal,
            tex_coord: self.tex_coord + rhs.tex_coord,
            second_tex_coord: self.second_tex_coord + rhs.second_tex_coord,
        }
    }
}

impl Mul<f32> for Varyings {
    type Output = Self;
    fn mul(self, s: f32) -> Self {
        Self {
            normal: self.normal * s,
            tangent: self.tangent * s,
            binormal: self.binormal * s,
            tex_coord: self.tex_coord * s,
            second_tex_coord: self.second_tex_coord * s,
        }
    }
}

impl Varyings {
    fn to_sample(self) -> SurfaceSample {
        SurfaceSample {
            normal: self.normal,
            tangent: self.tangent,
            binormal: self.binormal,
            tex_coord: self.tex_coord,
            second_tex_coord: self.second_tex_coord,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    clip: Vec4,
    varyings: Varyings,
}

impl ClipVertex {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            clip: self.clip.lerp(other.clip, t),
            varyings: self.varyings * (1.0 - t) + other.varyings * t,
        }
    }
}

/// Vertex in framebuffer space
#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    position: Vec2,
    depth: f32,
    inv_w: f32,
    varyings: Varyings,
}

/// Per-draw transforms, mirroring the object and camera uniforms
struct DrawTransforms {
    view_proj: Mat4,
    model: Mat4,
    normal_matrix: Mat4,
}

impl DrawTransforms {
    /// Same math as `vs_main`
    fn vertex(&self, v: &Vertex) -> ClipVertex {
        let world = self.model * v.position.extend(1.0);
        let n = (self.normal_matrix * v.normal.extend(0.0)).xyz().normalize_or_zero();
        let t = (self.model * v.tangent.xyz().extend(0.0)).xyz().normalize_or_zero();

        ClipVertex {
            clip: self.view_proj * world,
            varyings: Varyings {
                normal: n,
                tangent: t,
                binormal: n.cross(t) * v.tangent.w,
                tex_coord: v.uv,
                second_tex_coord: v.second_uv,
            },
        }
    }
}

/// Clip a triangle against `z >= 0`, returning a convex polygon of up to four vertices
fn clip_near(tri: [ClipVertex; 3]) -> Vec<ClipVertex> {
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let a = tri[i];
        let b = tri[(i + 1) % 3];
        let (da, db) = (a.clip.z, b.clip.z);

        if da >= 0.0 {
            out.push(a);
        }
        if (da >= 0.0) != (db >= 0.0) {
            out.push(a.lerp(&b, da / (da - db)));
        }
    }
    out
}

#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// CPU implementation of the geometry pass
#[derive(Debug, Clone)]
pub struct SoftwareRasterizer {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_compare: CompareFunction,
    pub filter_override: Option<FilterMode>,
    defaults: DefaultTextures,
}

impl Default for SoftwareRasterizer {
    fn default() -> Self {
        Self::new(CullMode::Back)
    }
}

impl SoftwareRasterizer {
    pub fn new(cull_mode: CullMode) -> Self {
        Self {
            cull_mode,
            front_face: FrontFace::Ccw,
            depth_compare: CompareFunction::Less,
            filter_override: None,
            defaults: DefaultTextures::default(),
        }
    }

    /// Clear `target` and draw every mesh inside the camera frustum
    pub fn render(&self, target: &mut CpuGBuffer, camera: &Camera, meshes: &[&Mesh]) -> RasterStats {
        target.clear();

        let camera = camera.fitted_to(target.width(), target.height());
        let view_proj = camera.view_projection_matrix();
        let frustum = camera.frustum();

        let mut stats = RasterStats::default();
        for mesh in meshes {
            if !mesh.is_intersect_frustum(&frustum) {
                stats.meshes_culled += 1;
                continue;
            }
            self.draw_mesh(target, &view_proj, mesh, &mut stats);
        }

        debug!(
            "Software G-buffer: {} triangles ({} culled, {} clipped), {} fragments written, {} discarded",
            stats.triangles_submitted,
            stats.triangles_culled,
            stats.triangles_clipped,
            stats.fragments_written,
            stats.fragments_discarded
        );
        stats
    }

    /// Draw one mesh without clearing or culling it
    pub fn draw_mesh(
        &self,
        target: &mut CpuGBuffer,
        view_proj: &Mat4,
        mesh: &Mesh,
        stats: &mut RasterStats,
    ) {
        let uniform = mesh.transform.uniform_data();
        let transforms = DrawTransforms {
            view_proj: *view_proj,
            model: uniform.model,
            normal_matrix: uniform.normal_matrix,
        };

        for surface in mesh.surfaces() {
            self.draw_surface(target, &transforms, surface, stats);
        }
    }

    fn draw_surface(
        &self,
        target: &mut CpuGBuffer,
        transforms: &DrawTransforms,
        surface: &Surface,
        stats: &mut RasterStats,
    ) {
        let data = &surface.data;
        if data.is_empty() {
            return;
        }
        let clip: Vec<ClipVertex> = data.vertices.iter().map(|v| transforms.vertex(v)).collect();
        let material = &surface.material;
        let sampler = match self.filter_override {
            Some(filter) => material.sampler.clone().with_filter(filter),
            None => material.sampler.clone(),
        };
        let bindings = material.bindings_with_sampler(&self.defaults, &sampler);

        for tri in data.indices.chunks_exact(3) {
            stats.triangles_submitted += 1;
            let Some(vertices) = tri
                .iter()
                .map(|&i| clip.get(i as usize).copied())
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };

            let polygon = clip_near([vertices[0], vertices[1], vertices[2]]);
            if polygon.len() < 3 {
                stats.triangles_clipped += 1;
                continue;
            }

            let screen: Vec<ScreenVertex> = polygon.iter().map(|v| self.to_screen(target, v)).collect();
            for i in 1..screen.len() - 1 {
                self.fill_triangle(target, [screen[0], screen[i], screen[i + 1]], &bindings, stats);
            }
        }
    }

    fn to_screen(&self, target: &CpuGBuffer, v: &ClipVertex) -> ScreenVertex {
        let inv_w = 1.0 / v.clip.w;
        let ndc = v.clip.xyz() * inv_w;
        ScreenVertex {
            position: Vec2::new(
                (ndc.x * 0.5 + 0.5) * target.width() as f32,
                (0.5 - ndc.y * 0.5) * target.height() as f32,
            ),
            depth: ndc.z,
            inv_w,
            varyings: v.varyings,
        }
    }

    fn is_culled(&self, area: f32) -> bool {
        // framebuffer y points down, which flips the winding seen in NDC
        let ccw = area < 0.0;
        let front = match self.front_face {
            FrontFace::Ccw => ccw,
            FrontFace::Cw => !ccw,
        };
        match self.cull_mode {
            CullMode::None => false,
            CullMode::Back => !front,
            CullMode::Front => front,
        }
    }

    fn fill_triangle<T: crate::shading::Sample2d>(
        &self,
        target: &mut CpuGBuffer,
        tri: [ScreenVertex; 3],
        bindings: &crate::shading::MaterialBindings<T>,
        stats: &mut RasterStats,
    ) {
        let [a, b, c] = tri;
        let area = edge(a.position, b.position, c.position);
        if area == 0.0 || !area.is_finite() || self.is_culled(area) {
            stats.triangles_culled += 1;
            return;
        }

        let min = a.position.min(b.position).min(c.position).floor().max(Vec2::ZERO);
        let max = a
            .position
            .max(b.position)
            .max(c.position)
            .ceil()
            .min(Vec2::new(target.width() as f32, target.height() as f32));
        if min.x >= max.x || min.y >= max.y {
            return;
        }

        for y in min.y as u32..max.y as u32 {
            for x in min.x as u32..max.x as u32 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let l0 = edge(b.position, c.position, p) / area;
                let l1 = edge(c.position, a.position, p) / area;
                let l2 = edge(a.position, b.position, p) / area;
                if l0 < 0.0 || l1 < 0.0 || l2 < 0.0 {
                    continue;
                }

                let depth = l0 * a.depth + l1 * b.depth + l2 * c.depth;
                if !(0.0..=1.0).contains(&depth)
                    || !self.depth_compare.passes(depth, target.depth(x, y))
                {
                    continue;
                }

                // perspective-correct weights
                let (w0, w1, w2) = (l0 * a.inv_w, l1 * b.inv_w, l2 * c.inv_w);
                let sum = w0 + w1 + w2;
                let varyings =
                    (a.varyings * w0 + b.varyings * w1 + c.varyings * w2) * (1.0 / sum);

                stats.fragments_shaded += 1;
                match shade_fragment(&varyings.to_sample(), bindings) {
                    Some(texel) => {
                        target.write(x, y, &texel, depth);
                        stats.fragments_written += 1;
                    }
                    None => stats.fragments_discarded += 1,
                }
            }
        }
    }
}
