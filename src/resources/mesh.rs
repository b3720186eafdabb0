//! Mesh data structures and generation
//!
//! A [`Mesh`] is a list of [`Surface`]s. Each surface pairs shared geometry
//! ([`SurfaceData`]) with the [`Material`] it is drawn with, so one mesh can
//! mix opaque and cutout parts.

use crate::backend::types::Vertex;
use crate::resources::{Material, ResourceError};
use crate::scene::{AxisAlignedBoundingBox, Frustum, Transform};
use glam::{Vec2, Vec3, Vec4};
use std::cell::Cell;
use std::sync::Arc;

/// Vertex and index data of one surface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl SurfaceData {
    /// Wrap geometry, checking that every index addresses a vertex
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self, ResourceError> {
        let data = Self { vertices, indices };
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> Result<(), ResourceError> {
        match self.indices.iter().find(|&&i| i as usize >= self.vertices.len()) {
            Some(&index) => Err(ResourceError::IndexOutOfRange {
                index,
                count: self.vertices.len(),
            }),
            None => Ok(()),
        }
    }

    /// Calculate triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// True when the surface has no complete triangle to draw
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.len() < 3
    }

    /// Get vertex data as bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Get index data as bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Local space bounds of the vertices
    pub fn bounding_box(&self) -> AxisAlignedBoundingBox {
        AxisAlignedBoundingBox::from_points(self.vertices.iter().map(|v| v.position))
    }

    /// Rebuild per-vertex tangents from positions and the first UV set.
    ///
    /// Face tangents are accumulated weighted by area, orthogonalized against
    /// the vertex normal and given a handedness in `w` so that
    /// `cross(normal, tangent) * w` points along increasing `v`.
    pub fn calculate_tangents(&mut self) {
        let count = self.vertices.len();
        let mut tangents = vec![Vec3::ZERO; count];
        let mut bitangents = vec![Vec3::ZERO; count];

        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if a >= count || b >= count || c >= count {
                continue;
            }
            let (v0, v1, v2) = (&self.vertices[a], &self.vertices[b], &self.vertices[c]);

            let edge1 = v1.position - v0.position;
            let edge2 = v2.position - v0.position;
            let duv1 = v1.uv - v0.uv;
            let duv2 = v2.uv - v0.uv;

            let det = duv1.x * duv2.y - duv1.y * duv2.x;
            if det.abs() < 1e-8 {
                continue;
            }
            let area = edge1.cross(edge2).length() * 0.5;
            let scale = area / det;

            let t = (edge1 * duv2.y - edge2 * duv1.y) * scale;
            let bt = (edge2 * duv1.x - edge1 * duv2.x) * scale;
            for i in [a, b, c] {
                tangents[i] += t;
                bitangents[i] += bt;
            }
        }

        for (i, vertex) in self.vertices.iter_mut().enumerate() {
            let n = vertex.normal.try_normalize().unwrap_or(Vec3::Z);

            // Gram-Schmidt
            let t = (tangents[i] - n * n.dot(tangents[i]))
                .try_normalize()
                .unwrap_or_else(|| n.any_orthonormal_vector());

            let w = if n.cross(t).dot(bitangents[i]) < 0.0 {
                -1.0
            } else {
                1.0
            };
            vertex.tangent = t.extend(w);
        }
    }
}

/// Geometry drawn with one material
#[derive(Debug, Clone)]
pub struct Surface {
    pub data: Arc<SurfaceData>,
    pub material: Material,
}

impl Surface {
    pub fn new(data: Arc<SurfaceData>) -> Self {
        Self {
            data,
            material: Material::default(),
        }
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn set_color(&mut self, color: Vec4) {
        self.material.diffuse_color = color;
    }
}

/// A mesh made of surfaces, placed in the world by a transform
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub transform: Transform,
    surfaces: Vec<Surface>,
    bounding_box: Cell<AxisAlignedBoundingBox>,
    bounding_box_dirty: Cell<bool>,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new("mesh")
    }
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::default(),
            surfaces: Vec::new(),
            bounding_box: Cell::new(AxisAlignedBoundingBox::default()),
            bounding_box_dirty: Cell::new(true),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    /// Mutable access invalidates the cached bounds
    pub fn surfaces_mut(&mut self) -> &mut [Surface] {
        self.bounding_box_dirty.set(true);
        &mut self.surfaces
    }

    pub fn add_surface(&mut self, surface: Surface) {
        self.surfaces.push(surface);
        self.bounding_box_dirty.set(true);
    }

    pub fn clear_surfaces(&mut self) {
        self.surfaces.clear();
        self.bounding_box_dirty.set(true);
    }

    /// Apply one diffuse color to every surface
    pub fn set_color(&mut self, color: Vec4) {
        for surface in &mut self.surfaces {
            surface.set_color(color);
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.data.triangle_count()).sum()
    }

    /// Local space bounds of all surfaces, recomputed only after changes
    pub fn bounding_box(&self) -> AxisAlignedBoundingBox {
        if self.bounding_box_dirty.get() {
            let mut aabb = AxisAlignedBoundingBox::default();
            for surface in &self.surfaces {
                aabb.add_box(&surface.data.bounding_box());
            }
            self.bounding_box.set(aabb);
            self.bounding_box_dirty.set(false);
        }
        self.bounding_box.get()
    }

    pub fn world_bounding_box(&self) -> AxisAlignedBoundingBox {
        self.bounding_box().transform(&self.transform.matrix())
    }

    pub fn is_intersect_frustum(&self, frustum: &Frustum) -> bool {
        frustum.is_intersects_aabb(&self.world_bounding_box())
    }

    /// Unit cube centered at origin
    pub fn cube() -> Self {
        MeshBuilder::new("cube").with_surface(cube_surface()).build()
    }

    /// UV sphere of diameter 1
    pub fn sphere(segments: u32, rings: u32) -> Self {
        MeshBuilder::new("sphere")
            .with_surface(sphere_surface(segments, rings))
            .build()
    }

    /// Plane on the XZ axis facing +Y
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        MeshBuilder::new("plane")
            .with_surface(plane_surface(width, depth, subdivisions))
            .build()
    }
}

/// Assembles a mesh from surfaces
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    name: String,
    surfaces: Vec<Surface>,
    transform: Transform,
}

impl MeshBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_surface(mut self, surface: Surface) -> Self {
        self.surfaces.push(surface);
        self
    }

    pub fn with_surfaces(mut self, surfaces: impl IntoIterator<Item = Surface>) -> Self {
        self.surfaces.extend(surfaces);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn build(self) -> Mesh {
        let mut mesh = Mesh::new(&self.name).with_transform(self.transform);
        for surface in self.surfaces {
            mesh.add_surface(surface);
        }
        mesh
    }
}

/// Two counter-clockwise triangles of a grid cell, `next` being the row after `current`
fn quad_indices(indices: &mut Vec<u32>, current: u32, next: u32) {
    indices.extend_from_slice(&[current, next, current + 1, current + 1, next, next + 1]);
}

/// Six faces, each with its own cell of a 3x2 lightmap atlas
pub fn cube_surface() -> Surface {
    const FACES: [(Vec3, Vec3, Vec3); 6] = [
        // normal, u axis, v axis (v grows downwards in the texture)
        (Vec3::Z, Vec3::X, Vec3::NEG_Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::NEG_Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::NEG_Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::NEG_Y),
        (Vec3::Y, Vec3::X, Vec3::Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z),
    ];
    const CORNERS: [Vec2; 4] = [
        Vec2::new(0.0, 0.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
    ];

    let mut data = SurfaceData::default();
    for (face, (normal, u_axis, v_axis)) in FACES.iter().enumerate() {
        let cell = Vec2::new((face % 3) as f32, (face / 3) as f32);
        let base = data.vertices.len() as u32;

        for uv in CORNERS {
            let position = *normal * 0.5 + *u_axis * (uv.x - 0.5) + *v_axis * (uv.y - 0.5);
            let second_uv = (cell + uv) / Vec2::new(3.0, 2.0);
            data.vertices.push(Vertex::new(position, *normal, uv, u_axis.extend(1.0), second_uv));
        }
        data.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }

    data.calculate_tangents();
    Surface::new(Arc::new(data))
}

pub fn sphere_surface(segments: u32, rings: u32) -> Surface {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let segment_angle = 2.0 * std::f32::consts::PI / segments as f32;
    let ring_angle = std::f32::consts::PI / rings as f32;

    let mut data = SurfaceData::default();
    for ring in 0..=rings {
        let phi = ring as f32 * ring_angle;
        let y = phi.cos();
        let ring_radius = phi.sin();

        for segment in 0..=segments {
            let theta = segment as f32 * segment_angle;
            let x = ring_radius * theta.cos();
            let z = ring_radius * theta.sin();

            let normal = Vec3::new(x, y, z).normalize();
            let uv = Vec2::new(segment as f32 / segments as f32, ring as f32 / rings as f32);
            let tangent = Vec3::new(-theta.sin(), 0.0, theta.cos()).extend(1.0);

            data.vertices
                .push(Vertex::new(Vec3::new(x, y, z) * 0.5, normal, uv, tangent, uv));
        }
    }

    for ring in 0..rings {
        for segment in 0..segments {
            let current = ring * (segments + 1) + segment;
            let next = current + segments + 1;
            // rings run top to bottom, so the grid winding is flipped
            data.indices.extend_from_slice(&[
                current,
                current + 1,
                next,
                current + 1,
                next + 1,
                next,
            ]);
        }
    }

    data.calculate_tangents();
    Surface::new(Arc::new(data))
}

pub fn plane_surface(width: f32, depth: f32, subdivisions: u32) -> Surface {
    let subdivisions = subdivisions.max(1);
    let half_width = width / 2.0;
    let half_depth = depth / 2.0;
    let step_x = width / subdivisions as f32;
    let step_z = depth / subdivisions as f32;

    let mut data = SurfaceData::default();
    for z in 0..=subdivisions {
        for x in 0..=subdivisions {
            let px = -half_width + x as f32 * step_x;
            let pz = -half_depth + z as f32 * step_z;
            let uv = Vec2::new(x as f32 / subdivisions as f32, z as f32 / subdivisions as f32);

            data.vertices.push(Vertex::new(
                Vec3::new(px, 0.0, pz),
                Vec3::Y,
                uv,
                Vec4::new(1.0, 0.0, 0.0, 1.0),
                uv,
            ));
        }
    }

    for z in 0..subdivisions {
        for x in 0..subdivisions {
            let current = z * (subdivisions + 1) + x;
            quad_indices(&mut data.indices, current, current + subdivisions + 1);
        }
    }

    data.calculate_tangents();
    Surface::new(Arc::new(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> SurfaceData {
        SurfaceData::new(
            vec![
                Vertex::new(Vec3::ZERO, Vec3::Z, Vec2::new(0.0, 1.0), Vec4::ZERO, Vec2::ZERO),
                Vertex::new(Vec3::X, Vec3::Z, Vec2::new(1.0, 1.0), Vec4::ZERO, Vec2::ZERO),
                Vertex::new(Vec3::Y, Vec3::Z, Vec2::new(0.0, 0.0), Vec4::ZERO, Vec2::ZERO),
            ],
            vec![0, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let err = SurfaceData::new(vec![], vec![0]);
        assert!(matches!(err, Err(ResourceError::IndexOutOfRange { index: 0, count: 0 })));
    }

    #[test]
    fn tangents_follow_uv_directions() {
        let mut data = triangle();
        data.calculate_tangents();
        for v in &data.vertices {
            assert!((v.tangent.truncate() - Vec3::X).length() < 1e-5);
            // v grows towards -Y here, so the frame is mirrored
            assert_eq!(v.tangent.w, -1.0);
            assert!((v.binormal() - Vec3::NEG_Y).length() < 1e-5);
        }
    }

    #[test]
    fn cube_frames_are_orthonormal() {
        let mesh = Mesh::cube();
        assert_eq!(mesh.triangle_count(), 12);
        for v in &mesh.surfaces()[0].data.vertices {
            let t = v.tangent.truncate();
            assert!((t.length() - 1.0).abs() < 1e-5);
            assert!(t.dot(v.normal).abs() < 1e-5);
            assert!(v.second_uv.cmpge(Vec2::ZERO).all() && v.second_uv.cmple(Vec2::ONE).all());
        }
    }

    #[test]
    fn cube_lightmap_cells_do_not_overlap() {
        let mesh = Mesh::cube();
        let vertices = &mesh.surfaces()[0].data.vertices;
        let centers: Vec<Vec2> = vertices
            .chunks(4)
            .map(|face| face.iter().map(|v| v.second_uv).sum::<Vec2>() / 4.0)
            .collect();
        for (i, a) in centers.iter().enumerate() {
            for b in &centers[i + 1..] {
                assert!(a.distance(*b) > 0.2);
            }
        }
    }

    #[test]
    fn bounding_box_is_cached_until_surfaces_change() {
        let mut mesh = Mesh::cube();
        let aabb = mesh.bounding_box();
        assert_eq!(aabb.min, Vec3::splat(-0.5));
        assert_eq!(aabb.max, Vec3::splat(0.5));

        mesh.add_surface(plane_surface(4.0, 4.0, 1));
        assert_eq!(mesh.bounding_box().max.x, 2.0);

        mesh.clear_surfaces();
        assert!(!mesh.bounding_box().is_valid());
    }

    #[test]
    fn world_bounds_follow_transform() {
        let mesh = Mesh::cube().with_transform(Transform::from_position(Vec3::new(10.0, 0.0, 0.0)));
        let aabb = mesh.world_bounding_box();
        assert!((aabb.center() - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn set_color_reaches_every_surface() {
        let mut mesh = MeshBuilder::new("two")
            .with_surface(cube_surface())
            .with_surface(plane_surface(1.0, 1.0, 1))
            .build();
        mesh.set_color(Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert!(mesh
            .surfaces()
            .iter()
            .all(|s| s.material.diffuse_color == Vec4::new(1.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn primitives_wind_counter_clockwise_outwards() {
        for mesh in [Mesh::cube(), Mesh::sphere(12, 6), Mesh::plane(2.0, 2.0, 2)] {
            let data = &mesh.surfaces()[0].data;
            for tri in data.indices.chunks_exact(3) {
                let [a, b, c] = [0, 1, 2].map(|i| data.vertices[tri[i] as usize]);
                let face = (b.position - a.position).cross(c.position - a.position);
                if face.length() > 1e-6 {
                    assert!(face.dot(a.normal + b.normal + c.normal) > 0.0, "{}", mesh.name);
                }
            }
        }
    }

    #[test]
    fn sphere_indices_are_valid() {
        let mesh = Mesh::sphere(16, 8);
        let data = &mesh.surfaces()[0].data;
        assert!(data.validate().is_ok());
        assert_eq!(data.triangle_count(), 16 * 8 * 2);
    }
}
