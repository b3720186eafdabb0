//! Bounding volumes and view frustum culling

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

/// Axis aligned bounding box
///
/// The default box is inverted (`min = +inf`, `max = -inf`) so that adding the
/// first point makes it exactly that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAlignedBoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for AxisAlignedBoundingBox {
    fn default() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(-f32::MAX),
        }
    }
}

impl AxisAlignedBoundingBox {
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::default();
        for p in points {
            aabb.add_point(p);
        }
        aabb
    }

    pub fn add_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn add_box(&mut self, other: &Self) {
        if other.is_valid() {
            self.add_point(other.min);
            self.add_point(other.max);
        }
    }

    /// False for the empty (inverted) box
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Box enclosing this box after an affine transform
    pub fn transform(&self, m: &Mat4) -> Self {
        if !self.is_valid() {
            return *self;
        }
        Self::from_points(self.corners().iter().map(|c| m.transform_point3(*c)))
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}

/// Six clip planes in world space, normals pointing inwards
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// left, right, bottom, top, near, far; `xyz` normal, `w` distance
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Extract the planes from a view-projection matrix with `[0, 1]` depth
    pub fn from_view_projection(m: &Mat4) -> Self {
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));

        let mut planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2];
        for plane in &mut planes {
            let len = plane.xyz().length();
            if len > f32::EPSILON {
                *plane /= len;
            }
        }

        Self { planes }
    }

    fn distance(plane: &Vec4, p: Vec3) -> f32 {
        plane.xyz().dot(p) + plane.w
    }

    pub fn is_contains_point(&self, p: Vec3) -> bool {
        self.planes.iter().all(|plane| Self::distance(plane, p) >= 0.0)
    }

    /// Conservative test: may report boxes near frustum corners as visible
    pub fn is_intersects_aabb(&self, aabb: &AxisAlignedBoundingBox) -> bool {
        if !aabb.is_valid() {
            return false;
        }
        self.planes.iter().all(|plane| {
            // corner furthest along the plane normal
            let positive = Vec3::select(plane.xyz().cmpge(Vec3::ZERO), aabb.max, aabb.min);
            Self::distance(plane, positive) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn default_box_is_empty() {
        let mut aabb = AxisAlignedBoundingBox::default();
        assert!(!aabb.is_valid());
        aabb.add_point(Vec3::new(1.0, 2.0, 3.0));
        assert!(aabb.is_valid());
        assert_eq!(aabb.min, aabb.max);
    }

    #[test]
    fn transform_grows_rotated_box() {
        let aabb = AxisAlignedBoundingBox::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let rotated = aabb.transform(&Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4));
        let expected = 2f32.sqrt();
        assert!((rotated.max.x - expected).abs() < 1e-5);
        assert!((rotated.max.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn frustum_contains_points_in_front() {
        let f = frustum();
        assert!(f.is_contains_point(Vec3::ZERO));
        assert!(!f.is_contains_point(Vec3::new(0.0, 0.0, 10.0)));
        assert!(!f.is_contains_point(Vec3::new(0.0, 0.0, -200.0)));
        assert!(!f.is_contains_point(Vec3::new(50.0, 0.0, 0.0)));
    }

    #[test]
    fn frustum_culls_boxes() {
        let f = frustum();
        let visible = AxisAlignedBoundingBox::from_min_max(Vec3::splat(-0.5), Vec3::splat(0.5));
        let behind = AxisAlignedBoundingBox::from_min_max(
            Vec3::new(-0.5, -0.5, 8.0),
            Vec3::new(0.5, 0.5, 9.0),
        );
        let straddling = AxisAlignedBoundingBox::from_min_max(
            Vec3::new(-100.0, -0.5, -0.5),
            Vec3::new(100.0, 0.5, 0.5),
        );
        assert!(f.is_intersects_aabb(&visible));
        assert!(!f.is_intersects_aabb(&behind));
        assert!(f.is_intersects_aabb(&straddling));
        assert!(!f.is_intersects_aabb(&AxisAlignedBoundingBox::default()));
    }
}
