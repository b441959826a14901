//! Triangle primitive as handed over by the scene loader.

use glam::{Vec2, Vec3};

use super::aabb::Aabb;

/// One triangle corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Position
    pub p: Vec3,
    /// Shading normal (may be zero when the mesh carries none)
    pub n: Vec3,
    /// Texture coordinate in xy, tangent sign or layer in z
    pub t: Vec3,
}

impl Vertex {
    pub fn new(p: Vec3, n: Vec3, uv: Vec2) -> Self {
        Self { p, n, t: uv.extend(0.0) }
    }
}

/// Scene triangle. Immutable once loaded; BVH leaves refer to it by index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v: [Vertex; 3],
    pub material_id: u32,
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex, material_id: u32) -> Self {
        Self { v: [v0, v1, v2], material_id }
    }

    /// Flat triangle from positions only; normals follow the winding.
    pub fn from_positions(p0: Vec3, p1: Vec3, p2: Vec3, material_id: u32) -> Self {
        let n = (p1 - p0).cross(p2 - p0).normalize_or_zero();
        Self {
            v: [
                Vertex::new(p0, n, Vec2::new(0.0, 0.0)),
                Vertex::new(p1, n, Vec2::new(1.0, 0.0)),
                Vertex::new(p2, n, Vec2::new(0.0, 1.0)),
            ],
            material_id,
        }
    }

    /// Compute AABB of this triangle.
    pub fn aabb(&self) -> Aabb {
        let mut b = Aabb::EMPTY;
        for v in &self.v {
            b.grow_point(v.p);
        }
        b
    }

    /// Centroid of the triangle.
    pub fn centroid(&self) -> Vec3 {
        (self.v[0].p + self.v[1].p + self.v[2].p) / 3.0
    }

    /// Unnormalized geometric normal (length is twice the area).
    #[inline]
    pub fn geometric_normal(&self) -> Vec3 {
        (self.v[1].p - self.v[0].p).cross(self.v[2].p - self.v[0].p)
    }

    pub fn area(&self) -> f32 {
        0.5 * self.geometric_normal().length()
    }

    /// Zero-area triangles are kept in the tree but can never be hit.
    pub fn is_degenerate(&self) -> bool {
        self.geometric_normal().length_squared() <= f32::MIN_POSITIVE
    }

    /// Barycentric interpolation of the shading normal. Falls back to the
    /// geometric normal when the vertices carry no usable normal.
    pub fn shading_normal(&self, u: f32, v: f32) -> Vec3 {
        let w = 1.0 - u - v;
        let n = self.v[0].n * w + self.v[1].n * u + self.v[2].n * v;
        let n = n.normalize_or_zero();
        if n == Vec3::ZERO {
            self.geometric_normal().normalize_or_zero()
        } else {
            n
        }
    }

    pub fn uv(&self, u: f32, v: f32) -> Vec2 {
        let w = 1.0 - u - v;
        (self.v[0].t * w + self.v[1].t * u + self.v[2].t * v).truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_and_centroid() {
        let tri = Triangle::from_positions(Vec3::ZERO, Vec3::X, Vec3::Y, 0);
        let b = tri.aabb();
        assert_eq!(b.min, Vec3::ZERO);
        assert_eq!(b.max, Vec3::new(1.0, 1.0, 0.0));
        assert!((tri.centroid() - Vec3::new(1.0 / 3.0, 1.0 / 3.0, 0.0)).length() < 1e-6);
        assert!((tri.area() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_normal_fallback() {
        let mut tri = Triangle::from_positions(Vec3::ZERO, Vec3::X, Vec3::Y, 0);
        for v in &mut tri.v {
            v.n = Vec3::ZERO;
        }
        assert_eq!(tri.shading_normal(0.2, 0.2), Vec3::Z);

        let flat = Triangle::from_positions(Vec3::ZERO, Vec3::X, Vec3::X * 2.0, 0);
        assert!(flat.is_degenerate());
    }
}
