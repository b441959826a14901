//! Rays, hit records and the ray-triangle test.

use glam::{Vec2, Vec3};

use super::triangle::Triangle;

/// Minimum accepted hit distance; rejects self-intersection acne.
pub const EPSILON: f32 = 1e-4;

/// Offset applied to secondary ray origins along the surface normal.
pub const ORIGIN_OFFSET: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub orig: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(orig: Vec3, dir: Vec3) -> Self {
        Self { orig, dir }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.orig + self.dir * t
    }

    /// Spawn a ray leaving a surface point, nudged to the side `dir` points to.
    pub fn spawn(p: Vec3, n: Vec3, dir: Vec3) -> Self {
        let offset = if dir.dot(n) >= 0.0 { n } else { -n };
        Self::new(p + offset * ORIGIN_OFFSET, dir)
    }
}

/// Nearest-hit record. Absence of a hit is `None` at the call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// World position
    pub p: Vec3,
    /// Interpolated shading normal (unit length, not yet facing the ray)
    pub n: Vec3,
    pub uv: Vec2,
    pub t: f32,
    /// Index into the scene triangle list (`u32::MAX` for light geometry)
    pub tri: u32,
    /// Material index (`u32::MAX` for light geometry)
    pub material_id: u32,
    /// The ray hit an area light rather than scene geometry
    pub area_light_hit: bool,
}

impl Hit {
    pub const NO_TRIANGLE: u32 = u32::MAX;
}

/// Möller-Trumbore. Returns `(t, u, v)` for hits with `t` in `(EPSILON, t_max)`.
#[inline]
pub fn intersect_triangle(ray: &Ray, tri: &Triangle, t_max: f32) -> Option<(f32, f32, f32)> {
    let p0 = tri.v[0].p;
    let e1 = tri.v[1].p - p0;
    let e2 = tri.v[2].p - p0;

    let pvec = ray.dir.cross(e2);
    let det = e1.dot(pvec);
    // Near-parallel rays and zero-area triangles.
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = ray.orig - p0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(e1);
    let v = ray.dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(qvec) * inv_det;
    if t > EPSILON && t < t_max {
        Some((t, u, v))
    } else {
        None
    }
}

/// Build a full hit record for triangle `index`.
pub fn make_hit(ray: &Ray, tri: &Triangle, index: u32, t: f32, u: f32, v: f32) -> Hit {
    Hit {
        p: ray.at(t),
        n: tri.shading_normal(u, v),
        uv: tri.uv(u, v),
        t,
        tri: index,
        material_id: tri.material_id,
        area_light_hit: false,
    }
}
