//! Axis-aligned bounding box.

use glam::Vec3;

use super::ray::Ray;

/// Axis-aligned bounding box.
///
/// The empty box is inverted (`min = +inf`, `max = -inf`) so that growing
/// it by any point or box yields exactly that point or box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// True while nothing has been merged in.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow to include a point.
    #[inline]
    pub fn grow_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grow to include another AABB.
    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Union of two boxes.
    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut b = *self;
        b.grow(other);
        b
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Surface area (for SAH cost). Empty boxes have zero area.
    #[inline]
    pub fn area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.extent();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Longest axis (0=x, 1=y, 2=z).
    #[inline]
    pub fn longest_axis(&self) -> usize {
        let d = self.extent();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    #[inline]
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// `other` lies entirely inside `self`, with a small slack for rounding.
    pub fn contains(&self, other: &Aabb, slack: f32) -> bool {
        if other.is_empty() {
            return true;
        }
        (other.min - self.min).min_element() >= -slack && (self.max - other.max).min_element() >= -slack
    }

    /// Slab test. Returns the entry distance if the ray overlaps the box
    /// within `[0, t_max]`. Axes the ray runs parallel to only check that
    /// the origin lies between the slab planes, so rays in a face plane
    /// still enter the box.
    #[inline]
    pub fn intersect(&self, ray: &Ray, inv_dir: Vec3, t_max: f32) -> Option<f32> {
        let mut t_enter = 0.0f32;
        let mut t_exit = t_max;
        for axis in 0..3 {
            let o = ray.orig[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if ray.dir[axis] == 0.0 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let t1 = (lo - o) * inv_dir[axis];
            let t2 = (hi - o) * inv_dir[axis];
            t_enter = t_enter.max(t1.min(t2));
            t_exit = t_exit.min(t1.max(t2));
        }

        if t_enter <= t_exit {
            Some(t_enter)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_box() {
        let b = Aabb::EMPTY;
        assert!(b.is_empty());
        assert_eq!(b.area(), 0.0);

        let mut g = Aabb::EMPTY;
        g.grow_point(Vec3::new(1.0, 2.0, 3.0));
        assert!(!g.is_empty());
        assert_eq!(g.min, g.max);
    }

    #[test]
    fn test_area_and_axis() {
        let b = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.area(), 2.0 * (2.0 + 6.0 + 3.0));
        assert_eq!(b.longest_axis(), 2);
        assert!(b.contains(&Aabb::new(Vec3::splat(0.5), Vec3::ONE), 0.0));
        assert!(!b.contains(&Aabb::new(Vec3::splat(-0.5), Vec3::ONE), 0.0));
    }

    #[test]
    fn test_slab_intersection() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let t = b.intersect(&ray, ray.dir.recip(), f32::INFINITY).unwrap();
        assert!((t - 4.0).abs() < 1e-6);

        // Box behind t_max is rejected.
        assert!(b.intersect(&ray, ray.dir.recip(), 3.0).is_none());

        // Origin on the x = -1 face, travelling inside that plane.
        let grazing = Ray::new(Vec3::new(-1.0, 0.0, -5.0), Vec3::Z);
        assert!(b.intersect(&grazing, grazing.dir.recip(), f32::INFINITY).is_some());

        let miss = Ray::new(Vec3::new(3.0, 0.0, -5.0), Vec3::Z);
        assert!(b.intersect(&miss, miss.dir.recip(), f32::INFINITY).is_none());
    }
}
