//! Pinhole / thin-lens camera used for primary ray generation.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::geom::Ray;
use crate::util::math::TWO_PI;

/// Camera pose and lens. The basis vectors are kept orthonormal by
/// [`Camera::look_at`]; UI layers that edit them directly must do the same.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub pos: Vec3,
    pub dir: Vec3,
    pub up: Vec3,
    pub right: Vec3,
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Lens radius; 0 gives a pinhole camera
    pub aperture_size: f32,
    /// Distance to the plane in focus
    pub focal_dist: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 45.0)
    }
}

impl Camera {
    pub fn look_at(pos: Vec3, target: Vec3, up_hint: Vec3, fov: f32) -> Self {
        let dir = (target - pos).normalize();
        let right = dir.cross(up_hint).normalize();
        let up = right.cross(dir);
        Self {
            pos,
            dir,
            up,
            right,
            fov,
            aperture_size: 0.0,
            focal_dist: (target - pos).length(),
        }
    }

    /// Primary ray through pixel `(x, y)` (origin top-left) offset by
    /// `jitter` in [0,1)^2 within the pixel; `lens` in [0,1)^2 picks the
    /// aperture point.
    pub fn generate_ray(&self, x: u32, y: u32, width: u32, height: u32, jitter: Vec2, lens: Vec2) -> Ray {
        let aspect = width as f32 / height as f32;
        let tan_half = (self.fov.to_radians() * 0.5).tan();
        let ndc_x = 2.0 * ((x as f32 + jitter.x) / width as f32) - 1.0;
        let ndc_y = 1.0 - 2.0 * ((y as f32 + jitter.y) / height as f32);

        let dir = (self.dir + self.right * ndc_x * tan_half * aspect + self.up * ndc_y * tan_half).normalize();
        if self.aperture_size <= 0.0 {
            return Ray::new(self.pos, dir);
        }

        // Thin lens: aim every lens point at the same focal-plane point.
        let focus = self.pos + dir * (self.focal_dist / dir.dot(self.dir));
        let r = self.aperture_size * lens.x.sqrt();
        let phi = TWO_PI * lens.y;
        let orig = self.pos + self.right * (r * phi.cos()) + self.up * (r * phi.sin());
        Ray::new(orig, (focus - orig).normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_ray_points_forward() {
        let cam = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 60.0);
        let ray = cam.generate_ray(50, 50, 100, 100, Vec2::ZERO, Vec2::ZERO);
        assert!((ray.dir - (-Vec3::Z)).length() < 1e-5);
        assert_eq!(ray.orig, cam.pos);
    }

    #[test]
    fn test_top_left_goes_up_left() {
        let cam = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 60.0);
        let ray = cam.generate_ray(0, 0, 100, 100, Vec2::ZERO, Vec2::ZERO);
        assert!(ray.dir.x < 0.0);
        assert!(ray.dir.y > 0.0);
    }

    #[test]
    fn test_thin_lens_converges_on_focal_plane() {
        let mut cam = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 40.0);
        cam.aperture_size = 0.2;
        let a = cam.generate_ray(30, 60, 100, 100, Vec2::splat(0.5), Vec2::new(0.9, 0.1));
        let b = cam.generate_ray(30, 60, 100, 100, Vec2::splat(0.5), Vec2::new(0.4, 0.7));
        assert_ne!(a.orig, b.orig);
        // Both rays reach the z = 0 focal plane at the same point.
        let pa = a.at(-a.orig.z / a.dir.z);
        let pb = b.at(-b.orig.z / b.dir.z);
        assert!((pa - pb).length() < 1e-4);
    }
}
