//! Light sources: point lights and one-sided rectangular area lights.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::geom::{Hit, Ray, EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub pos: Vec3,
    /// Radiant intensity; irradiance falls off with the squared distance.
    pub intensity: Vec3,
}

/// Rectangle centered at `pos`, emitting from the side `n` points to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaLight {
    pub right: Vec3,
    pub up: Vec3,
    pub n: Vec3,
    pub pos: Vec3,
    /// Emitted radiance
    pub emission: Vec3,
    /// Half of the total width/height, measured from the center
    pub size: Vec2,
}

impl AreaLight {
    /// Build a light facing `n`; `up_hint` only needs to be non-parallel to `n`.
    pub fn new(pos: Vec3, n: Vec3, up_hint: Vec3, size: Vec2, emission: Vec3) -> Self {
        let n = n.normalize();
        let right = up_hint.cross(n).normalize();
        let up = n.cross(right);
        Self {
            right,
            up,
            n,
            pos,
            emission,
            size,
        }
    }

    pub fn area(&self) -> f32 {
        4.0 * self.size.x * self.size.y
    }

    /// Front-face intersection distance.
    pub fn intersect(&self, ray: &Ray, t_max: f32) -> Option<f32> {
        let denom = ray.dir.dot(self.n);
        if denom >= 0.0 {
            return None;
        }
        let t = (self.pos - ray.orig).dot(self.n) / denom;
        if t <= EPSILON || t >= t_max {
            return None;
        }
        let local = ray.at(t) - self.pos;
        if local.dot(self.right).abs() > self.size.x || local.dot(self.up).abs() > self.size.y {
            return None;
        }
        Some(t)
    }

    /// Uniform point on the rectangle for `u` in [0,1)^2.
    pub fn sample_point(&self, u: Vec2) -> Vec3 {
        self.pos + self.right * (2.0 * u.x - 1.0) * self.size.x + self.up * (2.0 * u.y - 1.0) * self.size.y
    }

    /// Solid-angle density of sampling the point at `dist` along `wi`
    /// (pointing from the shading point toward the light).
    pub fn pdf_w(&self, wi: Vec3, dist: f32) -> f32 {
        let cos_l = (-wi).dot(self.n);
        if cos_l <= 0.0 {
            return 0.0;
        }
        dist * dist / (cos_l * self.area())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Light {
    Point(PointLight),
    Area(AreaLight),
}

/// Direct light sample seen from a shading point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    /// Unit direction toward the light
    pub wi: Vec3,
    pub dist: f32,
    /// Incident radiance already divided by the sampling density. For point
    /// lights this is intensity over squared distance.
    pub weight: Vec3,
    /// Solid-angle pdf; 0 for delta lights, which implicit paths never hit.
    pub pdf_w: f32,
}

impl Light {
    pub fn is_delta(&self) -> bool {
        matches!(self, Light::Point(_))
    }

    /// Sample an incident direction from point `p`.
    pub fn sample(&self, p: Vec3, u: Vec2) -> Option<LightSample> {
        match self {
            Light::Point(l) => {
                let d = l.pos - p;
                let dist2 = d.length_squared();
                if dist2 <= EPSILON * EPSILON {
                    return None;
                }
                let dist = dist2.sqrt();
                Some(LightSample {
                    wi: d / dist,
                    dist,
                    weight: l.intensity / dist2,
                    pdf_w: 0.0,
                })
            }
            Light::Area(l) => {
                let q = l.sample_point(u);
                let d = q - p;
                let dist = d.length();
                if dist <= EPSILON {
                    return None;
                }
                let wi = d / dist;
                let pdf_w = l.pdf_w(wi, dist);
                if pdf_w <= 0.0 || !pdf_w.is_finite() {
                    return None;
                }
                Some(LightSample {
                    wi,
                    dist,
                    weight: l.emission / pdf_w,
                    pdf_w,
                })
            }
        }
    }
}

/// Nearest area-light hit along `ray`, as a hit record flagged `area_light_hit`.
pub fn intersect_area_lights(lights: &[Light], ray: &Ray, t_max: f32) -> Option<(usize, Hit)> {
    let mut best: Option<(usize, Hit)> = None;
    let mut closest = t_max;
    for (i, light) in lights.iter().enumerate() {
        let Light::Area(area) = light else {
            continue;
        };
        if let Some(t) = area.intersect(ray, closest) {
            closest = t;
            best = Some((
                i,
                Hit {
                    p: ray.at(t),
                    n: area.n,
                    uv: Vec2::ZERO,
                    t,
                    tri: Hit::NO_TRIANGLE,
                    material_id: Hit::NO_TRIANGLE,
                    area_light_hit: true,
                },
            ));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ceiling() -> AreaLight {
        AreaLight::new(Vec3::new(0.0, 2.0, 0.0), -Vec3::Y, Vec3::Z, Vec2::new(0.5, 0.25), Vec3::splat(4.0))
    }

    #[test]
    fn test_area_light_frame() {
        let l = ceiling();
        assert!((l.area() - 0.5).abs() < 1e-6);
        assert!(l.right.dot(l.n).abs() < 1e-6);
        assert!(l.up.dot(l.n).abs() < 1e-6);
    }

    #[test]
    fn test_area_light_one_sided() {
        let l = ceiling();
        let from_below = Ray::new(Vec3::ZERO, Vec3::Y);
        assert!((l.intersect(&from_below, f32::INFINITY).unwrap() - 2.0).abs() < 1e-6);

        let from_above = Ray::new(Vec3::new(0.0, 4.0, 0.0), -Vec3::Y);
        assert!(l.intersect(&from_above, f32::INFINITY).is_none());

        let beside = Ray::new(Vec3::new(3.0, 0.0, 0.0), Vec3::Y);
        assert!(l.intersect(&beside, f32::INFINITY).is_none());
    }

    #[test]
    fn test_point_light_falloff() {
        let light = Light::Point(PointLight {
            pos: Vec3::new(0.0, 0.0, 2.0),
            intensity: Vec3::splat(8.0),
        });
        let s = light.sample(Vec3::ZERO, Vec2::ZERO).unwrap();
        assert!((s.dist - 2.0).abs() < 1e-6);
        assert!((s.weight - Vec3::splat(2.0)).length() < 1e-6);
        assert!(light.is_delta());
    }

    #[test]
    fn test_area_sample_pdf() {
        let light = Light::Area(ceiling());
        let s = light.sample(Vec3::ZERO, Vec2::splat(0.5)).unwrap();
        // Straight up to the center: pdf = d^2 / (cos * A) = 4 / 0.5.
        assert!((s.pdf_w - 8.0).abs() < 1e-4);
        assert!((s.weight - Vec3::splat(0.5)).length() < 1e-5);
    }

    #[test]
    fn test_intersect_area_lights_flags_hit() {
        let lights = [Light::Area(ceiling())];
        let (i, hit) = intersect_area_lights(&lights, &Ray::new(Vec3::ZERO, Vec3::Y), f32::INFINITY).unwrap();
        assert_eq!(i, 0);
        assert!(hit.area_light_hit);
        assert_eq!(hit.tri, Hit::NO_TRIANGLE);
    }
}
