//! Math type re-exports and shading helpers.
//!
//! Vectors come from `glam`; this module adds the handful of scalar
//! helpers shared by the kernels (luminance, MIS heuristics, frames).

pub use glam::{UVec2, Vec2, Vec3, Vec4};

pub const PI: f32 = std::f32::consts::PI;
pub const INV_PI: f32 = std::f32::consts::FRAC_1_PI;
pub const TWO_PI: f32 = std::f32::consts::TAU;

/// Relative luminance (Rec. 709 weights).
#[inline]
pub fn luminance(c: Vec3) -> f32 {
    0.2126 * c.x + 0.7152 * c.y + 0.0722 * c.z
}

/// Power heuristic (beta = 2) weight for strategy `a` against strategy `b`.
///
/// Returns 0 when both pdfs vanish so that callers never see NaN.
#[inline]
pub fn power_heuristic(pdf_a: f32, pdf_b: f32) -> f32 {
    let a2 = pdf_a * pdf_a;
    let b2 = pdf_b * pdf_b;
    let sum = a2 + b2;
    if sum <= 0.0 || !sum.is_finite() {
        return 0.0;
    }
    a2 / sum
}

/// Replace non-finite and negative components with zero.
#[inline]
pub fn sanitize(c: Vec3) -> Vec3 {
    let fix = |v: f32| if v.is_finite() && v > 0.0 { v } else { 0.0 };
    Vec3::new(fix(c.x), fix(c.y), fix(c.z))
}

/// Orthonormal shading frame around a unit normal.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub t: Vec3,
    pub b: Vec3,
    pub n: Vec3,
}

impl Frame {
    pub fn from_normal(n: Vec3) -> Self {
        let (t, b) = n.any_orthonormal_pair();
        Self { t, b, n }
    }

    #[inline]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.t * v.x + self.b * v.y + self.n * v.z
    }

    #[inline]
    pub fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.t), v.dot(self.b), v.dot(self.n))
    }
}

/// Mirror `v` (pointing away from the surface) about `n`.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    2.0 * v.dot(n) * n - v
}

/// Refract `v` (pointing away from the surface) through `n` with relative
/// index `eta = eta_i / eta_t`. `None` on total internal reflection.
#[inline]
pub fn refract(v: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = v.dot(n);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i).max(0.0);
    if sin2_t >= 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some(-eta * v + (eta * cos_i - cos_t) * n)
}

/// Unpolarized Fresnel reflectance of a dielectric boundary.
pub fn fresnel_dielectric(cos_i: f32, eta_i: f32, eta_t: f32) -> f32 {
    let cos_i = cos_i.clamp(0.0, 1.0);
    let sin_t = eta_i / eta_t * (1.0 - cos_i * cos_i).max(0.0).sqrt();
    if sin_t >= 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin_t * sin_t).max(0.0).sqrt();
    let r_par = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
    let r_perp = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);
    0.5 * (r_par * r_par + r_perp * r_perp)
}

/// Schlick approximation with a colored normal-incidence reflectance.
#[inline]
pub fn fresnel_schlick(cos_theta: f32, f0: Vec3) -> Vec3 {
    let m = (1.0 - cos_theta.clamp(0.0, 1.0)).powi(5);
    f0 + (Vec3::ONE - f0) * m
}
