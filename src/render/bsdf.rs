//! Scattering models evaluated by the material kernels.
//!
//! All lobes work in a local frame whose +z is the shading normal turned
//! toward the outgoing direction `wo`. Transmissive models track which side
//! they were entered from to pick the relative index of refraction.

use glam::{Vec2, Vec3};

use crate::scene::{BxdfType, Material};
use crate::util::math::{fresnel_dielectric, fresnel_schlick, luminance, reflect, refract, Frame, INV_PI, PI, TWO_PI};

/// Cosines below this are treated as grazing and rejected.
const MIN_COS: f32 = 1e-6;

/// Outcome of importance sampling a BSDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsdfSample {
    /// Incident direction (world space, unit length)
    pub wi: Vec3,
    /// `f * |cos| / pdf`, the throughput multiplier
    pub weight: Vec3,
    /// Solid-angle density; 1 for delta lobes
    pub pdf: f32,
    /// Sampled from a delta lobe
    pub specular: bool,
}

/// BSDF instance at one shading point.
#[derive(Debug, Clone, Copy)]
pub struct Bsdf {
    bxdf: BxdfType,
    kd: Vec3,
    ks: Vec3,
    ns: f32,
    alpha: f32,
    eta_i: f32,
    eta_t: f32,
    frame: Frame,
}

impl Bsdf {
    /// `kd` and `ks` are the reflectances after texturing; `n` is the
    /// unflipped shading normal, `wo` points back along the incoming ray.
    pub fn new(material: &Material, kd: Vec3, ks: Vec3, n: Vec3, wo: Vec3) -> Self {
        let entering = wo.dot(n) >= 0.0;
        let n = if entering { n } else { -n };
        let ni = material.ni.max(1e-3);
        let (eta_i, eta_t) = if entering { (1.0, ni) } else { (ni, 1.0) };
        Self {
            bxdf: material.bxdf,
            kd,
            ks,
            ns: material.ns.max(0.0),
            alpha: material.roughness(),
            eta_i,
            eta_t,
            frame: Frame::from_normal(n),
        }
    }

    pub fn is_delta(&self) -> bool {
        self.bxdf.is_delta()
    }

    /// Shading normal facing `wo`.
    pub fn normal(&self) -> Vec3 {
        self.frame.n
    }

    /// `f * |cos(wi)|` and the pdf `sample` would assign to `wi`. `None` for
    /// delta lobes and directions the model does not scatter into.
    pub fn eval(&self, wo: Vec3, wi: Vec3) -> Option<(Vec3, f32)> {
        let wo = self.frame.to_local(wo);
        let wi = self.frame.to_local(wi);
        if wo.z < MIN_COS {
            return None;
        }
        let (f_cos, pdf) = match self.bxdf {
            BxdfType::Diffuse => {
                if wi.z < MIN_COS {
                    return None;
                }
                (self.kd * INV_PI * wi.z, wi.z * INV_PI)
            }
            BxdfType::Glossy => {
                if wi.z < MIN_COS {
                    return None;
                }
                let p_diffuse = self.glossy_diffuse_prob()?;
                let cos_a = reflect(wo, Vec3::Z).dot(wi).max(0.0);
                let lobe = cos_a.powf(self.ns);
                let f = self.kd * INV_PI + self.ks * ((self.ns + 2.0) / TWO_PI * lobe);
                let pdf = p_diffuse * wi.z * INV_PI + (1.0 - p_diffuse) * (self.ns + 1.0) / TWO_PI * lobe;
                (f * wi.z, pdf)
            }
            BxdfType::GgxReflect => {
                if wi.z < MIN_COS {
                    return None;
                }
                let h = (wo + wi).normalize();
                let cos_oh = wo.dot(h);
                if cos_oh < MIN_COS {
                    return None;
                }
                let d = ggx_d(h.z, self.alpha);
                let g = ggx_g1(wo.z, self.alpha) * ggx_g1(wi.z, self.alpha);
                let f = fresnel_schlick(cos_oh, self.ks);
                (f * (d * g / (4.0 * wo.z)), d * h.z / (4.0 * cos_oh))
            }
            BxdfType::GgxRefract => self.eval_rough_dielectric(wo, wi)?,
            BxdfType::IdealReflect | BxdfType::IdealRefract => return None,
        };
        if pdf <= 0.0 || !pdf.is_finite() {
            return None;
        }
        Some((f_cos, pdf))
    }

    /// Importance sample an incident direction. `u` drives the direction,
    /// `u_lobe` the lobe choice.
    pub fn sample(&self, wo_world: Vec3, u: Vec2, u_lobe: f32) -> Option<BsdfSample> {
        let wo = self.frame.to_local(wo_world);
        if wo.z < MIN_COS {
            return None;
        }
        match self.bxdf {
            BxdfType::Diffuse => {
                let wi = cosine_hemisphere(u);
                if wi.z < MIN_COS {
                    return None;
                }
                Some(self.finish(wi, self.kd, wi.z * INV_PI, false))
            }
            BxdfType::Glossy => {
                let p_diffuse = self.glossy_diffuse_prob()?;
                let wi = if u_lobe < p_diffuse {
                    cosine_hemisphere(u)
                } else {
                    let r = reflect(wo, Vec3::Z);
                    let cos_a = u.x.powf(1.0 / (self.ns + 1.0));
                    let sin_a = (1.0 - cos_a * cos_a).max(0.0).sqrt();
                    let phi = TWO_PI * u.y;
                    Frame::from_normal(r).to_world(Vec3::new(sin_a * phi.cos(), sin_a * phi.sin(), cos_a))
                };
                let (f_cos, pdf) = self.eval(wo_world, self.frame.to_world(wi))?;
                Some(self.finish(wi, f_cos / pdf, pdf, false))
            }
            BxdfType::GgxReflect => {
                let h = sample_ggx_h(u, self.alpha);
                let cos_oh = wo.dot(h);
                if cos_oh < MIN_COS {
                    return None;
                }
                let wi = reflect(wo, h);
                if wi.z < MIN_COS {
                    return None;
                }
                let g = ggx_g1(wo.z, self.alpha) * ggx_g1(wi.z, self.alpha);
                let weight = fresnel_schlick(cos_oh, self.ks) * (g * cos_oh / (wo.z * h.z));
                let pdf = ggx_d(h.z, self.alpha) * h.z / (4.0 * cos_oh);
                Some(self.finish(wi, weight, pdf, false))
            }
            BxdfType::GgxRefract => {
                let h = sample_ggx_h(u, self.alpha);
                let cos_oh = wo.dot(h);
                if cos_oh < MIN_COS {
                    return None;
                }
                let fr = fresnel_dielectric(cos_oh, self.eta_i, self.eta_t);
                let d = ggx_d(h.z, self.alpha);
                if u_lobe < fr {
                    let wi = reflect(wo, h);
                    if wi.z < MIN_COS {
                        return None;
                    }
                    let g = ggx_g1(wo.z, self.alpha) * ggx_g1(wi.z, self.alpha);
                    let weight = self.ks * (g * cos_oh / (wo.z * h.z));
                    Some(self.finish(wi, weight, fr * d * h.z / (4.0 * cos_oh), false))
                } else {
                    let wi = refract(wo, h, self.eta_i / self.eta_t)?;
                    if wi.z > -MIN_COS {
                        return None;
                    }
                    let cos_ih = wi.dot(h);
                    let denom = self.eta_i * cos_oh + self.eta_t * cos_ih;
                    let g = ggx_g1(wo.z, self.alpha) * ggx_g1(-wi.z, self.alpha);
                    let weight = self.ks * (g * cos_oh / (wo.z * h.z));
                    let pdf = (1.0 - fr) * d * h.z * self.eta_t * self.eta_t * cos_ih.abs() / (denom * denom);
                    Some(self.finish(wi, weight, pdf, false))
                }
            }
            BxdfType::IdealReflect => {
                let wi = Vec3::new(-wo.x, -wo.y, wo.z);
                Some(self.finish(wi, self.ks, 1.0, true))
            }
            BxdfType::IdealRefract => {
                let fr = fresnel_dielectric(wo.z, self.eta_i, self.eta_t);
                let wi = if u_lobe < fr {
                    Vec3::new(-wo.x, -wo.y, wo.z)
                } else {
                    refract(wo, Vec3::Z, self.eta_i / self.eta_t)?
                };
                Some(self.finish(wi, self.ks, 1.0, true))
            }
        }
    }

    fn finish(&self, wi_local: Vec3, weight: Vec3, pdf: f32, specular: bool) -> BsdfSample {
        BsdfSample {
            wi: self.frame.to_world(wi_local).normalize(),
            weight,
            pdf,
            specular,
        }
    }

    /// Probability of picking the diffuse lobe of the glossy model.
    fn glossy_diffuse_prob(&self) -> Option<f32> {
        let d = luminance(self.kd).max(0.0);
        let s = luminance(self.ks).max(0.0);
        if d + s <= 0.0 {
            return None;
        }
        Some(d / (d + s))
    }

    fn eval_rough_dielectric(&self, wo: Vec3, wi: Vec3) -> Option<(Vec3, f32)> {
        let (eta_i, eta_t, alpha) = (self.eta_i, self.eta_t, self.alpha);
        if wi.z >= MIN_COS {
            let h = (wo + wi).normalize();
            let cos_oh = wo.dot(h);
            if cos_oh < MIN_COS {
                return None;
            }
            let fr = fresnel_dielectric(cos_oh, eta_i, eta_t);
            let d = ggx_d(h.z, alpha);
            let g = ggx_g1(wo.z, alpha) * ggx_g1(wi.z, alpha);
            return Some((self.ks * (fr * d * g / (4.0 * wo.z)), fr * d * h.z / (4.0 * cos_oh)));
        }
        if wi.z > -MIN_COS {
            return None;
        }

        let mut h = -(eta_i * wo + eta_t * wi);
        if h.length_squared() <= 0.0 {
            return None;
        }
        h = h.normalize();
        if h.z < 0.0 {
            h = -h;
        }
        let cos_oh = wo.dot(h);
        let cos_ih = wi.dot(h);
        if cos_oh < MIN_COS || cos_ih > -MIN_COS {
            return None;
        }
        let denom = eta_i * cos_oh + eta_t * cos_ih;
        let denom2 = denom * denom;
        if denom2 < 1e-12 {
            return None;
        }
        let fr = fresnel_dielectric(cos_oh, eta_i, eta_t);
        let d = ggx_d(h.z, alpha);
        let g = ggx_g1(wo.z, alpha) * ggx_g1(-wi.z, alpha);
        let scale = (1.0 - fr) * d * g * eta_t * eta_t * cos_ih.abs() * cos_oh / (wo.z * denom2);
        let pdf = (1.0 - fr) * d * h.z * eta_t * eta_t * cos_ih.abs() / denom2;
        Some((self.ks * scale, pdf))
    }
}

/// Cosine-weighted direction around +z.
pub fn cosine_hemisphere(u: Vec2) -> Vec3 {
    let r = u.x.sqrt();
    let phi = TWO_PI * u.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), (1.0 - u.x).max(0.0).sqrt())
}

fn ggx_d(cos_h: f32, alpha: f32) -> f32 {
    if cos_h <= 0.0 {
        return 0.0;
    }
    let a2 = alpha * alpha;
    let t = cos_h * cos_h * (a2 - 1.0) + 1.0;
    a2 / (PI * t * t)
}

/// Smith masking for one direction.
fn ggx_g1(cos: f32, alpha: f32) -> f32 {
    let c2 = cos * cos;
    if c2 <= 0.0 {
        return 0.0;
    }
    let tan2 = (1.0 - c2) / c2;
    2.0 / (1.0 + (1.0 + alpha * alpha * tan2).sqrt())
}

/// Half vector distributed as `D(h) * cos(h)`.
fn sample_ggx_h(u: Vec2, alpha: f32) -> Vec3 {
    let tan2 = alpha * alpha * u.x / (1.0 - u.x).max(1e-7);
    let cos = 1.0 / (1.0 + tan2).sqrt();
    let sin = (1.0 - cos * cos).max(0.0).sqrt();
    let phi = TWO_PI * u.y;
    Vec3::new(sin * phi.cos(), sin * phi.sin(), cos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::rng::Rng;

    fn bsdf(m: &Material, wo: Vec3) -> Bsdf {
        Bsdf::new(m, m.kd, m.ks, Vec3::Z, wo)
    }

    #[test]
    fn test_diffuse_weight_is_albedo() {
        let m = Material::diffuse(Vec3::new(0.2, 0.4, 0.6));
        let wo = Vec3::new(0.3, 0.0, 1.0).normalize();
        let b = bsdf(&m, wo);
        let s = b.sample(wo, Vec2::new(0.3, 0.7), 0.5).unwrap();
        assert!((s.weight - m.kd).length() < 1e-6);
        assert!(s.wi.z > 0.0);
        let (f_cos, pdf) = b.eval(wo, s.wi).unwrap();
        assert!((pdf - s.pdf).abs() < 1e-4);
        assert!((f_cos / pdf - s.weight).length() < 1e-4);
    }

    #[test]
    fn test_sample_matches_eval() {
        let wo = Vec3::new(0.4, -0.2, 1.0).normalize();
        let materials = [
            Material::glossy(Vec3::splat(0.3), Vec3::splat(0.5), 40.0),
            Material::metal(Vec3::new(0.9, 0.6, 0.3), 60.0),
            Material::rough_glass(1.5, 80.0),
        ];
        let mut rng = Rng::new(3);
        for m in &materials {
            let b = bsdf(m, wo);
            let mut checked = 0;
            for _ in 0..200 {
                let Some(s) = b.sample(wo, rng.next_vec2(), rng.next_f32()) else {
                    continue;
                };
                let Some((f_cos, pdf)) = b.eval(wo, s.wi) else {
                    continue;
                };
                assert!((pdf - s.pdf).abs() <= 1e-2 * pdf.max(1.0), "{:?}: {pdf} vs {}", m.bxdf, s.pdf);
                let w = f_cos / pdf;
                assert!((w - s.weight).length() <= 1e-2 * w.length().max(1.0), "{:?}", m.bxdf);
                checked += 1;
            }
            assert!(checked > 50, "{:?} produced too few samples", m.bxdf);
        }
    }

    #[test]
    fn test_delta_lobes() {
        let wo = Vec3::new(0.5, 0.0, 1.0).normalize();
        let mirror = bsdf(&Material::mirror(Vec3::splat(0.8)), wo);
        assert!(mirror.is_delta());
        assert!(mirror.eval(wo, Vec3::Z).is_none());
        let s = mirror.sample(wo, Vec2::ZERO, 0.0).unwrap();
        assert!(s.specular);
        assert!((s.wi - Vec3::new(-wo.x, 0.0, wo.z)).length() < 1e-5);

        let glass = bsdf(&Material::glass(1.5), wo);
        let through = glass.sample(wo, Vec2::ZERO, 0.99).unwrap();
        assert!(through.wi.z < 0.0);
        let bounce = glass.sample(wo, Vec2::ZERO, 0.0).unwrap();
        assert!(bounce.wi.z > 0.0);
    }

    #[test]
    fn test_exit_side_flips_normal() {
        let wo = -Vec3::Z;
        let b = bsdf(&Material::glass(1.5), wo);
        assert_eq!(b.normal(), -Vec3::Z);
    }

    #[test]
    fn test_rough_metal_energy_bounded() {
        let wo = Vec3::new(0.1, 0.2, 1.0).normalize();
        let b = bsdf(&Material::metal(Vec3::ONE, 20.0), wo);
        let mut rng = Rng::new(11);
        let n = 4000;
        let mut sum = Vec3::ZERO;
        for _ in 0..n {
            if let Some(s) = b.sample(wo, rng.next_vec2(), rng.next_f32()) {
                sum += s.weight;
            }
        }
        let albedo = sum / n as f32;
        assert!(albedo.max_element() <= 1.05, "albedo {albedo}");
        assert!(albedo.min_element() > 0.5);
    }
}
