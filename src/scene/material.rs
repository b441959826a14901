//! Material table entries and texture descriptors.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Scattering model of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BxdfType {
    /// Lambertian
    #[default]
    Diffuse,
    /// Lambertian base plus a normalized Phong lobe
    Glossy,
    /// Rough conductor, GGX microfacets
    GgxReflect,
    /// Rough dielectric, GGX microfacets
    GgxRefract,
    /// Perfect mirror
    IdealReflect,
    /// Smooth dielectric
    IdealRefract,
}

/// Queue class a material is shaded in. Ideal (delta) models share one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialClass {
    Diffuse,
    Glossy,
    GgxReflect,
    GgxRefract,
    Delta,
}

impl MaterialClass {
    pub const ALL: [MaterialClass; 5] = [
        MaterialClass::Diffuse,
        MaterialClass::Glossy,
        MaterialClass::GgxReflect,
        MaterialClass::GgxRefract,
        MaterialClass::Delta,
    ];
}

impl BxdfType {
    pub fn class(self) -> MaterialClass {
        match self {
            BxdfType::Diffuse => MaterialClass::Diffuse,
            BxdfType::Glossy => MaterialClass::Glossy,
            BxdfType::GgxReflect => MaterialClass::GgxReflect,
            BxdfType::GgxRefract => MaterialClass::GgxRefract,
            BxdfType::IdealReflect | BxdfType::IdealRefract => MaterialClass::Delta,
        }
    }

    /// Delta lobes cannot be evaluated for an arbitrary direction, so they
    /// are skipped by next-event estimation.
    pub fn is_delta(self) -> bool {
        self.class() == MaterialClass::Delta
    }
}

/// Surface description, one entry of the scene's material table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Diffuse reflectivity
    pub kd: Vec3,
    /// Specular reflectivity
    pub ks: Vec3,
    /// Emitted radiance
    pub ke: Vec3,
    /// Specular exponent (shininess), normally in [0, 1000]
    pub ns: f32,
    /// Index of refraction
    pub ni: f32,
    /// Diffuse texture descriptor index, -1 for none
    pub map_kd: i32,
    /// Specular texture descriptor index, -1 for none
    pub map_ks: i32,
    /// Tangent-space normal map descriptor index, -1 for none
    pub map_n: i32,
    pub bxdf: BxdfType,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            kd: Vec3::splat(0.7),
            ks: Vec3::ZERO,
            ke: Vec3::ZERO,
            ns: 0.0,
            ni: 1.5,
            map_kd: -1,
            map_ks: -1,
            map_n: -1,
            bxdf: BxdfType::Diffuse,
        }
    }
}

impl Material {
    pub fn diffuse(kd: Vec3) -> Self {
        Self { kd, ..Default::default() }
    }

    pub fn glossy(kd: Vec3, ks: Vec3, ns: f32) -> Self {
        Self {
            kd,
            ks,
            ns,
            bxdf: BxdfType::Glossy,
            ..Default::default()
        }
    }

    pub fn metal(ks: Vec3, ns: f32) -> Self {
        Self {
            kd: Vec3::ZERO,
            ks,
            ns,
            bxdf: BxdfType::GgxReflect,
            ..Default::default()
        }
    }

    pub fn rough_glass(ni: f32, ns: f32) -> Self {
        Self {
            kd: Vec3::ZERO,
            ks: Vec3::ONE,
            ns,
            ni,
            bxdf: BxdfType::GgxRefract,
            ..Default::default()
        }
    }

    pub fn mirror(ks: Vec3) -> Self {
        Self {
            kd: Vec3::ZERO,
            ks,
            bxdf: BxdfType::IdealReflect,
            ..Default::default()
        }
    }

    pub fn glass(ni: f32) -> Self {
        Self {
            kd: Vec3::ZERO,
            ks: Vec3::ONE,
            ni,
            bxdf: BxdfType::IdealRefract,
            ..Default::default()
        }
    }

    pub fn emissive(ke: Vec3) -> Self {
        Self {
            kd: Vec3::ZERO,
            ke,
            ..Default::default()
        }
    }

    pub fn class(&self) -> MaterialClass {
        self.bxdf.class()
    }

    pub fn is_emissive(&self) -> bool {
        self.ke.max_element() > 0.0
    }

    /// GGX roughness derived from the Phong exponent (Beckmann-Phong mapping).
    pub fn roughness(&self) -> f32 {
        (2.0 / (self.ns.max(0.0) + 2.0)).sqrt().clamp(0.02, 1.0)
    }
}

/// Location of one texture in the shared texel array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TexDescriptor {
    /// Start of texture data in the texel array
    pub offset: u32,
    pub width: u32,
    pub height: u32,
}

impl TexDescriptor {
    /// Nearest texel for `uv`, wrapping in both directions.
    pub fn texel_index(&self, uv: Vec2) -> Option<usize> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let u = uv.x - uv.x.floor();
        let v = uv.y - uv.y.floor();
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        Some(self.offset as usize + (y * self.width + x) as usize)
    }
}
