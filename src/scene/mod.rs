//! Scene description consumed by the renderer core.
//!
//! Everything here is produced by external loaders (meshes, materials,
//! textures, lights) or by the UI layer (camera); the core only reads it.

mod camera;
pub mod demo;
mod light;
mod material;

pub use camera::Camera;
pub use light::{intersect_area_lights, AreaLight, Light, LightSample, PointLight};
pub use material::{BxdfType, Material, MaterialClass, TexDescriptor};

use glam::{Vec2, Vec3};

use crate::geom::{Hit, Triangle};
use crate::util::Frame;

static FALLBACK_MATERIAL: Material = Material {
    kd: Vec3::splat(0.7),
    ks: Vec3::ZERO,
    ke: Vec3::ZERO,
    ns: 0.0,
    ni: 1.5,
    map_kd: -1,
    map_ks: -1,
    map_n: -1,
    bxdf: BxdfType::Diffuse,
};

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub triangles: Vec<Triangle>,
    pub materials: Vec<Material>,
    pub textures: Vec<TexDescriptor>,
    /// Shared RGB texel storage addressed by [`TexDescriptor::offset`]
    pub texels: Vec<Vec3>,
    pub lights: Vec<Light>,
    pub camera: Camera,
    /// Radiance returned by rays that leave the scene
    pub background: Vec3,
}

impl Scene {
    pub fn new(triangles: Vec<Triangle>, materials: Vec<Material>) -> Self {
        Self {
            triangles,
            materials,
            ..Default::default()
        }
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_background(mut self, background: Vec3) -> Self {
        self.background = background;
        self
    }

    /// Material for `id`; unknown ids shade as the default grey diffuse.
    pub fn material(&self, id: u32) -> &Material {
        self.materials.get(id as usize).unwrap_or(&FALLBACK_MATERIAL)
    }

    /// Texture lookup; `None` for `-1`, unknown descriptors or out-of-range data.
    pub fn texture(&self, map: i32, uv: Vec2) -> Option<Vec3> {
        let desc = self.textures.get(usize::try_from(map).ok()?)?;
        self.texels.get(desc.texel_index(uv)?).copied()
    }

    /// Diffuse and specular reflectance at a hit, with texture maps applied.
    pub fn reflectance(&self, material: &Material, uv: Vec2) -> (Vec3, Vec3) {
        let kd = self.texture(material.map_kd, uv).map_or(material.kd, |t| material.kd * t);
        let ks = self.texture(material.map_ks, uv).map_or(material.ks, |t| material.ks * t);
        (kd, ks)
    }

    /// Shading normal at `hit`, perturbed by the material's tangent-space
    /// normal map when it has one. The tangent follows the triangle's `u`
    /// direction.
    pub fn shading_normal(&self, material: &Material, hit: &Hit) -> Vec3 {
        let Some(texel) = self.texture(material.map_n, hit.uv) else {
            return hit.n;
        };
        let Some(tri) = self.triangles.get(hit.tri as usize) else {
            return hit.n;
        };
        let n = hit.n;
        let [a, b, c] = tri.v;
        let (e1, e2) = (b.p - a.p, c.p - a.p);
        let (d1, d2) = ((b.t - a.t).truncate(), (c.t - a.t).truncate());
        let det = d1.x * d2.y - d2.x * d1.y;
        let tangent = if det.abs() > 1e-12 { (e1 * d2.y - e2 * d1.y) / det } else { Vec3::ZERO };
        let tangent = (tangent - n * n.dot(tangent)).normalize_or_zero();
        let frame = if tangent == Vec3::ZERO {
            Frame::from_normal(n)
        } else {
            Frame { t: tangent, b: n.cross(tangent), n }
        };

        let perturbed = frame.to_world(texel * 2.0 - Vec3::ONE).normalize_or_zero();
        if perturbed == Vec3::ZERO {
            n
        } else {
            perturbed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_fallback() {
        let scene = Scene::new(Vec::new(), vec![Material::mirror(Vec3::ONE)]);
        assert_eq!(scene.material(0).bxdf, BxdfType::IdealReflect);
        assert_eq!(*scene.material(42), Material::default());
    }

    #[test]
    fn test_textured_reflectance() {
        let mut scene = Scene::new(Vec::new(), Vec::new());
        scene.textures.push(TexDescriptor { offset: 0, width: 2, height: 1 });
        scene.texels = vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];

        let mut m = Material::diffuse(Vec3::splat(0.5));
        m.map_kd = 0;
        let (kd, _) = scene.reflectance(&m, Vec2::new(0.75, 0.5));
        assert_eq!(kd, Vec3::new(0.0, 0.5, 0.0));

        m.map_kd = 3;
        let (kd, _) = scene.reflectance(&m, Vec2::ZERO);
        assert_eq!(kd, Vec3::splat(0.5));
    }

    #[test]
    fn test_normal_map_tilts_along_u() {
        let tri = Triangle::from_positions(Vec3::ZERO, Vec3::X, Vec3::Y, 0);
        let mut scene = Scene::new(vec![tri], Vec::new());
        scene.textures.push(TexDescriptor { offset: 0, width: 1, height: 1 });
        // Tangent-space (1, 0, 1) / sqrt(2), encoded into [0, 1].
        let m = Vec3::new(1.0, 0.0, 1.0).normalize();
        scene.texels = vec![(m + Vec3::ONE) * 0.5];

        let hit = Hit {
            p: Vec3::new(0.2, 0.2, 0.0),
            n: Vec3::Z,
            uv: Vec2::new(0.2, 0.2),
            t: 1.0,
            tri: 0,
            material_id: 0,
            area_light_hit: false,
        };
        let mut material = Material::diffuse(Vec3::ONE);
        assert_eq!(scene.shading_normal(&material, &hit), Vec3::Z);

        material.map_n = 0;
        let n = scene.shading_normal(&material, &hit);
        assert!((n - m).length() < 1e-5, "{n}");
    }
}
