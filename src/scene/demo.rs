//! Built-in scenes for the CLI, benchmarks and tests.

use glam::{Vec2, Vec3};

use super::{AreaLight, Camera, Light, Material, PointLight, Scene};
use crate::geom::Triangle;

/// Two triangles `a b c`, `a c d`; counter-clockwise seen from the front.
pub fn quad(a: Vec3, b: Vec3, c: Vec3, d: Vec3, material_id: u32) -> [Triangle; 2] {
    [
        Triangle::from_positions(a, b, c, material_id),
        Triangle::from_positions(a, c, d, material_id),
    ]
}

/// Axis-aligned box with outward-facing triangles.
pub fn cuboid(min: Vec3, max: Vec3, material_id: u32) -> Vec<Triangle> {
    let p = |x: bool, y: bool, z: bool| {
        Vec3::new(
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        )
    };
    let faces = [
        // -x, +x
        [p(false, false, false), p(false, false, true), p(false, true, true), p(false, true, false)],
        [p(true, false, false), p(true, true, false), p(true, true, true), p(true, false, true)],
        // -y, +y
        [p(false, false, false), p(true, false, false), p(true, false, true), p(false, false, true)],
        [p(false, true, false), p(false, true, true), p(true, true, true), p(true, true, false)],
        // -z, +z
        [p(false, false, false), p(false, true, false), p(true, true, false), p(true, false, false)],
        [p(false, false, true), p(true, false, true), p(true, true, true), p(false, true, true)],
    ];
    faces
        .iter()
        .flat_map(|f| quad(f[0], f[1], f[2], f[3], material_id))
        .collect()
}

/// Cornell box in `[-1, 1]^3` with one object per material class and a
/// ceiling area light.
pub fn cornell_box() -> Scene {
    let materials = vec![
        Material::diffuse(Vec3::splat(0.73)),
        Material::diffuse(Vec3::new(0.65, 0.05, 0.05)),
        Material::diffuse(Vec3::new(0.12, 0.45, 0.15)),
        Material::glossy(Vec3::new(0.2, 0.2, 0.5), Vec3::splat(0.3), 60.0),
        Material::metal(Vec3::new(0.95, 0.64, 0.54), 200.0),
        Material::rough_glass(1.5, 400.0),
        Material::mirror(Vec3::splat(0.9)),
        Material::glass(1.5),
    ];

    let v = |x: f32, y: f32, z: f32| Vec3::new(x, y, z);
    let mut tris = Vec::new();
    // Floor, ceiling, back wall (white), left (red), right (green); the
    // walls face into the box.
    tris.extend(quad(v(-1.0, -1.0, -1.0), v(-1.0, -1.0, 1.0), v(1.0, -1.0, 1.0), v(1.0, -1.0, -1.0), 0));
    tris.extend(quad(v(-1.0, 1.0, -1.0), v(1.0, 1.0, -1.0), v(1.0, 1.0, 1.0), v(-1.0, 1.0, 1.0), 0));
    tris.extend(quad(v(-1.0, -1.0, -1.0), v(1.0, -1.0, -1.0), v(1.0, 1.0, -1.0), v(-1.0, 1.0, -1.0), 0));
    tris.extend(quad(v(-1.0, -1.0, -1.0), v(-1.0, 1.0, -1.0), v(-1.0, 1.0, 1.0), v(-1.0, -1.0, 1.0), 1));
    tris.extend(quad(v(1.0, -1.0, -1.0), v(1.0, -1.0, 1.0), v(1.0, 1.0, 1.0), v(1.0, 1.0, -1.0), 2));

    tris.extend(cuboid(v(-0.7, -1.0, -0.6), v(-0.2, 0.2, -0.1), 3));
    tris.extend(cuboid(v(0.2, -1.0, -0.5), v(0.6, -0.4, -0.1), 4));
    tris.extend(cuboid(v(0.25, -0.4, -0.45), v(0.55, -0.1, -0.15), 5));
    tris.extend(cuboid(v(-0.6, -1.0, 0.2), v(-0.3, -0.7, 0.5), 6));
    tris.extend(cuboid(v(0.2, -1.0, 0.25), v(0.5, -0.7, 0.55), 7));

    let light = AreaLight::new(
        Vec3::new(0.0, 0.99, 0.0),
        -Vec3::Y,
        Vec3::Z,
        Vec2::splat(0.25),
        Vec3::splat(12.0),
    );

    Scene::new(tris, materials)
        .with_light(Light::Area(light))
        .with_camera(Camera::look_at(Vec3::new(0.0, 0.0, 3.6), Vec3::ZERO, Vec3::Y, 40.0))
}

/// One large diffuse triangle in the `z = 0` plane facing +z, lit by a
/// point light on the camera axis.
pub fn single_triangle(kd: Vec3, light_pos: Vec3, intensity: Vec3) -> Scene {
    let tri = Triangle::from_positions(
        Vec3::new(-50.0, -50.0, 0.0),
        Vec3::new(50.0, -50.0, 0.0),
        Vec3::new(0.0, 80.0, 0.0),
        0,
    );
    Scene::new(vec![tri], vec![Material::diffuse(kd)])
        .with_light(Light::Point(PointLight { pos: light_pos, intensity }))
        .with_camera(Camera::look_at(Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO, Vec3::Y, 10.0))
}

/// No geometry and no lights; only the background is visible.
pub fn empty(background: Vec3) -> Scene {
    Scene::default().with_background(background)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_faces_outward() {
        let min = Vec3::splat(-1.0);
        let max = Vec3::splat(1.0);
        let tris = cuboid(min, max, 0);
        assert_eq!(tris.len(), 12);
        for t in &tris {
            let n = t.geometric_normal().normalize();
            assert!(n.dot(t.centroid()) > 0.0, "inward face {n}");
        }
    }

    #[test]
    fn test_cornell_uses_every_class() {
        use crate::scene::MaterialClass;
        let scene = cornell_box();
        for class in MaterialClass::ALL {
            assert!(
                scene.triangles.iter().any(|t| scene.material(t.material_id).class() == class),
                "no {class:?} geometry"
            );
        }
        assert_eq!(scene.lights.len(), 1);
    }
}
