//! Integration tests for BVH construction, traversal and the cache file.

use glam::Vec3;
use tempfile::NamedTempFile;

use wavetrace::bvh::{intersect_brute_force, BuildOptions, Bvh, SplitMode};
use wavetrace::geom::{Ray, Triangle};
use wavetrace::render::Rng;
use wavetrace::scene::demo;
use wavetrace::Error;

const MODES: [SplitMode; 3] = [SplitMode::ObjectMedian, SplitMode::SpatialMedian, SplitMode::Sah];

fn random_vec(rng: &mut Rng, scale: f32) -> Vec3 {
    Vec3::new(rng.next_f32() - 0.5, rng.next_f32() - 0.5, rng.next_f32() - 0.5) * scale
}

/// Soup of small random triangles inside a 10-unit cube.
fn triangle_soup(count: usize, seed: u32) -> Vec<Triangle> {
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|i| {
            let c = random_vec(&mut rng, 10.0);
            Triangle::from_positions(
                c + random_vec(&mut rng, 1.5),
                c + random_vec(&mut rng, 1.5),
                c + random_vec(&mut rng, 1.5),
                (i % 4) as u32,
            )
        })
        .collect()
}

fn random_rays(count: usize, seed: u32) -> Vec<Ray> {
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|_| {
            let orig = random_vec(&mut rng, 16.0);
            let target = random_vec(&mut rng, 8.0);
            Ray::new(orig, (target - orig).normalize())
        })
        .collect()
}

#[test]
fn test_traversal_matches_brute_force() {
    let tris = triangle_soup(600, 1);
    let rays = random_rays(1500, 2);

    for mode in MODES {
        for leaf in [1, 4] {
            let bvh = Bvh::build(&tris, &BuildOptions { split: mode, max_leaf_size: leaf });
            bvh.validate().unwrap();

            let mut hits = 0;
            for ray in &rays {
                let expected = intersect_brute_force(ray, &tris, f32::INFINITY);
                let got = bvh.intersect_nearest(ray, &tris, f32::INFINITY);
                match (expected, got) {
                    (None, None) => {}
                    (Some(e), Some(g)) => {
                        assert!((e.t - g.t).abs() < 1e-4, "{mode:?}: t {} vs {}", e.t, g.t);
                        hits += 1;
                    }
                    (e, g) => panic!("{mode:?}: brute force {e:?}, bvh {g:?}"),
                }
                assert_eq!(bvh.intersect_any(ray, &tris, f32::INFINITY), expected.is_some());
            }
            assert!(hits > 100, "{mode:?}: only {hits} hits, test rays miss the soup");
        }
    }
}

#[test]
fn test_any_hit_respects_distance() {
    let tris = triangle_soup(300, 5);
    let bvh = Bvh::build(&tris, &BuildOptions::default());
    for ray in random_rays(500, 6) {
        if let Some(hit) = intersect_brute_force(&ray, &tris, f32::INFINITY) {
            assert!(bvh.intersect_any(&ray, &tris, hit.t + 1e-3));
            // Nothing can block before the nearest hit.
            assert!(!bvh.intersect_any(&ray, &tris, hit.t * 0.999));
        }
    }
}

#[test]
fn test_leaf_ranges_partition_primitives() {
    let tris = triangle_soup(777, 9);
    for mode in MODES {
        let bvh = Bvh::build(&tris, &BuildOptions::new(mode));
        let mut covered = vec![0u32; bvh.prim_order().len()];
        for node in bvh.nodes() {
            if let Some(range) = node.prim_range() {
                for slot in &mut covered[range] {
                    *slot += 1;
                }
            }
        }
        assert!(covered.iter().all(|&c| c == 1), "{mode:?}: leaf ranges overlap or leave gaps");
    }
}

#[test]
fn test_build_is_deterministic() {
    let tris = triangle_soup(1000, 13);
    for mode in MODES {
        let a = Bvh::build(&tris, &BuildOptions::new(mode));
        let b = Bvh::build(&tris, &BuildOptions::new(mode));
        assert_eq!(a.nodes_bytes(), b.nodes_bytes(), "{mode:?}");
        assert_eq!(a.prim_order_bytes(), b.prim_order_bytes(), "{mode:?}");
    }
}

#[test]
fn test_sah_not_worse_than_median() {
    let scene = demo::cornell_box();
    let cost = |bvh: &Bvh| -> f32 {
        // Expected intersection work under the surface area heuristic.
        let root_area = bvh.nodes()[0].aabb().area();
        bvh.nodes()
            .iter()
            .map(|n| {
                let p = n.aabb().area() / root_area;
                if n.is_leaf() {
                    p * n.count as f32
                } else {
                    p
                }
            })
            .sum()
    };
    let sah = Bvh::build(&scene.triangles, &BuildOptions::new(SplitMode::Sah));
    let median = Bvh::build(&scene.triangles, &BuildOptions::new(SplitMode::ObjectMedian));
    assert!(cost(&sah) <= cost(&median) * 1.2, "sah {} median {}", cost(&sah), cost(&median));
}

#[test]
fn test_cache_roundtrip_preserves_traversal() {
    let tris = triangle_soup(400, 21);
    let bvh = Bvh::build(&tris, &BuildOptions::default());

    let temp = NamedTempFile::new().expect("Failed to create temp file");
    bvh.save(temp.path()).expect("Failed to save BVH");
    let loaded = Bvh::load(temp.path(), tris.len()).expect("Failed to load BVH");
    assert_eq!(loaded, bvh);

    for ray in random_rays(400, 22) {
        let a = bvh.intersect_nearest(&ray, &tris, f32::INFINITY);
        let b = loaded.intersect_nearest(&ray, &tris, f32::INFINITY);
        assert_eq!(a, b);
    }
}

#[test]
fn test_cache_rejects_other_scene() {
    let tris = triangle_soup(50, 30);
    let bvh = Bvh::build(&tris, &BuildOptions::default());
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    bvh.save(temp.path()).unwrap();

    let err = Bvh::load(temp.path(), 51).unwrap_err();
    assert!(matches!(err, Error::CacheMismatch { expected: 51, found: 50 }));
    assert!(err.is_stale_cache());
}

#[test]
fn test_missing_cache_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Bvh::load(dir.path().join("missing.wtbvh"), 10).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
}

#[test]
fn test_empty_scene_tree() {
    let bvh = Bvh::build(&[], &BuildOptions::default());
    assert_eq!(bvh.nodes().len(), 1);
    assert!(bvh.nodes()[0].is_leaf());
    assert_eq!(bvh.nodes()[0].count, 0);
    assert!(bvh.nodes()[0].aabb().is_empty());
    let ray = Ray::new(Vec3::ZERO, Vec3::Z);
    assert!(bvh.intersect_nearest(&ray, &[], f32::INFINITY).is_none());
    assert!(!bvh.intersect_any(&ray, &[], f32::INFINITY));
}

#[test]
fn test_ray_in_box_face_plane() {
    // The ray runs inside the x = 0 plane that bounds the tree's box.
    let tris = vec![Triangle::from_positions(
        Vec3::new(0.0, 0.0, 5.0),
        Vec3::new(1.0, 0.0, 5.0),
        Vec3::new(0.0, 1.0, 5.0),
        0,
    )];
    let ray = Ray::new(Vec3::new(0.0, 0.25, 0.0), Vec3::Z);
    let expected = intersect_brute_force(&ray, &tris, f32::INFINITY).map(|h| h.t);
    assert_eq!(expected, Some(5.0));

    for mode in MODES {
        let bvh = Bvh::build(&tris, &BuildOptions::new(mode));
        let got = bvh.intersect_nearest(&ray, &tris, f32::INFINITY).map(|h| h.t);
        assert_eq!(got, expected, "{mode:?}");
        assert!(bvh.intersect_any(&ray, &tris, f32::INFINITY), "{mode:?}");
    }
}
