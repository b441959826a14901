//! Stack-based BVH traversal.
//!
//! Nearest-hit queries visit the nearer child first and skip nodes whose
//! entry distance is already beyond the closest hit. Any-hit queries (shadow
//! rays) return on the first blocking triangle.

use smallvec::SmallVec;

use super::Bvh;
use crate::geom::{intersect_triangle, make_hit, Hit, Ray, Triangle};

/// Inline stack depth; deeper trees spill to the heap.
const STACK_INLINE: usize = 64;

impl Bvh {
    /// Nearest triangle hit with `t` in `(EPSILON, t_max)`.
    pub fn intersect_nearest(&self, ray: &Ray, triangles: &[Triangle], t_max: f32) -> Option<Hit> {
        let nodes = self.nodes();
        let order = self.prim_order();
        let inv_dir = ray.dir.recip();

        let mut closest: Option<(u32, f32, f32, f32)> = None;
        let mut closest_t = t_max;

        let root_t = nodes[0].aabb().intersect(ray, inv_dir, closest_t)?;

        let mut stack: SmallVec<[(u32, f32); STACK_INLINE]> = SmallVec::new();
        stack.push((0, root_t));

        while let Some((index, entry)) = stack.pop() {
            if entry >= closest_t {
                continue;
            }
            let node = &nodes[index as usize];

            if let Some(range) = node.prim_range() {
                for &prim in &order[range] {
                    if let Some((t, u, v)) = intersect_triangle(ray, &triangles[prim as usize], closest_t) {
                        closest_t = t;
                        closest = Some((prim, t, u, v));
                    }
                }
                continue;
            }

            let Some((left, right)) = node.children(index) else {
                continue;
            };
            let hit_l = nodes[left as usize].aabb().intersect(ray, inv_dir, closest_t);
            let hit_r = nodes[right as usize].aabb().intersect(ray, inv_dir, closest_t);

            match (hit_l, hit_r) {
                (Some(tl), Some(tr)) => {
                    // Far child goes on the stack first so the near one pops next.
                    if tl <= tr {
                        stack.push((right, tr));
                        stack.push((left, tl));
                    } else {
                        stack.push((left, tl));
                        stack.push((right, tr));
                    }
                }
                (Some(tl), None) => stack.push((left, tl)),
                (None, Some(tr)) => stack.push((right, tr)),
                (None, None) => {}
            }
        }

        closest.map(|(prim, t, u, v)| make_hit(ray, &triangles[prim as usize], prim, t, u, v))
    }

    /// True if any triangle blocks the ray within `(EPSILON, t_max)`.
    pub fn intersect_any(&self, ray: &Ray, triangles: &[Triangle], t_max: f32) -> bool {
        let nodes = self.nodes();
        let order = self.prim_order();
        let inv_dir = ray.dir.recip();

        let mut stack: SmallVec<[u32; STACK_INLINE]> = SmallVec::new();
        stack.push(0);

        while let Some(index) = stack.pop() {
            let node = &nodes[index as usize];
            if node.aabb().intersect(ray, inv_dir, t_max).is_none() {
                continue;
            }

            if let Some(range) = node.prim_range() {
                if order[range]
                    .iter()
                    .any(|&prim| intersect_triangle(ray, &triangles[prim as usize], t_max).is_some())
                {
                    return true;
                }
            } else if let Some((left, right)) = node.children(index) {
                stack.push(right);
                stack.push(left);
            }
        }

        false
    }
}

/// Reference nearest-hit query against every triangle.
pub fn intersect_brute_force(ray: &Ray, triangles: &[Triangle], t_max: f32) -> Option<Hit> {
    let mut closest: Option<(u32, f32, f32, f32)> = None;
    let mut closest_t = t_max;
    for (i, tri) in triangles.iter().enumerate() {
        if let Some((t, u, v)) = intersect_triangle(ray, tri, closest_t) {
            closest_t = t;
            closest = Some((i as u32, t, u, v));
        }
    }
    closest.map(|(prim, t, u, v)| make_hit(ray, &triangles[prim as usize], prim, t, u, v))
}
