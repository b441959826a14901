//! BVH builder.
//!
//! Constructs a flat pre-order node array from a list of triangles. The
//! active primitive range is partitioned with an explicit stack using one
//! of three split policies (object median, spatial median, binned SAH).
//! Output is a pure function of the input order and the options.

use std::time::Instant;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::node::{BvhNode, MAX_LEAF_PRIMS, NO_PARENT};
use super::Bvh;
use crate::geom::{Aabb, Triangle};

/// Number of SAH bins for split evaluation.
const NUM_BINS: usize = 12;

/// Cost ratio: traversal vs intersection.
const TRAVERSAL_COST: f32 = 1.0;
const INTERSECT_COST: f32 = 1.0;

/// Centroid extents below this are treated as flat.
const MIN_EXTENT: f32 = 1e-8;

/// Split-selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SplitMode {
    /// Sort by centroid on the longest axis and split at the middle element.
    ObjectMedian,
    /// Split at the middle of the centroid bounds on the longest axis.
    SpatialMedian,
    /// Binned surface area heuristic.
    #[default]
    Sah,
}

impl SplitMode {
    pub fn to_u8(self) -> u8 {
        match self {
            SplitMode::ObjectMedian => 0,
            SplitMode::SpatialMedian => 1,
            SplitMode::Sah => 2,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(SplitMode::ObjectMedian),
            1 => Some(SplitMode::SpatialMedian),
            2 => Some(SplitMode::Sah),
            _ => None,
        }
    }
}

impl std::str::FromStr for SplitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "median" | "object-median" | "object_median" => Ok(SplitMode::ObjectMedian),
            "spatial" | "spatial-median" | "spatial_median" => Ok(SplitMode::SpatialMedian),
            "sah" => Ok(SplitMode::Sah),
            other => Err(format!("unknown split mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub split: SplitMode,
    /// Ranges at or below this size always become leaves.
    pub max_leaf_size: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            split: SplitMode::Sah,
            max_leaf_size: 4,
        }
    }
}

impl BuildOptions {
    pub fn new(split: SplitMode) -> Self {
        Self { split, ..Default::default() }
    }
}

/// Shape of a finished tree, for logs and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BuildStats {
    pub nodes: usize,
    pub leaves: usize,
    pub max_depth: usize,
    pub max_leaf_size: usize,
    pub avg_leaf_size: f32,
}

/// SAH bin for evaluating split candidates.
#[derive(Clone, Copy)]
struct Bin {
    bounds: Aabb,
    count: usize,
}

impl Bin {
    const EMPTY: Self = Self {
        bounds: Aabb::EMPTY,
        count: 0,
    };
}

/// Pending range. Left subtrees are always popped right after their parent,
/// which is what puts the left child at `parent + 1`.
struct Task {
    start: usize,
    end: usize, // exclusive
    parent: i32,
    is_right: bool,
}

/// Build a BVH from triangles.
///
/// Triangles are NOT modified; the returned primitive order indexes into the
/// original slice.
#[tracing::instrument(skip_all, fields(tri_count = triangles.len(), split = ?options.split))]
pub fn build_bvh(triangles: &[Triangle], options: &BuildOptions) -> Bvh {
    let started = Instant::now();
    let n = triangles.len();
    let max_leaf = options.max_leaf_size.clamp(1, MAX_LEAF_PRIMS) as usize;

    if n == 0 {
        return Bvh::from_parts(vec![BvhNode::leaf(Aabb::EMPTY, NO_PARENT, 0, 0)], Vec::new(), 0, options.split);
    }

    let aabbs: Vec<Aabb> = triangles.iter().map(|t| t.aabb()).collect();
    let centroids: Vec<Vec3> = triangles.iter().map(|t| t.centroid()).collect();

    let mut indices: Vec<u32> = (0..n as u32).collect();
    let mut nodes: Vec<BvhNode> = Vec::with_capacity(2 * n);

    let mut stack = vec![Task {
        start: 0,
        end: n,
        parent: NO_PARENT,
        is_right: false,
    }];

    while let Some(task) = stack.pop() {
        let node_idx = nodes.len();
        if task.is_right {
            nodes[task.parent as usize].payload = node_idx as u32;
        }

        let (start, end) = (task.start, task.end);
        let range = &mut indices[start..end];

        let mut node_aabb = Aabb::EMPTY;
        let mut centroid_bounds = Aabb::EMPTY;
        for &idx in range.iter() {
            node_aabb.grow(&aabbs[idx as usize]);
            centroid_bounds.grow_point(centroids[idx as usize]);
        }

        let split = if range.len() <= max_leaf {
            None
        } else {
            let chosen = match options.split {
                SplitMode::ObjectMedian => Some(object_median(range, &centroids, &centroid_bounds)),
                SplitMode::SpatialMedian => Some(spatial_median(range, &centroids, &centroid_bounds)),
                SplitMode::Sah => sah_split(range, &aabbs, &centroids, &centroid_bounds, &node_aabb),
            };
            // Leaves are capped by the node's u8-sized count.
            match chosen {
                None if range.len() > MAX_LEAF_PRIMS as usize => {
                    Some(object_median(range, &centroids, &centroid_bounds))
                }
                other => other,
            }
        };

        match split {
            None => {
                nodes.push(BvhNode::leaf(node_aabb, task.parent, start as u32, (end - start) as u32));
            }
            Some(mid) => {
                let mid = start + mid;
                nodes.push(BvhNode::interior(node_aabb, task.parent));
                stack.push(Task {
                    start: mid,
                    end,
                    parent: node_idx as i32,
                    is_right: true,
                });
                stack.push(Task {
                    start,
                    end: mid,
                    parent: node_idx as i32,
                    is_right: false,
                });
            }
        }
    }

    let bvh = Bvh::from_parts(nodes, indices, n, options.split);
    let stats = bvh.stats();
    tracing::info!(
        nodes = stats.nodes,
        leaves = stats.leaves,
        max_depth = stats.max_depth,
        avg_leaf = stats.avg_leaf_size,
        elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
        "BVH built"
    );
    bvh
}

/// Sort by centroid on the longest axis (ties broken by primitive index) and
/// split at the middle element. Always splits ranges of two or more.
fn object_median(range: &mut [u32], centroids: &[Vec3], centroid_bounds: &Aabb) -> usize {
    let axis = centroid_bounds.longest_axis();
    range.sort_unstable_by(|&a, &b| {
        centroids[a as usize][axis]
            .total_cmp(&centroids[b as usize][axis])
            .then(a.cmp(&b))
    });
    range.len() / 2
}

/// Split at the centroid-bounds midpoint; falls back to the object median if
/// one side would be empty.
fn spatial_median(range: &mut [u32], centroids: &[Vec3], centroid_bounds: &Aabb) -> usize {
    let axis = centroid_bounds.longest_axis();
    if centroid_bounds.extent()[axis] < MIN_EXTENT {
        return object_median(range, centroids, centroid_bounds);
    }
    let pos = centroid_bounds.centroid()[axis];
    let mid = partition(range, |&idx| centroids[idx as usize][axis] < pos);
    if mid == 0 || mid == range.len() {
        object_median(range, centroids, centroid_bounds)
    } else {
        mid
    }
}

/// Binned SAH over all three axes. `None` means a leaf is at least as cheap
/// as the best split, or all centroids coincide.
fn sah_split(
    range: &mut [u32],
    aabbs: &[Aabb],
    centroids: &[Vec3],
    centroid_bounds: &Aabb,
    node_aabb: &Aabb,
) -> Option<usize> {
    let parent_area = node_aabb.area();
    let (axis, bin, cost) = find_best_split(range, aabbs, centroids, centroid_bounds)?;

    let leaf_cost = range.len() as f32 * INTERSECT_COST;
    let split_cost = if parent_area > 0.0 {
        TRAVERSAL_COST + INTERSECT_COST * cost / parent_area
    } else {
        // Flat or point-like node: every child is hit with certainty.
        TRAVERSAL_COST + INTERSECT_COST * range.len() as f32
    };
    if split_cost >= leaf_cost {
        return None;
    }

    let min = centroid_bounds.min[axis];
    let inv_extent = NUM_BINS as f32 / centroid_bounds.extent()[axis];
    let mid = partition(range, |&idx| bin_index(centroids[idx as usize][axis], min, inv_extent) < bin);

    // Fallback: if partition is degenerate, split in middle
    if mid == 0 || mid == range.len() {
        Some(object_median(range, centroids, centroid_bounds))
    } else {
        Some(mid)
    }
}

#[inline]
fn bin_index(c: f32, min: f32, inv_extent: f32) -> usize {
    (((c - min) * inv_extent) as usize).min(NUM_BINS - 1)
}

/// SAH binned split search across all 3 axes.
/// Returns (axis, first right bin, area-weighted cost) or `None` if no axis
/// has a usable extent.
fn find_best_split(
    range: &[u32],
    aabbs: &[Aabb],
    centroids: &[Vec3],
    centroid_bounds: &Aabb,
) -> Option<(usize, usize, f32)> {
    let mut best: Option<(usize, usize, f32)> = None;

    for axis in 0..3 {
        let extent = centroid_bounds.extent()[axis];
        if extent < MIN_EXTENT {
            continue; // degenerate axis
        }

        let mut bins = [Bin::EMPTY; NUM_BINS];
        let min = centroid_bounds.min[axis];
        let inv_extent = NUM_BINS as f32 / extent;

        for &idx in range {
            let b = bin_index(centroids[idx as usize][axis], min, inv_extent);
            bins[b].bounds.grow(&aabbs[idx as usize]);
            bins[b].count += 1;
        }

        // Sweep from left: compute prefix areas and counts
        let mut left_area = [0.0f32; NUM_BINS - 1];
        let mut left_count = [0usize; NUM_BINS - 1];
        let mut sweep = Aabb::EMPTY;
        let mut sweep_count = 0;
        for i in 0..NUM_BINS - 1 {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            left_area[i] = sweep.area();
            left_count[i] = sweep_count;
        }

        // Sweep from right and evaluate
        sweep = Aabb::EMPTY;
        sweep_count = 0;
        for i in (1..NUM_BINS).rev() {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            if sweep_count == 0 || left_count[i - 1] == 0 {
                continue;
            }
            let cost = left_count[i - 1] as f32 * left_area[i - 1] + sweep_count as f32 * sweep.area();
            if best.map_or(true, |(_, _, c)| cost < c) {
                best = Some((axis, i, cost));
            }
        }
    }

    best
}

/// Partition slice in-place. Returns count of elements where predicate is true.
fn partition<T, F>(slice: &mut [T], pred: F) -> usize
where
    F: Fn(&T) -> bool,
{
    let mut left = 0;
    let mut right = slice.len();
    while left < right {
        if pred(&slice[left]) {
            left += 1;
        } else {
            right -= 1;
            slice.swap(left, right);
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tri(cx: f32, cy: f32, cz: f32) -> Triangle {
        Triangle::from_positions(
            Vec3::new(cx - 0.5, cy - 0.5, cz),
            Vec3::new(cx + 0.5, cy - 0.5, cz),
            Vec3::new(cx, cy + 0.5, cz),
            0,
        )
    }

    fn row(n: usize) -> Vec<Triangle> {
        (0..n).map(|i| make_tri(i as f32 * 2.0, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = build_bvh(&[], &BuildOptions::default());
        assert_eq!(bvh.nodes().len(), 1);
        assert!(bvh.nodes()[0].is_leaf());
        assert_eq!(bvh.nodes()[0].count, 0);
        assert!(bvh.nodes()[0].aabb().is_empty());
        assert!(bvh.prim_order().is_empty());
    }

    #[test]
    fn test_single_triangle() {
        let bvh = build_bvh(&[make_tri(0.0, 0.0, 0.0)], &BuildOptions::default());
        assert_eq!(bvh.nodes().len(), 1); // just a leaf
        assert_eq!(bvh.nodes()[0].count, 1);
        assert_eq!(bvh.nodes()[0].parent, NO_PARENT);
    }

    #[test]
    fn test_many_triangles_builds_tree() {
        for split in [SplitMode::ObjectMedian, SplitMode::SpatialMedian, SplitMode::Sah] {
            let bvh = build_bvh(&row(100), &BuildOptions::new(split));
            assert!(bvh.nodes().len() > 1, "{split:?} should have internal nodes");

            let mut sorted = bvh.prim_order().to_vec();
            sorted.sort();
            assert_eq!(sorted, (0..100).collect::<Vec<_>>());

            let root = bvh.nodes()[0].aabb();
            assert!(root.min.x < 0.0);
            assert!(root.max.x > 198.0);
        }
    }

    #[test]
    fn test_left_child_follows_parent() {
        let bvh = build_bvh(&row(64), &BuildOptions::new(SplitMode::Sah));
        for (i, node) in bvh.nodes().iter().enumerate() {
            if let Some((left, right)) = node.children(i as u32) {
                assert_eq!(bvh.nodes()[left as usize].parent, i as i32);
                assert_eq!(bvh.nodes()[right as usize].parent, i as i32);
                assert!(right > left);
            }
        }
    }

    #[test]
    fn test_median_depth_is_logarithmic() {
        let opts = BuildOptions {
            split: SplitMode::ObjectMedian,
            max_leaf_size: 1,
        };
        let bvh = build_bvh(&row(256), &opts);
        assert_eq!(bvh.stats().max_depth, 8);
        assert_eq!(bvh.stats().leaves, 256);
    }

    #[test]
    fn test_leaf_count_correct() {
        // 3 triangles → should be a single leaf
        let bvh = build_bvh(&row(3), &BuildOptions::default());
        assert_eq!(bvh.nodes()[0].count, 3);
    }

    #[test]
    fn test_coincident_triangles_respect_leaf_cap() {
        let tris: Vec<Triangle> = (0..600).map(|_| make_tri(1.0, 1.0, 1.0)).collect();
        let bvh = build_bvh(&tris, &BuildOptions::new(SplitMode::Sah));
        assert!(bvh.stats().max_leaf_size <= MAX_LEAF_PRIMS as usize);
        assert_eq!(bvh.prim_order().len(), 600);
    }

    #[test]
    fn test_split_mode_parse() {
        assert_eq!("sah".parse::<SplitMode>(), Ok(SplitMode::Sah));
        assert_eq!("median".parse::<SplitMode>(), Ok(SplitMode::ObjectMedian));
        assert!("octree".parse::<SplitMode>().is_err());
        for m in [SplitMode::ObjectMedian, SplitMode::SpatialMedian, SplitMode::Sah] {
            assert_eq!(SplitMode::from_u8(m.to_u8()), Some(m));
        }
    }
}
