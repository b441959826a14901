//! Bounding volume hierarchy over scene triangles.
//!
//! ## Architecture
//! ```text
//! Triangles → build (median / SAH, explicit stack) → pre-order nodes + primitive order
//!           → traversal (nearest / any hit)        → cache file (save / load)
//! ```
//!
//! The tree is immutable once built and is replaced wholesale on rebuild, so
//! it can be shared read-only by every traversal call.

mod build;
mod cache;
pub mod format;
mod node;
mod traverse;

pub use build::{build_bvh, BuildOptions, BuildStats, SplitMode};
pub use node::{BvhNode, MAX_LEAF_PRIMS, NO_PARENT};
pub use traverse::intersect_brute_force;

use crate::geom::Triangle;
use crate::util::{Error, Result};

/// Built BVH.
#[derive(Debug, Clone, PartialEq)]
pub struct Bvh {
    /// Flat node array (index 0 = root, pre-order).
    nodes: Vec<BvhNode>,
    /// Permuted triangle indices (leaves reference into this).
    prim_order: Vec<u32>,
    /// Triangle count of the scene the tree was built for.
    triangle_count: usize,
    split: SplitMode,
}

impl Bvh {
    /// Build a tree over `triangles`.
    pub fn build(triangles: &[Triangle], options: &BuildOptions) -> Self {
        build_bvh(triangles, options)
    }

    pub(crate) fn from_parts(nodes: Vec<BvhNode>, prim_order: Vec<u32>, triangle_count: usize, split: SplitMode) -> Self {
        Self {
            nodes,
            prim_order,
            triangle_count,
            split,
        }
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn prim_order(&self) -> &[u32] {
        &self.prim_order
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    pub fn split_mode(&self) -> SplitMode {
        self.split
    }

    /// Nodes as raw bytes for GPU storage buffers.
    pub fn nodes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    /// Primitive order as raw bytes.
    pub fn prim_order_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.prim_order)
    }

    /// Depth of every node (root = 0), computed from the parent links.
    pub fn depths(&self) -> Vec<usize> {
        let mut depth = vec![0usize; self.nodes.len()];
        // Parents always precede children in pre-order.
        for (i, node) in self.nodes.iter().enumerate().skip(1) {
            depth[i] = depth[node.parent as usize] + 1;
        }
        depth
    }

    pub fn stats(&self) -> BuildStats {
        let depths = self.depths();
        let mut stats = BuildStats {
            nodes: self.nodes.len(),
            ..Default::default()
        };
        let mut total = 0usize;
        for (node, &d) in self.nodes.iter().zip(&depths) {
            stats.max_depth = stats.max_depth.max(d);
            if node.is_leaf() {
                stats.leaves += 1;
                total += node.count as usize;
                stats.max_leaf_size = stats.max_leaf_size.max(node.count as usize);
            }
        }
        if stats.leaves > 0 {
            stats.avg_leaf_size = total as f32 / stats.leaves as f32;
        }
        stats
    }

    /// Structural check: pre-order child links, parent links, leaf ranges
    /// inside the primitive order, and the primitive order being a
    /// permutation of the scene's triangles.
    pub fn validate(&self) -> Result<()> {
        let n = self.nodes.len();
        if n == 0 {
            return Err(Error::invalid("tree has no nodes"));
        }
        if self.nodes[0].parent != NO_PARENT {
            return Err(Error::invalid("root has a parent"));
        }
        if self.prim_order.len() != self.triangle_count {
            return Err(Error::invalid(format!(
                "primitive order has {} entries for {} triangles",
                self.prim_order.len(),
                self.triangle_count
            )));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(range) = node.prim_range() {
                if node.count > MAX_LEAF_PRIMS || range.end > self.prim_order.len() {
                    return Err(Error::invalid(format!("leaf {i} range {range:?} out of bounds")));
                }
            } else if let Some((left, right)) = node.children(i as u32) {
                let (left, right) = (left as usize, right as usize);
                if right <= left || right >= n || left >= n {
                    return Err(Error::invalid(format!("node {i} has bad children ({left}, {right})")));
                }
                if self.nodes[left].parent != i as i32 || self.nodes[right].parent != i as i32 {
                    return Err(Error::invalid(format!("children of node {i} do not link back")));
                }
            }
            if i > 0 && (self.nodes[i].parent < 0 || self.nodes[i].parent as usize >= i) {
                return Err(Error::invalid(format!("node {i} is not in pre-order")));
            }
        }

        let mut seen = vec![false; self.triangle_count];
        for &idx in &self.prim_order {
            match seen.get_mut(idx as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(Error::invalid(format!("primitive index {idx} invalid or repeated"))),
            }
        }
        Ok(())
    }
}
