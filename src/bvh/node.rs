//! BVH node layout.
//!
//! Flat pre-order array, GPU-uploadable as-is:
//! - 40-byte nodes, all 4-byte fields (no implicit padding, `Pod`)
//! - interior node: left child is always `index + 1`, `payload` = right child
//! - leaf node: `payload` = first entry in the primitive order, `count` = triangles

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::geom::Aabb;

/// Parent index stored for the root.
pub const NO_PARENT: i32 = -1;

/// Largest primitive count a leaf may hold.
pub const MAX_LEAF_PRIMS: u32 = u8::MAX as u32;

const FLAG_LEAF: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: [f32; 3],
    pub parent: i32,
    pub aabb_max: [f32; 3],
    /// Leaf: start index into the primitive order. Interior: right child index.
    pub payload: u32,
    /// Leaf primitive count (0 for interior nodes and the empty-scene leaf)
    pub count: u32,
    /// bit 0: leaf flag
    pub flags: u32,
}

impl BvhNode {
    pub fn leaf(aabb: Aabb, parent: i32, start: u32, count: u32) -> Self {
        Self {
            aabb_min: aabb.min.to_array(),
            parent,
            aabb_max: aabb.max.to_array(),
            payload: start,
            count,
            flags: FLAG_LEAF,
        }
    }

    /// Interior node; the right child index is patched in once that subtree starts.
    pub fn interior(aabb: Aabb, parent: i32) -> Self {
        Self {
            aabb_min: aabb.min.to_array(),
            parent,
            aabb_max: aabb.max.to_array(),
            payload: 0,
            count: 0,
            flags: 0,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        (self.flags & FLAG_LEAF) != 0
    }

    #[inline]
    pub fn aabb(&self) -> Aabb {
        Aabb::new(Vec3::from_array(self.aabb_min), Vec3::from_array(self.aabb_max))
    }

    /// `(left, right)` child indices of an interior node at `index`.
    #[inline]
    pub fn children(&self, index: u32) -> Option<(u32, u32)> {
        if self.is_leaf() {
            None
        } else {
            Some((index + 1, self.payload))
        }
    }

    /// Range into the primitive order for a leaf.
    #[inline]
    pub fn prim_range(&self) -> Option<std::ops::Range<usize>> {
        if self.is_leaf() {
            let start = self.payload as usize;
            Some(start..start + self.count as usize)
        } else {
            None
        }
    }
}
