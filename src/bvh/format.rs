//! BVH cache file format constants.
//!
//! ```text
//! offset  size  field
//!      0     6  magic "WTBVH\0"
//!      6     2  version (u16 LE)
//!      8     4  triangle count of the scene the tree was built for
//!     12     4  node count
//!     16     4  primitive-order length
//!     20     1  split mode
//!     21     3  reserved (zero)
//!     24     -  nodes, NODE_SIZE bytes each, then u32 primitive indices
//! ```

/// Magic bytes at the start of a BVH cache file.
pub const BVH_MAGIC: &[u8; 6] = b"WTBVH\0";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 24;

/// Current cache format version.
pub const CURRENT_VERSION: u16 = 1;

/// Serialized size of one node (3 + 1 + 3 + 3 four-byte fields).
pub const NODE_SIZE: usize = 40;

/// Serialized size of one primitive index.
pub const INDEX_SIZE: usize = 4;

/// Total file size implied by a header.
#[inline]
pub const fn expected_size(node_count: usize, prim_count: usize) -> usize {
    HEADER_SIZE + node_count * NODE_SIZE + prim_count * INDEX_SIZE
}
