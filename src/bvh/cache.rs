//! Persisted BVH cache: save a built tree and load it back for the same scene.
//!
//! A loaded tree is only accepted if its header matches the current format
//! and the triangle count of the scene; anything else is reported as a stale
//! cache so the caller can rebuild.

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
#[cfg(feature = "mmap")]
use memmap2::Mmap;

use super::format::*;
use super::node::BvhNode;
use super::{Bvh, SplitMode};
use crate::util::{Error, Result};

impl Bvh {
    /// Write the tree to `path`, replacing any existing file.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);
        self.write_to(&mut w)?;
        w.flush()?;
        tracing::debug!(nodes = self.nodes().len(), "BVH cache written");
        Ok(())
    }

    /// Serialize into any writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(BVH_MAGIC)?;
        w.write_u16::<LittleEndian>(CURRENT_VERSION)?;
        w.write_u32::<LittleEndian>(self.triangle_count() as u32)?;
        w.write_u32::<LittleEndian>(self.nodes().len() as u32)?;
        w.write_u32::<LittleEndian>(self.prim_order().len() as u32)?;
        w.write_u8(self.split_mode().to_u8())?;
        w.write_all(&[0u8; 3])?;

        for node in self.nodes() {
            for v in node.aabb_min {
                w.write_f32::<LittleEndian>(v)?;
            }
            w.write_i32::<LittleEndian>(node.parent)?;
            for v in node.aabb_max {
                w.write_f32::<LittleEndian>(v)?;
            }
            w.write_u32::<LittleEndian>(node.payload)?;
            w.write_u32::<LittleEndian>(node.count)?;
            w.write_u32::<LittleEndian>(node.flags)?;
        }
        for &idx in self.prim_order() {
            w.write_u32::<LittleEndian>(idx)?;
        }
        Ok(())
    }

    /// Load a tree from `path`, checking it against a scene of
    /// `triangle_count` triangles.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, triangle_count: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        #[cfg(feature = "mmap")]
        {
            // Safety: the mapping is read-only and dropped before returning.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            Self::from_bytes(&mmap, triangle_count)
        }
        #[cfg(not(feature = "mmap"))]
        {
            let mut file = file;
            let mut data = Vec::with_capacity(size as usize);
            file.read_to_end(&mut data)?;
            Self::from_bytes(&data, triangle_count)
        }
    }

    /// Parse and validate a serialized tree.
    pub fn from_bytes(data: &[u8], triangle_count: usize) -> Result<Self> {
        let mut r = Cursor::new(data);
        let eof = |r: &Cursor<&[u8]>| Error::UnexpectedEof(r.position());

        let mut magic = [0u8; 6];
        r.read_exact(&mut magic).map_err(|_| eof(&r))?;
        if &magic != BVH_MAGIC {
            return Err(Error::InvalidMagic);
        }

        let version = r.read_u16::<LittleEndian>().map_err(|_| eof(&r))?;
        if version != CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let tri_count = r.read_u32::<LittleEndian>().map_err(|_| eof(&r))? as usize;
        if tri_count != triangle_count {
            return Err(Error::CacheMismatch {
                expected: triangle_count,
                found: tri_count,
            });
        }

        let node_count = r.read_u32::<LittleEndian>().map_err(|_| eof(&r))? as usize;
        let prim_count = r.read_u32::<LittleEndian>().map_err(|_| eof(&r))? as usize;
        let split = r.read_u8().map_err(|_| eof(&r))?;
        let split = SplitMode::from_u8(split).ok_or_else(|| Error::invalid(format!("unknown split mode {split}")))?;
        let mut reserved = [0u8; 3];
        r.read_exact(&mut reserved).map_err(|_| eof(&r))?;

        if node_count == 0 {
            return Err(Error::invalid("cache holds no nodes"));
        }
        if data.len() < expected_size(node_count, prim_count) {
            return Err(Error::UnexpectedEof(data.len() as u64));
        }

        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let mut node = BvhNode::leaf(Default::default(), 0, 0, 0);
            for v in node.aabb_min.iter_mut() {
                *v = r.read_f32::<LittleEndian>().map_err(|_| eof(&r))?;
            }
            node.parent = r.read_i32::<LittleEndian>().map_err(|_| eof(&r))?;
            for v in node.aabb_max.iter_mut() {
                *v = r.read_f32::<LittleEndian>().map_err(|_| eof(&r))?;
            }
            node.payload = r.read_u32::<LittleEndian>().map_err(|_| eof(&r))?;
            node.count = r.read_u32::<LittleEndian>().map_err(|_| eof(&r))?;
            node.flags = r.read_u32::<LittleEndian>().map_err(|_| eof(&r))?;
            nodes.push(node);
        }

        let mut prim_order = Vec::with_capacity(prim_count);
        for _ in 0..prim_count {
            prim_order.push(r.read_u32::<LittleEndian>().map_err(|_| eof(&r))?);
        }

        let bvh = Bvh::from_parts(nodes, prim_order, tri_count, split);
        bvh.validate()?;
        Ok(bvh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::BuildOptions;
    use crate::geom::Triangle;
    use glam::Vec3;

    fn tris(n: usize) -> Vec<Triangle> {
        (0..n)
            .map(|i| {
                let x = i as f32;
                Triangle::from_positions(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 0.0, 0.0), Vec3::new(x, 1.0, 0.5), 0)
            })
            .collect()
    }

    fn encode(bvh: &Bvh) -> Vec<u8> {
        let mut buf = Vec::new();
        bvh.write_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_bytes_roundtrip() {
        let t = tris(40);
        let bvh = Bvh::build(&t, &BuildOptions::default());
        let buf = encode(&bvh);
        assert_eq!(buf.len(), expected_size(bvh.nodes().len(), 40));

        let back = Bvh::from_bytes(&buf, 40).unwrap();
        assert_eq!(back.nodes(), bvh.nodes());
        assert_eq!(back.prim_order(), bvh.prim_order());
        assert_eq!(back.split_mode(), bvh.split_mode());
    }

    #[test]
    fn test_triangle_count_mismatch() {
        let bvh = Bvh::build(&tris(10), &BuildOptions::default());
        let err = Bvh::from_bytes(&encode(&bvh), 11).unwrap_err();
        assert!(matches!(err, Error::CacheMismatch { expected: 11, found: 10 }));
        assert!(err.is_stale_cache());
    }

    #[test]
    fn test_bad_magic_and_version() {
        let bvh = Bvh::build(&tris(4), &BuildOptions::default());
        let mut buf = encode(&bvh);
        buf[0] = b'X';
        assert!(matches!(Bvh::from_bytes(&buf, 4), Err(Error::InvalidMagic)));

        let mut buf = encode(&bvh);
        buf[6] = 99;
        assert!(matches!(Bvh::from_bytes(&buf, 4), Err(Error::UnsupportedVersion(99))));
    }

    #[test]
    fn test_truncated() {
        let bvh = Bvh::build(&tris(20), &BuildOptions::default());
        let buf = encode(&bvh);
        let err = Bvh::from_bytes(&buf[..buf.len() - 3], 20).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof(_)));
    }

    #[test]
    fn test_corrupt_index_rejected() {
        let bvh = Bvh::build(&tris(8), &BuildOptions::default());
        let mut buf = encode(&bvh);
        let last = buf.len() - 4;
        buf[last..].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(Bvh::from_bytes(&buf, 8), Err(Error::InvalidStructure(_))));
    }
}
