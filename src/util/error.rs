//! Error types for the renderer core.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for wavetrace operations.
///
/// Every condition here is local and recoverable; the renderer itself has
/// no fatal state.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of a BVH cache file
    #[error("Invalid BVH cache: expected WTBVH magic bytes")]
    InvalidMagic,

    /// Unsupported cache format version
    #[error("Unsupported BVH cache version: {0}")]
    UnsupportedVersion(u16),

    /// File is truncated or corrupted
    #[error("Unexpected end of data at position {0}")]
    UnexpectedEof(u64),

    /// Cached tree was built for a different scene
    #[error("BVH cache mismatch: scene has {expected} triangles, cache has {found}")]
    CacheMismatch { expected: usize, found: usize },

    /// Invalid data structure in a cache file
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// Render parameters failed validation
    #[error("Invalid render parameters: {0}")]
    InvalidParams(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// True when the error means a cached tree must be rebuilt rather than
    /// reported to the user.
    pub fn is_stale_cache(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic
                | Self::UnsupportedVersion(_)
                | Self::UnexpectedEof(_)
                | Self::CacheMismatch { .. }
                | Self::InvalidStructure(_)
        )
    }
}

/// Result type alias for wavetrace operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidMagic;
        assert!(e.to_string().contains("magic"));

        let e = Error::CacheMismatch { expected: 12, found: 7 };
        assert!(e.to_string().contains("12"));
        assert!(e.to_string().contains("7"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_stale_cache());
    }

    #[test]
    fn test_stale_cache_classification() {
        assert!(Error::CacheMismatch { expected: 1, found: 2 }.is_stale_cache());
        assert!(Error::UnsupportedVersion(9).is_stale_cache());
        assert!(!Error::other("x").is_stale_cache());
    }
}
