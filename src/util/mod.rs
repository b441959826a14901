//! Utility types and functions shared by the BVH and the renderer.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam plus shading helpers

mod error;
pub mod math;

pub use error::*;
pub use math::{luminance, power_heuristic, sanitize, Frame, Vec2, Vec3, Vec4};
