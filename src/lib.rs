//! # wavetrace
//!
//! Interactive path tracer core: a bounding volume hierarchy over triangle
//! meshes and a wavefront ("microkernel") scheduler that keeps thousands of
//! paths in flight and routes them through phase-specific kernels.
//!
//! ## Modules
//!
//! - [`util`] - Errors and shading math helpers
//! - [`geom`] - Triangles, boxes, rays and the ray-triangle test
//! - [`bvh`] - Tree build (median / SAH), traversal and the on-disk cache
//! - [`scene`] - Materials, textures, lights and camera handed to the core
//! - [`render`] - Path task store, work queues, kernels and the renderer
//!
//! ## Example
//!
//! ```ignore
//! use wavetrace::prelude::*;
//!
//! let mut renderer = Renderer::new(demo::cornell_box(), RenderParams::default())?;
//! for _ in 0..200 {
//!     renderer.step();
//! }
//! let pixels = renderer.frame();
//! println!("{}", renderer.stats());
//! ```

pub mod util;
pub mod geom;
pub mod bvh;
pub mod scene;
pub mod render;

// Re-export commonly used types
pub use util::{Error, Result};
pub use bvh::{Bvh, SplitMode};
pub use render::{RenderParams, Renderer};

/// Build date stamped by the build script.
pub const BUILD_DATE: &str = env!("WAVETRACE_BUILD_DATE");

/// Build time (UTC) stamped by the build script.
pub const BUILD_TIME: &str = env!("WAVETRACE_BUILD_TIME");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result};
    pub use crate::geom::{Aabb, Hit, Ray, Triangle, Vertex};
    pub use crate::bvh::{BuildOptions, Bvh, SplitMode};
    pub use crate::scene::{demo, AreaLight, BxdfType, Camera, Light, Material, PointLight, Scene, TexDescriptor};
    pub use crate::render::{Backend, PathPhase, RenderParams, Renderer, StatsSnapshot};
}
