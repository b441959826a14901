//! Wavefront path tracer.
//!
//! ## Architecture
//! ```text
//! Renderer::step
//!   ├─ Microkernel: classify slots → queues → phase kernels (backend) → splat reduction
//!   └─ megakernel pass: every slot runs to completion → splat reduction
//! ```
//!
//! Path state lives in [`PathTaskStore`]; [`WorkQueues`] partitions slot
//! indices by the kernel each slot needs next. Both backends give identical
//! images for the same seed.

pub mod accum;
pub mod backend;
pub mod bsdf;
pub mod kernels;
pub mod params;
pub mod queues;
pub mod renderer;
pub mod rng;
pub mod scheduler;
pub mod task;

pub use accum::{Accumulator, RenderStats, StatsSnapshot};
pub use bsdf::{Bsdf, BsdfSample};
pub use params::{Backend, RenderParams};
pub use queues::{QueueId, WorkQueues, DISPATCH_ORDER};
pub use renderer::Renderer;
pub use rng::Rng;
pub use scheduler::Microkernel;
pub use task::{PathPhase, PathTask, PathTaskStore};
