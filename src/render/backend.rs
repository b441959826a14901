//! Execution backends: the same per-slot closure run sequentially or with rayon.

use rayon::prelude::*;

pub use super::params::Backend;

impl Backend {
    /// Run `f` for every slot in `slots`. Returns once all calls finished,
    /// which is the barrier between consecutive queues.
    pub fn for_each_slot<F>(self, slots: &[u32], f: F)
    where
        F: Fn(u32) + Sync + Send,
    {
        match self {
            Backend::Sequential => slots.iter().copied().for_each(f),
            Backend::Parallel => slots.par_iter().copied().for_each(f),
        }
    }

    /// Run `f` for every slot index in `0..count`.
    pub fn for_each_index<F>(self, count: usize, f: F)
    where
        F: Fn(u32) + Sync + Send,
    {
        let count = count as u32;
        match self {
            Backend::Sequential => (0..count).for_each(f),
            Backend::Parallel => (0..count).into_par_iter().for_each(f),
        }
    }
}
