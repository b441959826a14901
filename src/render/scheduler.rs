//! Microkernel (wavefront) and megakernel drivers.
//!
//! ## Iteration
//! ```text
//! reset counters → classify every slot → seal (sort) queues
//!   → Extension → Shadow → material queues → HitNothing → Splat → Raygen
//! ```
//! Each slot sits in exactly one queue, so it advances by at most one phase.
//! Kernel dispatch goes through the backend; the splat queue is reduced in
//! slot order on the calling thread so every backend produces the same sums.

use super::accum::Accumulator;
use super::kernels::{self, KernelContext};
use super::params::Backend;
use super::queues::{QueueId, WorkQueues, DISPATCH_ORDER};
use super::task::PathTaskStore;
use crate::scene::Scene;

pub struct Microkernel {
    queues: WorkQueues,
}

impl Microkernel {
    pub fn new(capacity: usize, separate_materials: bool) -> Self {
        Self {
            queues: WorkQueues::new(capacity, separate_materials),
        }
    }

    pub fn queues(&self) -> &WorkQueues {
        &self.queues
    }

    /// Rebuild the queues from the current slot phases.
    pub fn classify(&mut self, store: &PathTaskStore, scene: &Scene, backend: Backend) {
        self.queues.reset();
        let queues = &self.queues;
        backend.for_each_index(store.capacity(), |slot| {
            let task = store.lock(slot);
            queues.classify(slot, &task, scene);
        });
        self.queues.seal();
    }

    /// One scheduler iteration.
    pub fn iterate(&mut self, ctx: &KernelContext<'_>, store: &PathTaskStore, accum: &mut Accumulator, backend: Backend) {
        self.classify(store, ctx.scene, backend);
        tracing::debug!(
            raygen = self.queues.len(QueueId::Raygen),
            extension = self.queues.len(QueueId::Extension),
            shadow = self.queues.len(QueueId::Shadow),
            shading = self.queues.material_total(),
            hit_nothing = self.queues.len(QueueId::HitNothing),
            splat = self.queues.len(QueueId::Splat),
            "queues classified"
        );

        for queue in DISPATCH_ORDER {
            let slots = self.queues.dispatch(queue);
            if slots.is_empty() {
                continue;
            }
            if queue == QueueId::Splat {
                for &slot in slots {
                    kernels::splat(accum, ctx.stats, &mut store.lock(slot));
                }
                continue;
            }
            backend.for_each_slot(slots, |slot| {
                kernels::run_queue(queue, ctx, slot, &mut store.lock(slot));
            });
        }
    }
}

/// Megakernel pass: every slot runs its current path to completion, then
/// all slots splat in slot order and return to camera ray generation.
pub fn megakernel_pass(ctx: &KernelContext<'_>, store: &PathTaskStore, accum: &mut Accumulator, backend: Backend) {
    backend.for_each_index(store.capacity(), |slot| {
        let mut task = store.lock(slot);
        while kernels::advance(ctx, slot, &mut task) {}
    });
    for slot in 0..store.capacity() as u32 {
        kernels::splat(accum, ctx.stats, &mut store.lock(slot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::{BuildOptions, Bvh};
    use crate::render::accum::RenderStats;
    use crate::render::params::RenderParams;
    use crate::render::task::PathPhase;
    use crate::scene::demo;

    #[test]
    fn test_iteration_advances_one_phase() {
        let scene = demo::cornell_box();
        let bvh = Bvh::build(&scene.triangles, &BuildOptions::default());
        let params = RenderParams {
            width: 16,
            height: 16,
            capacity: 128,
            backend: Backend::Sequential,
            ..Default::default()
        };
        let stats = RenderStats::default();
        let ctx = KernelContext::new(&scene, &bvh, &params, &stats, params.capacity);
        let store = PathTaskStore::new(params.capacity);
        let mut accum = Accumulator::new(params.width, params.height);
        let mut mk = Microkernel::new(params.capacity, true);

        let mut before = store.phases();
        for _ in 0..40 {
            mk.iterate(&ctx, &store, &mut accum, params.backend);
            let after = store.phases();
            for (b, a) in before.iter().zip(&after) {
                assert!(b.can_transition_to(*a), "{b:?} -> {a:?}");
            }
            before = after;
        }
        assert!(stats.snapshot().samples > 0);
    }

    #[test]
    fn test_megakernel_leaves_slots_ready() {
        let scene = demo::cornell_box();
        let bvh = Bvh::build(&scene.triangles, &BuildOptions::default());
        let params = RenderParams {
            width: 8,
            height: 8,
            capacity: 64,
            ..Default::default()
        };
        let stats = RenderStats::default();
        let ctx = KernelContext::new(&scene, &bvh, &params, &stats, params.capacity);
        let store = PathTaskStore::new(params.capacity);
        let mut accum = Accumulator::new(params.width, params.height);

        megakernel_pass(&ctx, &store, &mut accum, Backend::Parallel);
        assert!(store.phases().iter().all(|&p| p == PathPhase::GenerateCameraRay));
        assert_eq!(stats.snapshot().samples, 64);
        assert!((0..64).all(|p| accum.samples(p) == 1));
    }
}
