//! Renderer: owns the scene, tree, task store and accumulation buffer and
//! drives them one iteration per [`Renderer::step`].

use std::path::Path;
use std::sync::Arc;

use glam::Vec3;

use super::accum::{Accumulator, RenderStats, StatsSnapshot};
use super::kernels::KernelContext;
use super::params::RenderParams;
use super::queues::WorkQueues;
use super::scheduler::{megakernel_pass, Microkernel};
use super::task::{PathPhase, PathTask, PathTaskStore};
use crate::bvh::Bvh;
use crate::scene::{Camera, Scene};
use crate::util::{Error, Result};

pub struct Renderer {
    scene: Arc<Scene>,
    bvh: Arc<Bvh>,
    params: RenderParams,
    store: PathTaskStore,
    scheduler: Microkernel,
    accum: Accumulator,
    stats: RenderStats,
    iteration: u64,
}

impl Renderer {
    /// Validate `params` and build a tree for `scene`.
    pub fn new(scene: Scene, params: RenderParams) -> Result<Self> {
        params.validate()?;
        let bvh = Bvh::build(&scene.triangles, &params.build_options());
        Self::with_bvh(scene, bvh, params)
    }

    /// Use an existing tree, which must have been built for `scene`.
    pub fn with_bvh(scene: Scene, bvh: Bvh, params: RenderParams) -> Result<Self> {
        params.validate()?;
        if bvh.triangle_count() != scene.triangles.len() {
            return Err(Error::CacheMismatch {
                expected: scene.triangles.len(),
                found: bvh.triangle_count(),
            });
        }
        Ok(Self {
            scene: Arc::new(scene),
            bvh: Arc::new(bvh),
            store: PathTaskStore::new(params.capacity),
            scheduler: Microkernel::new(params.capacity, params.separate_material_queues),
            accum: Accumulator::new(params.width, params.height),
            stats: RenderStats::default(),
            iteration: 0,
            params,
        })
    }

    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    pub fn bvh(&self) -> &Arc<Bvh> {
        &self.bvh
    }

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Advance every slot by one phase (microkernel) or one full path
    /// (megakernel) and fold finished paths into the accumulator.
    #[tracing::instrument(skip_all, fields(iteration = self.iteration))]
    pub fn step(&mut self) -> &Accumulator {
        let ctx = KernelContext::new(&self.scene, &self.bvh, &self.params, &self.stats, self.store.capacity());
        if self.params.use_microkernel {
            self.scheduler.iterate(&ctx, &self.store, &mut self.accum, self.params.backend);
        } else {
            megakernel_pass(&ctx, &self.store, &mut self.accum, self.params.backend);
        }
        self.stats.add_iteration();
        self.iteration += 1;
        &self.accum
    }

    /// Run `n` iterations.
    pub fn run(&mut self, n: usize) -> &Accumulator {
        for _ in 0..n {
            self.step();
        }
        &self.accum
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accum
    }

    /// Mean radiance per pixel, row-major from the top-left.
    pub fn frame(&self) -> Vec<Vec3> {
        self.accum.frame()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Drop all in-flight paths and accumulated samples.
    pub fn reset(&mut self) {
        self.store.reset();
        self.accum.clear();
        self.stats.reset();
        self.iteration = 0;
        tracing::debug!("renderer reset");
    }

    pub fn set_camera(&mut self, camera: Camera) {
        Arc::make_mut(&mut self.scene).camera = camera;
        self.reset();
    }

    /// Replace the parameters. Storage is reallocated when the capacity or
    /// image size changes and the tree is rebuilt when its options change.
    pub fn set_params(&mut self, params: RenderParams) -> Result<()> {
        params.validate()?;
        let old = std::mem::replace(&mut self.params, params);
        if old.capacity != self.params.capacity || old.separate_material_queues != self.params.separate_material_queues {
            self.store = PathTaskStore::new(self.params.capacity);
            self.scheduler = Microkernel::new(self.params.capacity, self.params.separate_material_queues);
        }
        if old.width != self.params.width || old.height != self.params.height {
            self.accum = Accumulator::new(self.params.width, self.params.height);
        }
        if old.build_options() != self.params.build_options() {
            self.rebuild_bvh();
        }
        self.reset();
        Ok(())
    }

    /// Build a fresh tree with the current options and restart accumulation.
    pub fn rebuild_bvh(&mut self) {
        self.bvh = Arc::new(Bvh::build(&self.scene.triangles, &self.params.build_options()));
        self.reset();
    }

    pub fn save_bvh(&self, path: impl AsRef<Path>) -> Result<()> {
        self.bvh.save(path)
    }

    /// Load the tree from the cache at `path`. A missing or stale cache is
    /// replaced by a freshly built tree, which is written back. Returns
    /// `true` when the cached tree was used.
    pub fn load_or_build_bvh(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        match Bvh::load(path, self.scene.triangles.len()) {
            Ok(bvh) => {
                tracing::info!(path = %path.display(), nodes = bvh.nodes().len(), "using cached BVH");
                self.bvh = Arc::new(bvh);
                self.reset();
                Ok(true)
            }
            Err(e) if e.is_stale_cache() || matches!(e, Error::FileNotFound(_)) => {
                tracing::warn!(path = %path.display(), error = %e, "BVH cache rejected, rebuilding");
                self.rebuild_bvh();
                self.bvh.save(path)?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Current phase of every slot.
    pub fn slot_phases(&self) -> Vec<PathPhase> {
        self.store.phases()
    }

    pub fn task(&self, slot: u32) -> PathTask {
        self.store.get(slot)
    }

    /// Classify every slot without running kernels, for inspecting queues.
    pub fn classify(&mut self) -> &WorkQueues {
        self.scheduler.classify(&self.store, &self.scene, self.params.backend);
        self.scheduler.queues()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::{BuildOptions, SplitMode};
    use crate::scene::demo;

    fn params() -> RenderParams {
        RenderParams {
            width: 8,
            height: 8,
            capacity: 64,
            ..Default::default()
        }
    }

    #[test]
    fn test_with_bvh_rejects_foreign_tree() {
        let scene = demo::cornell_box();
        let other = Bvh::build(&scene.triangles[..4], &BuildOptions::default());
        assert!(matches!(
            Renderer::with_bvh(scene, other, params()),
            Err(Error::CacheMismatch { .. })
        ));
    }

    #[test]
    fn test_camera_change_resets() {
        let mut r = Renderer::new(demo::cornell_box(), params()).unwrap();
        r.run(10);
        assert!(r.stats().primary_rays > 0);
        r.set_camera(Camera::look_at(Vec3::new(0.0, 0.5, 3.0), Vec3::ZERO, Vec3::Y, 50.0));
        assert_eq!(r.iteration(), 0);
        assert_eq!(r.stats(), StatsSnapshot::default());
        assert!(r.slot_phases().iter().all(|&p| p == PathPhase::GenerateCameraRay));
    }

    #[test]
    fn test_set_params_rebuilds_tree() {
        let mut r = Renderer::new(demo::cornell_box(), params()).unwrap();
        assert_eq!(r.bvh().split_mode(), SplitMode::Sah);
        let p = RenderParams {
            split_mode: SplitMode::ObjectMedian,
            width: 4,
            capacity: 16,
            ..params()
        };
        r.set_params(p).unwrap();
        assert_eq!(r.bvh().split_mode(), SplitMode::ObjectMedian);
        assert_eq!(r.accumulator().width(), 4);
        assert_eq!(r.slot_phases().len(), 16);
        assert!(r.set_params(RenderParams { capacity: 0, ..params() }).is_err());
    }

    #[test]
    fn test_megakernel_step() {
        let p = RenderParams {
            use_microkernel: false,
            ..params()
        };
        let mut r = Renderer::new(demo::cornell_box(), p).unwrap();
        r.step();
        assert_eq!(r.stats().samples, 64);
        assert!(r.frame().iter().all(|c| c.is_finite() && c.min_element() >= 0.0));
    }
}
