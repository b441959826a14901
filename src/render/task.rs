//! Path task store: one record per in-flight path.
//!
//! Records are stored array-of-structures. Each slot sits behind its own
//! `parking_lot::Mutex`; queue partitioning guarantees at most one kernel
//! touches a slot per iteration, so the locks are never contended.

use glam::Vec3;
use parking_lot::{Mutex, MutexGuard};

use super::rng::Rng;
use crate::geom::{Hit, Ray};

/// Phase tag of a path. Exactly one is active per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PathPhase {
    /// Slot is free; a camera ray is generated next
    #[default]
    GenerateCameraRay,
    /// Extension ray is pending
    RtNextVertex,
    /// Surface hit, material sampling and light selection pending
    SampleBsdf,
    /// Shadow ray for next-event estimation is pending
    SampleLightImpl,
    /// Extension ray left the scene
    HitNothing,
    /// Path finished; radiance is flushed to its pixel next
    SplatSample,
}

impl PathPhase {
    pub const ALL: [PathPhase; 6] = [
        PathPhase::GenerateCameraRay,
        PathPhase::RtNextVertex,
        PathPhase::SampleBsdf,
        PathPhase::SampleLightImpl,
        PathPhase::HitNothing,
        PathPhase::SplatSample,
    ];

    /// Phases a slot may move to from `self` in one kernel invocation.
    pub fn successors(self) -> &'static [PathPhase] {
        use PathPhase::*;
        match self {
            GenerateCameraRay => &[RtNextVertex],
            // Area-light hits short-circuit straight to the splat.
            RtNextVertex => &[HitNothing, SampleBsdf, SplatSample],
            SampleBsdf => &[SampleLightImpl, SplatSample],
            SampleLightImpl => &[RtNextVertex, SplatSample],
            HitNothing => &[SplatSample],
            SplatSample => &[GenerateCameraRay],
        }
    }

    pub fn can_transition_to(self, next: PathPhase) -> bool {
        self.successors().contains(&next)
    }
}

/// State of one path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathTask {
    pub phase: PathPhase,
    /// Current extension segment
    pub ray: Ray,
    /// Pending shadow segment and its length
    pub shadow_ray: Ray,
    pub shadow_dist: f32,
    pub throughput: Vec3,
    /// Radiance gathered so far
    pub radiance: Vec3,
    /// Next-event contribution, added once the shadow ray is unblocked
    pub pending_radiance: Vec3,
    pub hit: Option<Hit>,
    /// Number of scattering events so far
    pub depth: u32,
    pub rng: Rng,
    pub pixel: u32,
    /// Number of paths this slot has started
    pub sample: u32,

    // Flags
    pub shadow_pending: bool,
    pub shadow_blocked: bool,
    pub backface_hit: bool,
    pub last_specular: bool,
    pub terminated: bool,

    // MIS bookkeeping
    /// Solid-angle pdf of the last BSDF-sampled direction
    pub last_pdf_w: f32,
    /// Light pdf of the last next-event sample
    pub last_pdf_direct: f32,
    /// BSDF pdf of the last next-event direction
    pub last_pdf_implicit: f32,
    pub last_light_pick_prob: f32,
}

impl Default for PathTask {
    fn default() -> Self {
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        Self {
            phase: PathPhase::GenerateCameraRay,
            ray,
            shadow_ray: ray,
            shadow_dist: 0.0,
            throughput: Vec3::ONE,
            radiance: Vec3::ZERO,
            pending_radiance: Vec3::ZERO,
            hit: None,
            depth: 0,
            rng: Rng::new(0),
            pixel: 0,
            sample: 0,
            shadow_pending: false,
            shadow_blocked: false,
            backface_hit: false,
            last_specular: false,
            terminated: false,
            last_pdf_w: 0.0,
            last_pdf_direct: 0.0,
            last_pdf_implicit: 0.0,
            last_light_pick_prob: 0.0,
        }
    }
}

impl PathTask {
    /// Start a fresh path on `ray`, keeping the slot's sample counter.
    pub fn respawn(&mut self, ray: Ray, pixel: u32, rng: Rng) {
        *self = Self {
            phase: PathPhase::RtNextVertex,
            ray,
            pixel,
            rng,
            sample: self.sample + 1,
            ..Default::default()
        };
    }

    /// Queue a next-event shadow test carrying `contribution`.
    pub fn queue_shadow(&mut self, ray: Ray, dist: f32, contribution: Vec3) {
        self.shadow_ray = ray;
        self.shadow_dist = dist;
        self.pending_radiance = contribution;
        self.shadow_pending = true;
        self.shadow_blocked = false;
    }
}

/// Fixed-capacity store of path tasks indexed by slot id.
pub struct PathTaskStore {
    slots: Vec<Mutex<PathTask>>,
}

impl PathTaskStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Mutex::new(PathTask::default())).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn lock(&self, slot: u32) -> MutexGuard<'_, PathTask> {
        self.slots[slot as usize].lock()
    }

    /// Copy of a slot's state.
    pub fn get(&self, slot: u32) -> PathTask {
        *self.lock(slot)
    }

    pub fn phases(&self) -> Vec<PathPhase> {
        self.slots.iter().map(|s| s.lock().phase).collect()
    }

    /// Return every slot to `GenerateCameraRay` and forget sample counters.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot.get_mut() = PathTask::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_phase_reaches_splat() {
        // Walking successors from any phase reaches SplatSample, and the
        // only way back to GenerateCameraRay goes through it.
        for start in PathPhase::ALL {
            let mut seen = vec![start];
            let mut frontier = vec![start];
            while let Some(p) = frontier.pop() {
                for &n in p.successors() {
                    if !seen.contains(&n) {
                        seen.push(n);
                        frontier.push(n);
                    }
                }
            }
            assert!(seen.contains(&PathPhase::SplatSample));
        }
        for p in PathPhase::ALL {
            if p.can_transition_to(PathPhase::GenerateCameraRay) {
                assert_eq!(p, PathPhase::SplatSample);
            }
        }
    }

    #[test]
    fn test_respawn_resets_path_state() {
        let mut task = PathTask {
            throughput: Vec3::splat(0.1),
            radiance: Vec3::ONE,
            depth: 4,
            terminated: true,
            sample: 2,
            ..Default::default()
        };
        task.respawn(Ray::new(Vec3::ZERO, -Vec3::Z), 17, Rng::new(1));
        assert_eq!(task.phase, PathPhase::RtNextVertex);
        assert_eq!(task.throughput, Vec3::ONE);
        assert_eq!(task.radiance, Vec3::ZERO);
        assert_eq!(task.depth, 0);
        assert!(!task.terminated);
        assert_eq!(task.sample, 3);
        assert_eq!(task.pixel, 17);
    }

    #[test]
    fn test_store_reset() {
        let mut store = PathTaskStore::new(4);
        store.lock(2).phase = PathPhase::SampleBsdf;
        assert_eq!(store.phases()[2], PathPhase::SampleBsdf);
        store.reset();
        assert!(store.phases().iter().all(|&p| p == PathPhase::GenerateCameraRay));
        assert_eq!(store.capacity(), 4);
    }
}
