//! Work queues partitioning path slots by the kernel they need next.
//!
//! Every iteration the counters are zeroed, each slot is appended to exactly
//! one queue (atomic increment, then write), and the filled queues are
//! sealed into sorted index lists for dispatch. Sorting makes the dispatch
//! order independent of how classification was scheduled.

use std::sync::atomic::{AtomicU32, Ordering};

use super::task::{PathPhase, PathTask};
use crate::scene::{MaterialClass, Scene};

/// Queue identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueId {
    Raygen,
    Extension,
    Shadow,
    Diffuse,
    Glossy,
    GgxReflect,
    GgxRefract,
    Delta,
    /// All material classes merged, used when per-class queues are off
    Shading,
    HitNothing,
    Splat,
}

/// Fixed per-iteration dispatch order: ray tracing, then material
/// sampling, then splatting and regeneration.
pub const DISPATCH_ORDER: [QueueId; QueueId::COUNT] = [
    QueueId::Extension,
    QueueId::Shadow,
    QueueId::Diffuse,
    QueueId::Glossy,
    QueueId::GgxReflect,
    QueueId::GgxRefract,
    QueueId::Delta,
    QueueId::Shading,
    QueueId::HitNothing,
    QueueId::Splat,
    QueueId::Raygen,
];

impl QueueId {
    pub const COUNT: usize = 11;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn for_material(class: MaterialClass) -> Self {
        match class {
            MaterialClass::Diffuse => QueueId::Diffuse,
            MaterialClass::Glossy => QueueId::Glossy,
            MaterialClass::GgxReflect => QueueId::GgxReflect,
            MaterialClass::GgxRefract => QueueId::GgxRefract,
            MaterialClass::Delta => QueueId::Delta,
        }
    }

    pub fn is_material(self) -> bool {
        matches!(
            self,
            QueueId::Diffuse
                | QueueId::Glossy
                | QueueId::GgxReflect
                | QueueId::GgxRefract
                | QueueId::Delta
                | QueueId::Shading
        )
    }

    /// Queue a task belongs to given its phase and last hit.
    pub fn route(task: &PathTask, scene: &Scene, separate_materials: bool) -> Self {
        match task.phase {
            PathPhase::GenerateCameraRay => QueueId::Raygen,
            PathPhase::RtNextVertex => QueueId::Extension,
            PathPhase::SampleLightImpl => QueueId::Shadow,
            PathPhase::HitNothing => QueueId::HitNothing,
            PathPhase::SplatSample => QueueId::Splat,
            PathPhase::SampleBsdf => match task.hit {
                Some(hit) if separate_materials => Self::for_material(scene.material(hit.material_id).class()),
                Some(_) => QueueId::Shading,
                // A sampling phase without a hit record cannot shade.
                None => QueueId::HitNothing,
            },
        }
    }
}

/// Per-queue counters and entry storage.
pub struct WorkQueues {
    separate_materials: bool,
    counts: [AtomicU32; QueueId::COUNT],
    entries: Vec<Vec<AtomicU32>>,
    sealed: Vec<Vec<u32>>,
}

impl WorkQueues {
    /// Queues for `capacity` slots; each queue can hold every slot.
    pub fn new(capacity: usize, separate_materials: bool) -> Self {
        Self {
            separate_materials,
            counts: std::array::from_fn(|_| AtomicU32::new(0)),
            entries: (0..QueueId::COUNT)
                .map(|_| (0..capacity).map(|_| AtomicU32::new(0)).collect())
                .collect(),
            sealed: vec![Vec::new(); QueueId::COUNT],
        }
    }

    pub fn separate_materials(&self) -> bool {
        self.separate_materials
    }

    /// Zero all counters; called once per iteration before classification.
    pub fn reset(&mut self) {
        for count in &mut self.counts {
            *count.get_mut() = 0;
        }
        for list in &mut self.sealed {
            list.clear();
        }
    }

    /// Append `slot` to `queue`. Safe to call concurrently.
    #[inline]
    pub fn append(&self, queue: QueueId, slot: u32) {
        let q = queue.index();
        let at = self.counts[q].fetch_add(1, Ordering::Relaxed) as usize;
        // Each slot is appended once per iteration, so `at < capacity`.
        debug_assert!(at < self.entries[q].len(), "queue {queue:?} overflow");
        if let Some(entry) = self.entries[q].get(at) {
            entry.store(slot, Ordering::Relaxed);
        }
    }

    /// Route `slot` into its queue and return the queue chosen.
    pub fn classify(&self, slot: u32, task: &PathTask, scene: &Scene) -> QueueId {
        let queue = QueueId::route(task, scene, self.separate_materials);
        self.append(queue, slot);
        queue
    }

    /// Freeze the appended entries into sorted dispatch lists.
    pub fn seal(&mut self) {
        for (q, list) in self.sealed.iter_mut().enumerate() {
            let n = (*self.counts[q].get_mut() as usize).min(self.entries[q].len());
            list.clear();
            list.extend(self.entries[q][..n].iter_mut().map(|e| *e.get_mut()));
            list.sort_unstable();
        }
    }

    /// Slots in `queue`, ascending. Empty until [`WorkQueues::seal`] runs.
    pub fn dispatch(&self, queue: QueueId) -> &[u32] {
        &self.sealed[queue.index()]
    }

    /// Number of entries appended this iteration.
    pub fn len(&self, queue: QueueId) -> usize {
        self.counts[queue.index()].load(Ordering::Relaxed) as usize
    }

    pub fn total(&self) -> usize {
        DISPATCH_ORDER.iter().map(|&q| self.len(q)).sum()
    }

    /// Entries across all material queues (per-class and merged).
    pub fn material_total(&self) -> usize {
        DISPATCH_ORDER.iter().filter(|q| q.is_material()).map(|&q| self.len(q)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Hit;
    use crate::scene::Material;
    use glam::{Vec2, Vec3};
    use rayon::prelude::*;

    fn hit(material_id: u32) -> Hit {
        Hit {
            p: Vec3::ZERO,
            n: Vec3::Z,
            uv: Vec2::ZERO,
            t: 1.0,
            tri: 0,
            material_id,
            area_light_hit: false,
        }
    }

    fn scene() -> Scene {
        Scene::new(
            Vec::new(),
            vec![Material::diffuse(Vec3::ONE), Material::glass(1.5), Material::metal(Vec3::ONE, 10.0)],
        )
    }

    #[test]
    fn test_dispatch_order_covers_all_queues() {
        for (i, q) in DISPATCH_ORDER.iter().enumerate() {
            assert!(q.index() < QueueId::COUNT);
            assert!(!DISPATCH_ORDER[..i].contains(q));
        }
    }

    #[test]
    fn test_route_by_material() {
        let scene = scene();
        let mut task = PathTask {
            phase: PathPhase::SampleBsdf,
            hit: Some(hit(1)),
            ..Default::default()
        };
        assert_eq!(QueueId::route(&task, &scene, true), QueueId::Delta);
        assert_eq!(QueueId::route(&task, &scene, false), QueueId::Shading);
        task.hit = Some(hit(2));
        assert_eq!(QueueId::route(&task, &scene, true), QueueId::GgxReflect);
        task.phase = PathPhase::SampleLightImpl;
        assert_eq!(QueueId::route(&task, &scene, true), QueueId::Shadow);
    }

    #[test]
    fn test_concurrent_append_loses_nothing() {
        let n = 10_000u32;
        let mut queues = WorkQueues::new(n as usize, true);
        (0..n).into_par_iter().for_each(|slot| {
            let q = if slot % 3 == 0 { QueueId::Shadow } else { QueueId::Extension };
            queues.append(q, slot);
        });
        queues.seal();
        assert_eq!(queues.total(), n as usize);

        let mut all: Vec<u32> = DISPATCH_ORDER.iter().flat_map(|&q| queues.dispatch(q).to_vec()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..n).collect::<Vec<_>>());
        assert!(queues.dispatch(QueueId::Shadow).windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_reset_clears_counts() {
        let mut queues = WorkQueues::new(4, false);
        queues.append(QueueId::Raygen, 0);
        queues.seal();
        assert_eq!(queues.dispatch(QueueId::Raygen), &[0]);
        queues.reset();
        assert_eq!(queues.total(), 0);
        assert!(queues.dispatch(QueueId::Raygen).is_empty());
    }
}
