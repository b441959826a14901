//! Radiance accumulation buffer and renderer statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec3;

use crate::util::sanitize;

/// Per-pixel radiance sums. Filled by the deferred splat reduction, which
/// runs in slot order on one thread.
#[derive(Debug, Clone)]
pub struct Accumulator {
    width: u32,
    height: u32,
    sum: Vec<Vec3>,
    count: Vec<u32>,
}

impl Accumulator {
    pub fn new(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            sum: vec![Vec3::ZERO; n],
            count: vec![0; n],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.sum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sum.is_empty()
    }

    /// Add one path sample; non-finite or negative components count as zero.
    pub fn splat(&mut self, pixel: u32, radiance: Vec3) {
        let i = pixel as usize;
        if i < self.sum.len() {
            self.sum[i] += sanitize(radiance);
            self.count[i] += 1;
        }
    }

    pub fn clear(&mut self) {
        self.sum.fill(Vec3::ZERO);
        self.count.fill(0);
    }

    /// Samples gathered by `pixel`.
    pub fn samples(&self, pixel: u32) -> u32 {
        self.count.get(pixel as usize).copied().unwrap_or(0)
    }

    /// Mean radiance per pixel, row-major from the top-left. Pixels without
    /// samples are black.
    pub fn frame(&self) -> Vec<Vec3> {
        self.sum
            .iter()
            .zip(&self.count)
            .map(|(&s, &c)| if c == 0 { Vec3::ZERO } else { s / c as f32 })
            .collect()
    }

    /// Flattened RGB `f32` buffer for image writers and display layers.
    pub fn frame_rgb(&self) -> Vec<f32> {
        self.frame().iter().flat_map(|c| c.to_array()).collect()
    }
}

/// Ray and sample counters, updated concurrently by the kernels.
#[derive(Debug, Default)]
pub struct RenderStats {
    primary_rays: AtomicU64,
    extension_rays: AtomicU64,
    shadow_rays: AtomicU64,
    samples: AtomicU64,
    iterations: AtomicU64,
}

/// Point-in-time copy of [`RenderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    pub primary_rays: u64,
    pub extension_rays: u64,
    pub shadow_rays: u64,
    pub samples: u64,
    pub iterations: u64,
}

impl RenderStats {
    #[inline]
    pub fn add_primary(&self) {
        self.primary_rays.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_extension(&self) {
        self.extension_rays.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_shadow(&self) {
        self.shadow_rays.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_samples(&self, n: u64) {
        self.samples.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            primary_rays: self.primary_rays.load(Ordering::Relaxed),
            extension_rays: self.extension_rays.load(Ordering::Relaxed),
            shadow_rays: self.shadow_rays.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.primary_rays,
            &self.extension_rays,
            &self.shadow_rays,
            &self.samples,
            &self.iterations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} iterations, {} samples, rays: {} primary / {} extension / {} shadow",
            self.iterations, self.samples, self.primary_rays, self.extension_rays, self.shadow_rays
        )
    }
}
