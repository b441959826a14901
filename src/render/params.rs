//! Render parameters (configuration surface of the renderer)

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::bvh::{BuildOptions, SplitMode, MAX_LEAF_PRIMS};
use crate::util::{Error, Result};

/// Execution backend for classification and kernel dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// Single-threaded reference backend
    Sequential,
    /// Data-parallel over slots via rayon
    #[default]
    Parallel,
}

impl std::str::FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "seq" | "sequential" | "single" => Ok(Backend::Sequential),
            "par" | "parallel" | "rayon" => Ok(Backend::Parallel),
            other => Err(Error::InvalidParams(format!("unknown backend '{other}'"))),
        }
    }
}

/// Parameters read by the renderer; changing any of them requires a reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    // Output
    pub width: u32,
    pub height: u32,

    // Light transport
    pub max_bounces: u32,
    /// Add emission found by BSDF-sampled rays
    pub sample_implicit: bool,
    /// Next-event estimation with shadow rays
    pub sample_explicit: bool,
    pub use_roulette: bool,
    /// Area lights take part in light sampling and extension-ray hits
    pub use_area_light: bool,

    // Environment
    pub use_environment: bool,
    pub environment_color: Vec3,
    pub environment_strength: f32,

    // Scheduling
    /// Wavefront scheduling; `false` runs every slot to completion per step
    pub use_microkernel: bool,
    /// One queue per material class instead of a merged shading queue
    pub separate_material_queues: bool,
    pub backend: Backend,
    /// Number of in-flight path slots
    pub capacity: usize,
    pub seed: u32,

    // Acceleration structure
    pub split_mode: SplitMode,
    pub max_leaf_size: u32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            max_bounces: 5,
            sample_implicit: true,
            sample_explicit: true,
            use_roulette: true,
            use_area_light: true,
            use_environment: true,
            environment_color: Vec3::ONE,
            environment_strength: 0.0,
            use_microkernel: true,
            separate_material_queues: true,
            backend: Backend::Parallel,
            capacity: 1 << 14,
            seed: 0x5eed,
            split_mode: SplitMode::Sah,
            max_leaf_size: 4,
        }
    }
}

impl RenderParams {
    /// Load parameters from a JSON file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let params: Self = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }

    /// Save parameters as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidParams(format!(
                "image size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.capacity == 0 {
            return Err(Error::InvalidParams("task capacity must be positive".into()));
        }
        if self.capacity > u32::MAX as usize {
            return Err(Error::InvalidParams(format!("task capacity {} too large", self.capacity)));
        }
        if self.max_leaf_size == 0 || self.max_leaf_size > MAX_LEAF_PRIMS {
            return Err(Error::InvalidParams(format!(
                "max leaf size {} outside 1..={MAX_LEAF_PRIMS}",
                self.max_leaf_size
            )));
        }
        if !self.environment_strength.is_finite() || self.environment_strength < 0.0 {
            return Err(Error::InvalidParams("environment strength must be finite and non-negative".into()));
        }
        Ok(())
    }

    pub fn num_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Radiance returned by escaped rays; `scene_background` is used when the
    /// environment is disabled.
    pub fn environment(&self, scene_background: Vec3) -> Vec3 {
        if self.use_environment && self.environment_strength > 0.0 {
            self.environment_color * self.environment_strength
        } else {
            scene_background
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            split: self.split_mode,
            max_leaf_size: self.max_leaf_size,
        }
    }
}
