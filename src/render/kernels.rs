//! Phase kernels. Each one advances a single path by exactly one phase.
//!
//! Kernels only read shared data (scene, tree, parameters) and mutate the
//! task they are handed, so any two slots can run them concurrently. The
//! splat kernel is the exception: it writes the accumulator and is always
//! run on one thread in slot order.

use glam::Vec3;

use super::accum::{Accumulator, RenderStats};
use super::bsdf::Bsdf;
use super::params::RenderParams;
use super::queues::QueueId;
use super::rng::Rng;
use super::task::{PathPhase, PathTask};
use crate::bvh::Bvh;
use crate::geom::Ray;
use crate::scene::{intersect_area_lights, Light, Scene};
use crate::util::{luminance, power_heuristic, sanitize};

/// Minimum survival probability for Russian roulette.
const MIN_SURVIVAL: f32 = 0.05;

/// Shadow rays stop this fraction short of the light sample.
const SHADOW_SHORTEN: f32 = 1e-3;

/// Read-only inputs shared by every kernel invocation of an iteration.
#[derive(Clone, Copy)]
pub struct KernelContext<'a> {
    pub scene: &'a Scene,
    pub bvh: &'a Bvh,
    pub params: &'a RenderParams,
    pub stats: &'a RenderStats,
    /// Number of slots in the task store
    pub capacity: usize,
    /// Radiance of escaped rays
    pub environment: Vec3,
    /// Number of lights open to next-event estimation
    pub active_lights: usize,
}

impl<'a> KernelContext<'a> {
    pub fn new(scene: &'a Scene, bvh: &'a Bvh, params: &'a RenderParams, stats: &'a RenderStats, capacity: usize) -> Self {
        Self {
            scene,
            bvh,
            params,
            stats,
            capacity,
            environment: params.environment(scene.background),
            active_lights: scene.lights.iter().filter(|l| light_enabled(params, l)).count(),
        }
    }

    /// Lights taking part in this render, in scene order.
    pub fn lights(&self) -> impl Iterator<Item = &'a Light> + 'a {
        let params = self.params;
        self.scene.lights.iter().filter(move |l| light_enabled(params, l))
    }
}

fn light_enabled(params: &RenderParams, light: &Light) -> bool {
    params.use_area_light || !matches!(light, Light::Area(_))
}

/// Run the kernel serving `queue`. The splat queue is handled by [`splat`].
pub fn run_queue(queue: QueueId, ctx: &KernelContext<'_>, slot: u32, task: &mut PathTask) {
    match queue {
        QueueId::Raygen => generate_camera_ray(ctx, slot, task),
        QueueId::Extension => extend(ctx, task),
        QueueId::Shadow => trace_shadow(ctx, task),
        QueueId::HitNothing => hit_nothing(ctx, task),
        QueueId::Splat => {}
        QueueId::Diffuse
        | QueueId::Glossy
        | QueueId::GgxReflect
        | QueueId::GgxRefract
        | QueueId::Delta
        | QueueId::Shading => sample_bsdf(ctx, task),
    }
}

/// Run the kernel for the task's current phase. Returns `false` when the
/// task waits in `SplatSample`, which needs the accumulator.
pub fn advance(ctx: &KernelContext<'_>, slot: u32, task: &mut PathTask) -> bool {
    match task.phase {
        PathPhase::GenerateCameraRay => generate_camera_ray(ctx, slot, task),
        PathPhase::RtNextVertex => extend(ctx, task),
        PathPhase::SampleBsdf => sample_bsdf(ctx, task),
        PathPhase::SampleLightImpl => trace_shadow(ctx, task),
        PathPhase::HitNothing => hit_nothing(ctx, task),
        PathPhase::SplatSample => return false,
    }
    true
}

/// Slot `slot` starts its next path on pixel
/// `(slot + sample * capacity) % pixels`.
pub fn generate_camera_ray(ctx: &KernelContext<'_>, slot: u32, task: &mut PathTask) {
    let params = ctx.params;
    let num_pixels = params.num_pixels() as u64;
    let pixel = ((slot as u64 + task.sample as u64 * ctx.capacity as u64) % num_pixels) as u32;
    let (x, y) = (pixel % params.width, pixel / params.width);

    let mut rng = Rng::for_slot(params.seed, slot, task.sample);
    let jitter = rng.next_vec2();
    let lens = rng.next_vec2();
    let ray = ctx.scene.camera.generate_ray(x, y, params.width, params.height, jitter, lens);
    task.respawn(ray, pixel, rng);
    ctx.stats.add_primary();
}

/// Trace the extension ray and record the nearest surface.
pub fn extend(ctx: &KernelContext<'_>, task: &mut PathTask) {
    if task.depth > 0 {
        ctx.stats.add_extension();
    }
    let scene = ctx.scene;
    let hit = ctx.bvh.intersect_nearest(&task.ray, &scene.triangles, f32::INFINITY);
    let t_max = hit.map_or(f32::INFINITY, |h| h.t);

    let light_hit = if ctx.params.use_area_light {
        intersect_area_lights(&scene.lights, &task.ray, t_max)
    } else {
        None
    };
    if let Some((index, light_hit)) = light_hit {
        if let Light::Area(area) = &scene.lights[index] {
            let pick_prob = 1.0 / ctx.active_lights.max(1) as f32;
            let light_pdf = area.pdf_w(task.ray.dir, light_hit.t) * pick_prob;
            let weight = implicit_weight(ctx.params, task, light_pdf);
            task.radiance += sanitize(task.throughput * area.emission * weight);
        }
        task.hit = Some(light_hit);
        task.terminated = true;
        task.phase = PathPhase::SplatSample;
        return;
    }

    match hit {
        Some(hit) => {
            task.backface_hit = hit.n.dot(task.ray.dir) > 0.0;
            task.hit = Some(hit);
            task.phase = PathPhase::SampleBsdf;
        }
        None => {
            task.hit = None;
            task.phase = PathPhase::HitNothing;
        }
    }
}

/// Shade a surface hit: emission, light selection for next-event
/// estimation, BSDF sampling and Russian roulette.
pub fn sample_bsdf(ctx: &KernelContext<'_>, task: &mut PathTask) {
    let Some(hit) = task.hit else {
        task.terminated = true;
        task.phase = PathPhase::SplatSample;
        return;
    };
    let scene = ctx.scene;
    let params = ctx.params;
    let material = scene.material(hit.material_id);
    let wo = -task.ray.dir;

    // Emissive triangles are only found by BSDF sampling.
    if material.is_emissive() && !task.backface_hit && (task.depth == 0 || task.last_specular || params.sample_implicit) {
        task.radiance += sanitize(task.throughput * material.ke);
    }

    let (kd, ks) = scene.reflectance(material, hit.uv);
    let shading_n = scene.shading_normal(material, &hit);
    let bsdf = Bsdf::new(material, kd, ks, shading_n, wo);
    task.shadow_pending = false;
    task.pending_radiance = Vec3::ZERO;

    if params.sample_explicit && !bsdf.is_delta() && ctx.active_lights > 0 {
        sample_light(ctx, task, &bsdf, hit.p, hit.n, wo);
    }

    if task.depth >= params.max_bounces {
        task.terminated = true;
    } else {
        let u = task.rng.next_vec2();
        let u_lobe = task.rng.next_f32();
        match bsdf.sample(wo, u, u_lobe) {
            Some(s) if s.pdf > 0.0 && s.weight.max_element() > 0.0 => {
                let mut throughput = sanitize(task.throughput * s.weight);
                if params.use_roulette {
                    let survive = luminance(throughput).clamp(MIN_SURVIVAL, 1.0);
                    if task.rng.next_f32() >= survive {
                        task.terminated = true;
                    } else {
                        throughput /= survive;
                    }
                }
                if !task.terminated {
                    task.throughput = throughput;
                    task.ray = Ray::spawn(hit.p, hit.n, s.wi);
                    task.last_pdf_w = s.pdf;
                    task.last_specular = s.specular;
                    task.depth += 1;
                }
            }
            _ => task.terminated = true,
        }
    }

    task.phase = if task.shadow_pending || !task.terminated {
        PathPhase::SampleLightImpl
    } else {
        PathPhase::SplatSample
    };
}

/// Pick a light uniformly, sample it and stage the MIS-weighted
/// contribution behind a shadow ray.
fn sample_light(ctx: &KernelContext<'_>, task: &mut PathTask, bsdf: &Bsdf, p: Vec3, n: Vec3, wo: Vec3) {
    let count = ctx.active_lights;
    let pick = ((task.rng.next_f32() * count as f32) as usize).min(count - 1);
    let pick_prob = 1.0 / count as f32;
    let u = task.rng.next_vec2();

    let Some(light) = ctx.lights().nth(pick) else {
        return;
    };
    let Some(ls) = light.sample(p, u) else {
        return;
    };
    let Some((f_cos, bsdf_pdf)) = bsdf.eval(wo, ls.wi) else {
        return;
    };
    let weight = if light.is_delta() || !ctx.params.sample_implicit {
        1.0
    } else {
        power_heuristic(ls.pdf_w * pick_prob, bsdf_pdf)
    };
    let contribution = sanitize(task.throughput * f_cos * ls.weight * (weight / pick_prob));
    if contribution.max_element() <= 0.0 {
        return;
    }

    task.last_pdf_direct = ls.pdf_w;
    task.last_pdf_implicit = bsdf_pdf;
    task.last_light_pick_prob = pick_prob;
    task.queue_shadow(Ray::spawn(p, n, ls.wi), ls.dist * (1.0 - SHADOW_SHORTEN), contribution);
}

/// Resolve the pending shadow ray, then continue or finish the path.
pub fn trace_shadow(ctx: &KernelContext<'_>, task: &mut PathTask) {
    if task.shadow_pending {
        ctx.stats.add_shadow();
        task.shadow_blocked = ctx.bvh.intersect_any(&task.shadow_ray, &ctx.scene.triangles, task.shadow_dist);
        if !task.shadow_blocked {
            task.radiance += task.pending_radiance;
        }
        task.pending_radiance = Vec3::ZERO;
        task.shadow_pending = false;
    }
    task.phase = if task.terminated {
        PathPhase::SplatSample
    } else {
        PathPhase::RtNextVertex
    };
}

/// Escaped ray: add the environment and finish.
pub fn hit_nothing(ctx: &KernelContext<'_>, task: &mut PathTask) {
    if task.depth == 0 || task.last_specular || ctx.params.sample_implicit {
        task.radiance += sanitize(task.throughput * ctx.environment);
    }
    task.terminated = true;
    task.phase = PathPhase::SplatSample;
}

/// Flush the path's radiance to its pixel and free the slot.
pub fn splat(accum: &mut Accumulator, stats: &RenderStats, task: &mut PathTask) {
    accum.splat(task.pixel, task.radiance);
    stats.add_samples(1);
    task.phase = PathPhase::GenerateCameraRay;
}

/// MIS weight of emission found by a BSDF-sampled ray, against the light
/// sampling density `light_pdf` (pick probability included).
fn implicit_weight(params: &RenderParams, task: &PathTask, light_pdf: f32) -> f32 {
    // Camera rays and specular bounces cannot be matched by light sampling.
    if task.depth == 0 || task.last_specular {
        return 1.0;
    }
    if !params.sample_implicit {
        return 0.0;
    }
    if !params.sample_explicit {
        return 1.0;
    }
    power_heuristic(task.last_pdf_w, light_pdf)
}
