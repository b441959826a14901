//! wavetrace CLI - headless rendering and BVH inspection.

use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use wavetrace::prelude::*;

/// Verbosity level selected on the command line
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Verbosity {
    Quiet,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    fn directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut verbosity = Verbosity::Info;
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => verbosity = Verbosity::Debug,
            "-vv" | "--trace" => verbosity = Verbosity::Trace,
            "-q" | "--quiet" => verbosity = Verbosity::Quiet,
            _ => filtered_args.push(arg),
        }
    }

    let _trace_guard = init_tracing(verbosity);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "render" | "r" => cmd_render(&filtered_args[1..]),
        "bvh" | "b" => cmd_bvh(&filtered_args[1..]),
        "params" | "p" => cmd_params(&filtered_args[1..]),
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// fmt subscriber filtered by `RUST_LOG` or the verbosity flags, plus a
/// chrome trace writer when `WAVETRACE_TRACE=1`.
fn init_tracing(verbosity: Verbosity) -> Option<tracing_chrome::FlushGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr);

    if env::var("WAVETRACE_TRACE").ok().as_deref() == Some("1") {
        let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new().file("trace.json").build();
        let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer).with(chrome_layer);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            return None;
        }
        return Some(guard);
    }

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
    None
}

fn print_help() {
    println!(
        "wavetrace {} (built {} {}) - wavefront path tracer",
        env!("CARGO_PKG_VERSION"),
        wavetrace::BUILD_DATE,
        wavetrace::BUILD_TIME
    );
    println!();
    println!("USAGE:");
    println!("    wavetrace-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    r, render [flags]   Render a built-in scene to a Radiance HDR image");
    println!("    b, bvh    [flags]   Build a BVH, print statistics, optionally save it");
    println!("    p, params [file]    Print default render parameters (or write them to file)");
    println!("    h, help             Show this help");
    println!();
    println!("RENDER FLAGS:");
    println!("    --scene <cornell|triangle|empty>   Scene to render (default cornell)");
    println!("    --params <file.json>               Load render parameters");
    println!("    --iterations <n>                   Scheduler iterations (default 400)");
    println!("    --out <file.hdr>                   Output image (default render.hdr)");
    println!("    --backend <seq|par>                Execution backend");
    println!("    --megakernel                       Run whole paths per iteration");
    println!("    --bvh-cache <file>                 Load the tree from cache, rebuilding if stale");
    println!();
    println!("BVH FLAGS:");
    println!("    --scene <name>  --split <sah|median|spatial>  --leaf <n>  --save <file>  --load <file>");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose       Debug output");
    println!("    -vv, --trace        Trace output");
    println!("    -q, --quiet         Errors only");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG            Overrides the verbosity flags");
    println!("    WAVETRACE_TRACE=1   Write a chrome trace to trace.json");
}

/// Value following `flag`, if present.
fn flag_value<'a>(args: &[&'a str], flag: &str) -> Option<&'a str> {
    args.iter().position(|&a| a == flag).and_then(|i| args.get(i + 1).copied())
}

fn has_flag(args: &[&str], flag: &str) -> bool {
    args.iter().any(|&a| a == flag)
}

fn load_scene(name: &str) -> Result<Scene> {
    match name {
        "cornell" | "box" => Ok(demo::cornell_box()),
        "triangle" | "tri" => Ok(demo::single_triangle(
            glam::Vec3::splat(0.8),
            glam::Vec3::new(0.0, 0.0, 2.0),
            glam::Vec3::splat(4.0),
        )),
        "empty" => Ok(demo::empty(glam::Vec3::new(0.2, 0.3, 0.5))),
        other => bail!("unknown scene '{}'", other),
    }
}

fn cmd_render(args: &[&str]) -> Result<()> {
    let scene = load_scene(flag_value(args, "--scene").unwrap_or("cornell"))?;

    let mut params = match flag_value(args, "--params") {
        Some(path) => RenderParams::load(path).with_context(|| format!("loading {}", path))?,
        None => RenderParams::default(),
    };
    if let Some(backend) = flag_value(args, "--backend") {
        params.backend = backend.parse()?;
    }
    if has_flag(args, "--megakernel") {
        params.use_microkernel = false;
    }
    let iterations: usize = match flag_value(args, "--iterations") {
        Some(n) => n.parse().with_context(|| format!("bad iteration count '{}'", n))?,
        None => 400,
    };
    let out = PathBuf::from(flag_value(args, "--out").unwrap_or("render.hdr"));

    let mut renderer = Renderer::new(scene, params)?;
    if let Some(cache) = flag_value(args, "--bvh-cache") {
        let cached = renderer.load_or_build_bvh(cache)?;
        tracing::info!(cache, cached, "BVH ready");
    }

    let start = Instant::now();
    renderer.run(iterations);
    let elapsed = start.elapsed();
    let stats = renderer.stats();
    tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "render finished");
    println!("{}", stats);
    println!(
        "{:.2} Mrays/s",
        (stats.primary_rays + stats.extension_rays + stats.shadow_rays) as f64 / elapsed.as_secs_f64().max(1e-9) / 1e6
    );

    write_hdr(&out, renderer.params(), &renderer.frame())?;
    println!("Wrote {}", out.display());
    Ok(())
}

fn write_hdr(path: &Path, params: &RenderParams, frame: &[glam::Vec3]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let pixels: Vec<image::Rgb<f32>> = frame.iter().map(|c| image::Rgb(c.to_array())).collect();
    image::codecs::hdr::HdrEncoder::new(BufWriter::new(file))
        .encode(&pixels, params.width as usize, params.height as usize)
        .with_context(|| format!("encoding {}", path.display()))?;
    Ok(())
}

fn cmd_bvh(args: &[&str]) -> Result<()> {
    let scene = load_scene(flag_value(args, "--scene").unwrap_or("cornell"))?;

    let bvh = if let Some(path) = flag_value(args, "--load") {
        Bvh::load(path, scene.triangles.len()).with_context(|| format!("loading {}", path))?
    } else {
        let mut options = BuildOptions::default();
        if let Some(split) = flag_value(args, "--split") {
            options.split = split.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(leaf) = flag_value(args, "--leaf") {
            options.max_leaf_size = leaf.parse().with_context(|| format!("bad leaf size '{}'", leaf))?;
        }
        let start = Instant::now();
        let bvh = Bvh::build(&scene.triangles, &options);
        println!("Built in {:.3} ms", start.elapsed().as_secs_f64() * 1000.0);
        bvh
    };
    bvh.validate()?;

    let stats = bvh.stats();
    println!("Triangles:     {}", bvh.triangle_count());
    println!("Split mode:    {:?}", bvh.split_mode());
    println!("Nodes:         {}", stats.nodes);
    println!("Leaves:        {}", stats.leaves);
    println!("Max depth:     {}", stats.max_depth);
    println!("Max leaf size: {}", stats.max_leaf_size);
    println!("Avg leaf size: {:.2}", stats.avg_leaf_size);

    if let Some(path) = flag_value(args, "--save") {
        bvh.save(path).with_context(|| format!("saving {}", path))?;
        println!("Saved {}", path);
    }
    Ok(())
}

fn cmd_params(args: &[&str]) -> Result<()> {
    let params = RenderParams::default();
    match args.first() {
        Some(path) => {
            params.save(path)?;
            println!("Wrote {}", path);
        }
        None => println!("{}", serde_json::to_string_pretty(&params)?),
    }
    Ok(())
}
