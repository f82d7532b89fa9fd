//! Headless fabric simulation demo
//!
//! Usage: fabric-engine [config.toml]
//! Runs on the first available GPU adapter, or on the CPU reference backend
//! when none is found.

use anyhow::{Context, Result};
use fabric_engine::fabric::BufferRole;
use fabric_engine::{ComputeBackend, CpuBackend, FabricConfig, FabricDemo, GpuContext, GridCell, WgpuBackend};

fn run<B: ComputeBackend>(backend: &B, config: &FabricConfig) -> Result<FabricDemo<B>> {
    let mut demo = FabricDemo::new(backend, config).context("Failed to build fabric simulation")?;
    demo.run(backend, config.demo.frames)
        .context("Fabric simulation failed")?;
    Ok(demo)
}

fn log_surface(cells: &[GridCell]) {
    let (lowest, highest) = cells
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), c| (lo.min(c.y), hi.max(c.y)));
    let mean = cells.iter().map(|c| c.y).sum::<f32>() / cells.len().max(1) as f32;
    log::info!(
        "[main] Surface height: min {:.4}, max {:.4}, mean {:.4}",
        lowest,
        highest,
        mean
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => FabricConfig::load(&path).with_context(|| format!("Failed to load config {}", path))?,
        None => {
            log::info!("[main] No config given, using defaults");
            FabricConfig::default()
        }
    };

    match GpuContext::new_headless_blocking() {
        Ok(context) => {
            let backend = WgpuBackend::from_context(&context);
            let demo = run(&backend, &config)?;
            let cells = backend.read_array(demo.simulation().array(BufferRole::CurrentPosition))?;
            log_surface(&cells);
        }
        Err(e) => {
            log::warn!("[main] GPU unavailable ({}), falling back to CPU reference backend", e);
            let backend = CpuBackend::new();
            let demo = run(&backend, &config)?;
            log_surface(&demo.simulation().array(BufferRole::CurrentPosition).snapshot());
        }
    }

    Ok(())
}
