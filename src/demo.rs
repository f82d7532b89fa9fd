//! Headless frame loop driving one fabric simulation
//!
//! Feeds a fixed frame time, the configured wind and periodic random impulses,
//! submitting one command stream per frame.

use crate::config::{DemoConfig, FabricConfig};
use crate::error::FabricResult;
use crate::fabric::{
    ComputeBackend, DescriptorTable, GridSimulation, KernelKind, SimulationStats, UpdateOutcome, WindController,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct FabricDemo<B: ComputeBackend> {
    simulation: GridSimulation<B>,
    table: DescriptorTable<B::Array>,
    update: B::Kernel,
    disturb: B::Kernel,
    wind: WindController,
    rng: StdRng,
    settings: DemoConfig,
    frame: u32,
}

impl<B: ComputeBackend> FabricDemo<B> {
    pub fn new(backend: &B, config: &FabricConfig) -> FabricResult<Self> {
        config.validate()?;

        let mut recorder = backend.begin_recording("Fabric Init");
        let mut simulation = GridSimulation::new(backend, &mut recorder, &config.descriptor())?;
        backend.submit(recorder)?;
        // Submitted copies keep their sources alive on every backend
        simulation.release_staging();

        let mut table = DescriptorTable::new(GridSimulation::<B>::DESCRIPTOR_COUNT);
        let base = table.allocate(GridSimulation::<B>::DESCRIPTOR_COUNT)?;
        simulation.build_descriptors(&mut table, base)?;

        let update = backend.create_kernel(KernelKind::Update)?;
        let disturb = backend.create_kernel(KernelKind::Disturb)?;

        log::info!(
            "[FabricDemo::new] {}x{} fabric, {} frames of {:.4}s, disturb every {} frames",
            simulation.row_count(),
            simulation.column_count(),
            config.demo.frames,
            config.demo.frame_time,
            config.demo.disturb_every
        );

        Ok(Self {
            simulation,
            table,
            update,
            disturb,
            wind: config.wind_controller(),
            rng: StdRng::seed_from_u64(config.demo.seed),
            settings: config.demo.clone(),
            frame: 0,
        })
    }

    pub fn simulation(&self) -> &GridSimulation<B> {
        &self.simulation
    }

    pub fn table(&self) -> &DescriptorTable<B::Array> {
        &self.table
    }

    pub fn wind(&self) -> &WindController {
        &self.wind
    }

    pub fn wind_mut(&mut self) -> &mut WindController {
        &mut self.wind
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    fn disturb_due(&self) -> bool {
        self.settings.disturb_every > 0 && self.frame % self.settings.disturb_every == 0
    }

    /// Record and submit one frame
    pub fn run_frame(&mut self, backend: &B) -> FabricResult<UpdateOutcome> {
        let mut recorder = backend.begin_recording("Fabric Frame");

        if self.disturb_due() {
            let row = self.rng.gen_range(0..self.simulation.row_count());
            let col = self.rng.gen_range(0..self.simulation.column_count());
            let magnitude = self
                .rng
                .gen_range(self.settings.disturb_magnitude_min..=self.settings.disturb_magnitude_max);
            self.simulation.prepare_disturb_dispatch(
                backend,
                &mut recorder,
                &self.disturb,
                &self.table,
                row,
                col,
                magnitude,
            )?;
        }

        let outcome = self.simulation.prepare_update_dispatch(
            backend,
            &mut recorder,
            &self.update,
            &self.table,
            self.settings.frame_time,
            self.wind.wind(),
        )?;
        // A disturb without a fired update leaves the outputs writable
        self.simulation.prepare_for_consumers(backend, &mut recorder)?;

        backend.submit(recorder)?;
        self.frame += 1;
        Ok(outcome)
    }

    /// Run `frames` frames and return the accumulated counters
    pub fn run(&mut self, backend: &B, frames: u32) -> FabricResult<SimulationStats> {
        for _ in 0..frames {
            self.run_frame(backend)?;
        }

        let stats = self.simulation.stats();
        log::info!(
            "[FabricDemo::run] {} frames: {} updates, {} skipped, {} disturbs, {} transitions",
            self.frame,
            stats.update_dispatches,
            stats.skipped_updates,
            stats.disturb_dispatches,
            stats.transitions
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::{AccessState, BufferRole};
    use crate::reference::CpuBackend;

    fn small_config() -> FabricConfig {
        let mut config = FabricConfig::default();
        config.grid.rows = 16;
        config.grid.cols = 16;
        config.grid.spatial_step = 1.0;
        config.demo.disturb_every = 4;
        config
    }

    #[test]
    fn test_demo_runs_on_cpu() {
        let backend = CpuBackend::new();
        let config = small_config();
        let mut demo = FabricDemo::new(&backend, &config).unwrap();
        let stats = demo.run(&backend, 12).unwrap();

        // 1/60 s frames against a 0.005 s step fire every frame
        assert_eq!(stats.update_dispatches, 12);
        assert_eq!(stats.disturb_dispatches, 3);
        let sim = demo.simulation();
        assert_eq!(
            sim.array(BufferRole::CurrentPosition).state(),
            AccessState::ReadableByConsumer
        );
        assert!(sim
            .array(BufferRole::CurrentPosition)
            .snapshot()
            .iter()
            .any(|c| c.y != 0.0));
    }

    #[test]
    fn test_same_seed_same_surface() {
        let config = small_config();
        let run = || {
            let backend = CpuBackend::new();
            let mut demo = FabricDemo::new(&backend, &config).unwrap();
            demo.run(&backend, 8).unwrap();
            demo.simulation().array(BufferRole::CurrentPosition).snapshot()
        };
        assert_eq!(run(), run());
    }
}
