use crate::constants::dispatch::DISTURB_GROUPS;
use crate::constants::layout::{ARRAY_COUNT, DESCRIPTOR_COUNT};
use crate::error::{FabricError, FabricResult};
use crate::fabric::{
    AccessState, ArrayDescriptor, ArrayView, ArrayViewSlots, BufferRole, Coefficients, ComputeBackend,
    DescriptorTable, FabricGrid, KernelBindings, KernelHandle, KernelKind, RoleTable, SimulationConstants,
    TimeAccumulator, Transition, ViewAccess, ViewSlot,
};
use glam::Vec3;

/// Everything needed to build a [`GridSimulation`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FabricDescriptor {
    pub rows: u32,
    pub cols: u32,
    pub spatial_step: f32,
    pub time_step: f32,
    pub coefficients: Coefficients,
}

impl Default for FabricDescriptor {
    fn default() -> Self {
        use crate::constants::defaults;
        Self {
            rows: defaults::ROWS,
            cols: defaults::COLS,
            spatial_step: defaults::SPATIAL_STEP,
            time_step: defaults::TIME_STEP,
            coefficients: Coefficients::default(),
        }
    }
}

/// Result of one frame tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Not enough time accumulated; nothing was recorded
    Skipped,
    /// One update step was recorded and the roles rotated
    Dispatched,
}

/// Counters for logging and assertions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub update_dispatches: u64,
    pub skipped_updates: u64,
    pub disturb_dispatches: u64,
    pub transitions: u64,
}

/// GPU-resident fabric simulation over an m×n grid.
///
/// Three arrays live in a fixed arena indexed by physical slot. Their tracked
/// access state and registered views are stored per slot too, so rotating the
/// [`RoleTable`] moves array, views and state together.
pub struct GridSimulation<B: ComputeBackend> {
    grid: FabricGrid,
    coefficients: Coefficients,
    accumulator: TimeAccumulator,
    wind: Vec3,

    arrays: [B::Array; ARRAY_COUNT],
    labels: [String; ARRAY_COUNT],
    states: [AccessState; ARRAY_COUNT],
    views: Option<[ArrayViewSlots; ARRAY_COUNT]>,
    roles: RoleTable,

    // Kept alive until the seeding copies have executed
    staging: Vec<B::Staging>,

    stats: SimulationStats,
}

impl<B: ComputeBackend> GridSimulation<B> {
    /// View slots the host must provide to [`Self::build_descriptors`]
    pub const DESCRIPTOR_COUNT: u32 = DESCRIPTOR_COUNT;

    /// Allocate the three arrays and record their seeding uploads.
    ///
    /// Previous and current position start as the flat grid, velocity as zero.
    /// On return previous is writable by compute, the other two readable.
    pub fn new(backend: &B, recorder: &mut B::Recorder, desc: &FabricDescriptor) -> FabricResult<Self> {
        let grid = FabricGrid::new(desc.rows, desc.cols, desc.spatial_step)?;
        desc.coefficients.validate()?;
        let accumulator = TimeAccumulator::new(desc.time_step)?;

        log::info!(
            "[GridSimulation::new] Building {}x{} fabric (dx={}, dt={}, k={:?})",
            grid.rows(),
            grid.cols(),
            grid.spatial_step(),
            desc.time_step,
            desc.coefficients
        );

        // Labels name the physical array; its role changes every update
        let labels = [0, 1, 2].map(|slot| format!("Fabric array {}", slot));
        let previous = backend.create_array(&ArrayDescriptor::new(labels[0].clone(), &grid))?;
        let current = backend.create_array(&ArrayDescriptor::new(labels[1].clone(), &grid))?;
        let velocity = backend.create_array(&ArrayDescriptor::new(labels[2].clone(), &grid))?;

        let positions = grid.flat_positions();
        let velocities = grid.zero_cells();
        let staging = vec![
            backend.create_staging("Fabric array 0 staging", &positions)?,
            backend.create_staging("Fabric array 1 staging", &positions)?,
            backend.create_staging("Fabric array 2 staging", &velocities)?,
        ];

        let mut sim = Self {
            grid,
            coefficients: desc.coefficients,
            accumulator,
            wind: Vec3::ZERO,
            arrays: [previous, current, velocity],
            labels,
            states: [AccessState::Undefined; ARRAY_COUNT],
            views: None,
            roles: RoleTable::identity(),
            staging,
            stats: SimulationStats::default(),
        };

        let steady = [
            AccessState::WritableByCompute,
            AccessState::ReadableByConsumer,
            AccessState::ReadableByConsumer,
        ];
        for role in BufferRole::ALL {
            let slot = sim.roles.slot(role);
            sim.transition_slot(backend, recorder, slot, AccessState::CopyDestination)?;
            backend.record_copy(recorder, &sim.staging[role.index()], &sim.arrays[slot])?;
            sim.transition_slot(backend, recorder, slot, steady[role.index()])?;
        }

        log::debug!(
            "[GridSimulation::new] Recorded seeding uploads ({} bytes per array)",
            sim.grid.array_size_bytes()
        );
        Ok(sim)
    }

    pub fn grid(&self) -> &FabricGrid {
        &self.grid
    }

    pub fn row_count(&self) -> u32 {
        self.grid.rows()
    }

    pub fn column_count(&self) -> u32 {
        self.grid.cols()
    }

    pub fn vertex_count(&self) -> u32 {
        self.grid.vertex_count()
    }

    pub fn triangle_count(&self) -> u32 {
        self.grid.triangle_count()
    }

    pub fn width(&self) -> f32 {
        self.grid.width()
    }

    pub fn depth(&self) -> f32 {
        self.grid.depth()
    }

    pub fn spatial_step(&self) -> f32 {
        self.grid.spatial_step()
    }

    pub fn time_step(&self) -> f32 {
        self.accumulator.time_step()
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    /// Time gathered towards the next step
    pub fn accumulated_time(&self) -> f32 {
        self.accumulator.accumulated()
    }

    pub fn stats(&self) -> SimulationStats {
        self.stats
    }

    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    /// Array currently bound to `role`
    pub fn array(&self, role: BufferRole) -> &B::Array {
        &self.arrays[self.roles.slot(role)]
    }

    pub fn access_state(&self, role: BufferRole) -> AccessState {
        self.states[self.roles.slot(role)]
    }

    /// Write the six views starting at `base`.
    ///
    /// Order: read views of previous, current position, current velocity, then
    /// their read/write views. May be called again to move the views.
    pub fn build_descriptors(&mut self, table: &mut DescriptorTable<B::Array>, base: ViewSlot) -> FabricResult<()> {
        table.check_range(base, Self::DESCRIPTOR_COUNT)?;

        let mut views = [ArrayViewSlots {
            read: base,
            read_write: base,
        }; ARRAY_COUNT];
        for role in BufferRole::ALL {
            let slot = self.roles.slot(role);
            let read = base.offset(role.index() as u32);
            let read_write = base.offset((ARRAY_COUNT + role.index()) as u32);
            table.write(
                read,
                ArrayView {
                    array: self.arrays[slot].clone(),
                    access: ViewAccess::Read,
                },
            )?;
            table.write(
                read_write,
                ArrayView {
                    array: self.arrays[slot].clone(),
                    access: ViewAccess::ReadWrite,
                },
            )?;
            views[slot] = ArrayViewSlots { read, read_write };
        }
        self.views = Some(views);

        log::debug!(
            "[GridSimulation::build_descriptors] Registered {} views at slot {}",
            Self::DESCRIPTOR_COUNT,
            base.0
        );
        Ok(())
    }

    fn view_slots(&self, role: BufferRole) -> FabricResult<ArrayViewSlots> {
        let views = self.views.as_ref().ok_or(FabricError::DescriptorsUnbound)?;
        Ok(views[self.roles.slot(role)])
    }

    /// Read view of the current positions for a renderer.
    ///
    /// The slot identifies the role at the time of the call; it changes after
    /// every fired update.
    pub fn position_view(&self) -> FabricResult<ViewSlot> {
        Ok(self.view_slots(BufferRole::CurrentPosition)?.read)
    }

    /// Read view of the current velocities for a renderer
    pub fn velocity_view(&self) -> FabricResult<ViewSlot> {
        Ok(self.view_slots(BufferRole::CurrentVelocity)?.read)
    }

    /// Advance the accumulator and, if a step is due, record one update.
    pub fn prepare_update_dispatch(
        &mut self,
        backend: &B,
        recorder: &mut B::Recorder,
        kernel: &B::Kernel,
        table: &DescriptorTable<B::Array>,
        elapsed: f32,
        wind: Vec3,
    ) -> FabricResult<UpdateOutcome> {
        expect_kernel(kernel, KernelKind::Update)?;
        let bindings = KernelBindings {
            previous: Some(self.view_slots(BufferRole::Previous)?.read_write),
            current_position: Some(self.view_slots(BufferRole::CurrentPosition)?.read_write),
            current_velocity: Some(self.view_slots(BufferRole::CurrentVelocity)?.read_write),
        };
        if !wind.is_finite() {
            return Err(FabricError::invalid_parameter("wind", wind));
        }
        backend.validate_bindings(kernel, &bindings, table)?;

        if !self.accumulator.accumulate(elapsed)? {
            self.stats.skipped_updates += 1;
            return Ok(UpdateOutcome::Skipped);
        }

        // Every array bound read/write must be writable, velocity included
        self.ensure_writable(backend, recorder, BufferRole::CurrentVelocity)?;
        self.ensure_writable(backend, recorder, BufferRole::Previous)?;
        self.ensure_writable(backend, recorder, BufferRole::CurrentPosition)?;

        self.wind = wind;
        let constants =
            SimulationConstants::for_update(&self.grid, &self.coefficients, self.accumulator.time_step(), wind);
        let groups = self.grid.update_groups();
        backend.record_dispatch(recorder, kernel, &constants, &bindings, table, groups.into())?;
        self.stats.update_dispatches += 1;

        log::debug!(
            "[GridSimulation::prepare_update_dispatch] Dispatched {:?} groups, wind {:?}",
            groups,
            wind
        );

        // The kernel wrote the next positions into the previous array
        self.roles.rotate_positions();
        self.accumulator.reset();

        self.ensure_readable(backend, recorder, BufferRole::CurrentPosition)?;
        self.ensure_readable(backend, recorder, BufferRole::CurrentVelocity)?;

        Ok(UpdateOutcome::Dispatched)
    }

    /// Record an impulse at (row, col) and its four neighbours.
    ///
    /// Independent of the timestep gate. Leaves current position and velocity
    /// writable by compute; call [`Self::prepare_for_consumers`] before sampling
    /// them if no update follows.
    pub fn prepare_disturb_dispatch(
        &mut self,
        backend: &B,
        recorder: &mut B::Recorder,
        kernel: &B::Kernel,
        table: &DescriptorTable<B::Array>,
        row: u32,
        col: u32,
        magnitude: f32,
    ) -> FabricResult<()> {
        expect_kernel(kernel, KernelKind::Disturb)?;
        if !self.grid.contains(row, col) {
            return Err(FabricError::DisturbOutOfBounds {
                row,
                col,
                rows: self.grid.rows(),
                cols: self.grid.cols(),
            });
        }
        if !magnitude.is_finite() {
            return Err(FabricError::invalid_parameter("magnitude", magnitude));
        }
        let bindings = KernelBindings {
            previous: None,
            current_position: Some(self.view_slots(BufferRole::CurrentPosition)?.read_write),
            current_velocity: Some(self.view_slots(BufferRole::CurrentVelocity)?.read_write),
        };
        backend.validate_bindings(kernel, &bindings, table)?;

        self.ensure_writable(backend, recorder, BufferRole::CurrentPosition)?;
        self.ensure_writable(backend, recorder, BufferRole::CurrentVelocity)?;

        let constants = SimulationConstants::for_disturb(
            &self.grid,
            &self.coefficients,
            self.accumulator.time_step(),
            self.wind,
            row,
            col,
            magnitude,
        );
        backend.record_dispatch(recorder, kernel, &constants, &bindings, table, DISTURB_GROUPS.into())?;
        self.stats.disturb_dispatches += 1;

        log::debug!(
            "[GridSimulation::prepare_disturb_dispatch] Disturbed ({}, {}) by {}",
            row,
            col,
            magnitude
        );
        Ok(())
    }

    /// Make current position and velocity safe to sample
    pub fn prepare_for_consumers(&mut self, backend: &B, recorder: &mut B::Recorder) -> FabricResult<()> {
        self.ensure_readable(backend, recorder, BufferRole::CurrentPosition)?;
        self.ensure_readable(backend, recorder, BufferRole::CurrentVelocity)
    }

    /// Drop the seeding upload buffers once the host knows they were consumed
    pub fn release_staging(&mut self) {
        if !self.staging.is_empty() {
            log::debug!("[GridSimulation::release_staging] Releasing {} staging buffers", self.staging.len());
        }
        self.staging.clear();
    }

    pub fn has_staging(&self) -> bool {
        !self.staging.is_empty()
    }

    pub fn ensure_writable(&mut self, backend: &B, recorder: &mut B::Recorder, role: BufferRole) -> FabricResult<()> {
        let slot = self.roles.slot(role);
        self.transition_slot(backend, recorder, slot, AccessState::WritableByCompute)
    }

    pub fn ensure_readable(&mut self, backend: &B, recorder: &mut B::Recorder, role: BufferRole) -> FabricResult<()> {
        let slot = self.roles.slot(role);
        self.transition_slot(backend, recorder, slot, AccessState::ReadableByConsumer)
    }

    fn transition_slot(
        &mut self,
        backend: &B,
        recorder: &mut B::Recorder,
        slot: usize,
        to: AccessState,
    ) -> FabricResult<()> {
        let from = self.states[slot];
        if from == to {
            return Ok(());
        }
        let transition = Transition::new(&self.labels[slot], from, to)?;
        backend.record_transition(recorder, &self.arrays[slot], transition);
        self.states[slot] = to;
        self.stats.transitions += 1;
        log::trace!("[GridSimulation] {}: {:?} -> {:?}", self.labels[slot], from, to);
        Ok(())
    }
}

fn expect_kernel<K: KernelHandle>(kernel: &K, expected: KernelKind) -> FabricResult<()> {
    let actual = kernel.kind();
    if actual != expected {
        return Err(FabricError::KernelMismatch { expected, actual });
    }
    Ok(())
}
