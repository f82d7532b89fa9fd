use super::*;
use crate::error::FabricError;
use crate::reference::{CpuArray, CpuBackend, CpuCommandList};
use glam::Vec3;

fn descriptor(rows: u32, cols: u32) -> FabricDescriptor {
    FabricDescriptor {
        rows,
        cols,
        spatial_step: 1.0,
        time_step: 1.0 / 30.0,
        coefficients: Coefficients::new(10.0, 1.0, 0.1),
    }
}

struct Harness {
    backend: CpuBackend,
    sim: GridSimulation<CpuBackend>,
    table: DescriptorTable<CpuArray>,
    update: KernelKind,
    disturb: KernelKind,
}

impl Harness {
    fn new(rows: u32, cols: u32) -> Self {
        let backend = CpuBackend::new();
        let mut recorder = backend.begin_recording("init");
        let mut sim = GridSimulation::new(&backend, &mut recorder, &descriptor(rows, cols)).unwrap();
        backend.submit(recorder).unwrap();
        sim.release_staging();

        let mut table = DescriptorTable::new(GridSimulation::<CpuBackend>::DESCRIPTOR_COUNT);
        let base = table.allocate(GridSimulation::<CpuBackend>::DESCRIPTOR_COUNT).unwrap();
        sim.build_descriptors(&mut table, base).unwrap();

        let update = backend.create_kernel(KernelKind::Update).unwrap();
        let disturb = backend.create_kernel(KernelKind::Disturb).unwrap();
        Self {
            backend,
            sim,
            table,
            update,
            disturb,
        }
    }

    fn tick(&mut self, elapsed: f32) -> UpdateOutcome {
        let mut recorder = self.backend.begin_recording("tick");
        let outcome = self
            .sim
            .prepare_update_dispatch(&self.backend, &mut recorder, &self.update, &self.table, elapsed, Vec3::ZERO)
            .unwrap();
        self.backend.submit(recorder).unwrap();
        outcome
    }

    fn recorder(&self) -> CpuCommandList {
        self.backend.begin_recording("test")
    }
}

#[test]
fn test_construction_reaches_steady_states() {
    let harness = Harness::new(16, 16);
    let sim = &harness.sim;
    assert_eq!(sim.access_state(BufferRole::Previous), AccessState::WritableByCompute);
    assert_eq!(sim.access_state(BufferRole::CurrentPosition), AccessState::ReadableByConsumer);
    assert_eq!(sim.access_state(BufferRole::CurrentVelocity), AccessState::ReadableByConsumer);

    // Tracked and device-side states agree after submit
    for role in BufferRole::ALL {
        assert_eq!(sim.array(role).state(), sim.access_state(role));
    }
}

#[test]
fn test_construction_seeds_arrays() {
    let harness = Harness::new(16, 16);
    let sim = &harness.sim;
    let flat = sim.grid().flat_positions();
    assert_eq!(sim.array(BufferRole::Previous).snapshot(), flat);
    assert_eq!(sim.array(BufferRole::CurrentPosition).snapshot(), flat);
    assert!(sim
        .array(BufferRole::CurrentVelocity)
        .snapshot()
        .iter()
        .all(|c| *c == GridCell::ZERO));
}

#[test]
fn test_construction_records_six_transitions() {
    let backend = CpuBackend::new();
    let mut recorder = backend.begin_recording("init");
    let sim = GridSimulation::new(&backend, &mut recorder, &descriptor(16, 16)).unwrap();
    assert_eq!(recorder.transition_count(), 6);
    assert_eq!(recorder.dispatch_count(), 0);
    assert!(sim.has_staging());
    assert_eq!(sim.stats().transitions, 6);
}

#[test]
fn test_rejects_indivisible_grid() {
    let backend = CpuBackend::new();
    let mut recorder = backend.begin_recording("init");
    let result = GridSimulation::new(&backend, &mut recorder, &descriptor(10, 10));
    assert!(matches!(result, Err(FabricError::ConstructionPrecondition { rows: 10, cols: 10, .. })));
    assert!(recorder.is_empty());
}

#[test]
fn test_rejects_bad_time_step() {
    let backend = CpuBackend::new();
    let mut recorder = backend.begin_recording("init");
    let desc = FabricDescriptor {
        time_step: 0.0,
        ..descriptor(16, 16)
    };
    assert!(matches!(
        GridSimulation::new(&backend, &mut recorder, &desc),
        Err(FabricError::InvalidParameter { name: "time_step", .. })
    ));
}

#[test]
fn test_zero_elapsed_never_dispatches() {
    let mut harness = Harness::new(16, 16);
    let roles = *harness.sim.roles();
    let before = harness.sim.array(BufferRole::CurrentPosition).snapshot();

    for _ in 0..10 {
        assert_eq!(harness.tick(0.0), UpdateOutcome::Skipped);
    }

    assert_eq!(*harness.sim.roles(), roles);
    assert_eq!(harness.sim.array(BufferRole::CurrentPosition).snapshot(), before);
    assert_eq!(harness.sim.stats().update_dispatches, 0);
    assert_eq!(harness.sim.stats().skipped_updates, 10);
}

#[test]
fn test_fired_update_swaps_position_slots() {
    let mut harness = Harness::new(16, 16);
    let previous = harness.sim.roles().slot(BufferRole::Previous);
    let current = harness.sim.roles().slot(BufferRole::CurrentPosition);
    let velocity = harness.sim.roles().slot(BufferRole::CurrentVelocity);

    assert_eq!(harness.tick(1.0 / 30.0), UpdateOutcome::Dispatched);

    assert_eq!(harness.sim.roles().slot(BufferRole::Previous), current);
    assert_eq!(harness.sim.roles().slot(BufferRole::CurrentPosition), previous);
    assert_eq!(harness.sim.roles().slot(BufferRole::CurrentVelocity), velocity);
    assert_eq!(harness.sim.accumulated_time(), 0.0);
}

#[test]
fn test_update_leaves_outputs_readable() {
    let mut harness = Harness::new(16, 16);
    harness.tick(1.0 / 30.0);
    let sim = &harness.sim;
    assert_eq!(sim.access_state(BufferRole::CurrentPosition), AccessState::ReadableByConsumer);
    assert_eq!(sim.access_state(BufferRole::CurrentVelocity), AccessState::ReadableByConsumer);
    assert_eq!(sim.access_state(BufferRole::Previous), AccessState::WritableByCompute);
    for role in BufferRole::ALL {
        assert_eq!(sim.array(role).state(), sim.access_state(role));
    }
}

#[test]
fn test_position_view_follows_role() {
    let mut harness = Harness::new(16, 16);
    let before = harness.sim.position_view().unwrap();
    let velocity_before = harness.sim.velocity_view().unwrap();
    harness.tick(1.0 / 30.0);
    let after = harness.sim.position_view().unwrap();

    assert_ne!(before, after);
    assert_eq!(harness.sim.velocity_view().unwrap(), velocity_before);

    // The view resolves to the array now playing CurrentPosition
    let array = harness.table.resolve(after, ViewAccess::Read).unwrap();
    assert_eq!(array.id(), harness.sim.array(BufferRole::CurrentPosition).id());
}

#[test]
fn test_descriptor_layout() {
    let harness = Harness::new(16, 16);
    let table = &harness.table;
    for role in BufferRole::ALL {
        let id = harness.sim.array(role).id();
        let read = table.resolve(ViewSlot(role.index() as u32), ViewAccess::Read).unwrap();
        let read_write = table
            .resolve(ViewSlot(3 + role.index() as u32), ViewAccess::ReadWrite)
            .unwrap();
        assert_eq!(read.id(), id);
        assert_eq!(read_write.id(), id);
    }
}

#[test]
fn test_views_required_before_dispatch() {
    let backend = CpuBackend::new();
    let mut recorder = backend.begin_recording("init");
    let mut sim = GridSimulation::new(&backend, &mut recorder, &descriptor(16, 16)).unwrap();
    let table = DescriptorTable::new(6);

    assert!(matches!(sim.position_view(), Err(FabricError::DescriptorsUnbound)));
    assert!(matches!(
        sim.prepare_update_dispatch(&backend, &mut recorder, &KernelKind::Update, &table, 1.0, Vec3::ZERO),
        Err(FabricError::DescriptorsUnbound)
    ));
}

#[test]
fn test_build_descriptors_checks_capacity() {
    let backend = CpuBackend::new();
    let mut recorder = backend.begin_recording("init");
    let mut sim = GridSimulation::new(&backend, &mut recorder, &descriptor(16, 16)).unwrap();
    let mut table = DescriptorTable::new(8);
    assert!(matches!(
        sim.build_descriptors(&mut table, ViewSlot(4)),
        Err(FabricError::DescriptorRange { base: 4, end: 10, capacity: 8 })
    ));
    assert!(sim.build_descriptors(&mut table, ViewSlot(2)).is_ok());
}

#[test]
fn test_wrong_kernel_rejected() {
    let mut harness = Harness::new(16, 16);
    let mut recorder = harness.recorder();
    let result = harness.sim.prepare_update_dispatch(
        &harness.backend,
        &mut recorder,
        &harness.disturb,
        &harness.table,
        1.0,
        Vec3::ZERO,
    );
    assert!(matches!(
        result,
        Err(FabricError::KernelMismatch {
            expected: KernelKind::Update,
            actual: KernelKind::Disturb
        })
    ));
    assert!(recorder.is_empty());
}

#[test]
fn test_negative_elapsed_rejected() {
    let mut harness = Harness::new(16, 16);
    let mut recorder = harness.recorder();
    let result = harness.sim.prepare_update_dispatch(
        &harness.backend,
        &mut recorder,
        &harness.update,
        &harness.table,
        -0.1,
        Vec3::ZERO,
    );
    assert!(matches!(result, Err(FabricError::InvalidTimeDelta { .. })));
    assert_eq!(harness.sim.accumulated_time(), 0.0);
}

#[test]
fn test_disturb_out_of_bounds() {
    let mut harness = Harness::new(16, 16);
    let mut recorder = harness.recorder();
    let result = harness.sim.prepare_disturb_dispatch(
        &harness.backend,
        &mut recorder,
        &harness.disturb,
        &harness.table,
        16,
        0,
        -0.3,
    );
    assert!(matches!(
        result,
        Err(FabricError::DisturbOutOfBounds { row: 16, col: 0, .. })
    ));
    assert!(recorder.is_empty());
}

#[test]
fn test_disturb_leaves_arrays_writable_until_prepared() {
    let mut harness = Harness::new(16, 16);
    let mut recorder = harness.recorder();
    harness
        .sim
        .prepare_disturb_dispatch(
            &harness.backend,
            &mut recorder,
            &harness.disturb,
            &harness.table,
            4,
            4,
            -0.3,
        )
        .unwrap();
    assert_eq!(
        harness.sim.access_state(BufferRole::CurrentPosition),
        AccessState::WritableByCompute
    );

    harness.sim.prepare_for_consumers(&harness.backend, &mut recorder).unwrap();
    harness.backend.submit(recorder).unwrap();
    assert_eq!(
        harness.sim.array(BufferRole::CurrentPosition).state(),
        AccessState::ReadableByConsumer
    );
    assert_eq!(harness.sim.stats().disturb_dispatches, 1);
}

#[test]
fn test_ensure_is_idempotent() {
    let mut harness = Harness::new(16, 16);
    let mut recorder = harness.recorder();
    harness
        .sim
        .ensure_readable(&harness.backend, &mut recorder, BufferRole::CurrentPosition)
        .unwrap();
    harness
        .sim
        .ensure_writable(&harness.backend, &mut recorder, BufferRole::Previous)
        .unwrap();
    assert!(recorder.is_empty());
}
