//! Seam between the portable simulation logic and a concrete compute API
//!
//! A backend allocates arrays and staging buffers and records copies, state
//! transitions and dispatches onto its command recorder. It never decides
//! *when* a transition is needed; that is the simulation's state machine.

use crate::constants::layout::{
    BINDING_CURRENT_POSITION, BINDING_CURRENT_VELOCITY, BINDING_PREVIOUS,
};
use crate::error::FabricResult;
use crate::fabric::{DescriptorTable, FabricGrid, GridCell, SimulationConstants, Transition, ViewSlot};

/// Which fabric kernel a pipeline runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelKind {
    /// Spring-damper-wind step over the whole grid
    Update,
    /// Single-cell impulse
    Disturb,
}

impl KernelKind {
    /// Array bindings the kernel reads and writes
    pub fn bindings(self) -> &'static [u32] {
        match self {
            KernelKind::Update => &[BINDING_PREVIOUS, BINDING_CURRENT_POSITION, BINDING_CURRENT_VELOCITY],
            KernelKind::Disturb => &[BINDING_CURRENT_POSITION, BINDING_CURRENT_VELOCITY],
        }
    }

    /// WGSL entry point
    pub fn entry_point(self) -> &'static str {
        match self {
            KernelKind::Update => "update_fabric",
            KernelKind::Disturb => "disturb_fabric",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            KernelKind::Update => "Fabric Update",
            KernelKind::Disturb => "Fabric Disturb",
        }
    }
}

/// Implemented by backend pipeline handles so the simulation can reject a
/// disturb pipeline passed to an update and vice versa
pub trait KernelHandle {
    fn kind(&self) -> KernelKind;
}

impl KernelHandle for KernelKind {
    fn kind(&self) -> KernelKind {
        *self
    }
}

/// Read/write views bound to a dispatch, by binding slot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KernelBindings {
    pub previous: Option<ViewSlot>,
    pub current_position: Option<ViewSlot>,
    pub current_velocity: Option<ViewSlot>,
}

impl KernelBindings {
    pub fn get(&self, binding: u32) -> Option<ViewSlot> {
        match binding {
            BINDING_PREVIOUS => self.previous,
            BINDING_CURRENT_POSITION => self.current_position,
            BINDING_CURRENT_VELOCITY => self.current_velocity,
            _ => None,
        }
    }
}

/// Thread group counts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl From<[u32; 3]> for DispatchSize {
    fn from([x, y, z]: [u32; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Shape of one simulation array
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayDescriptor {
    pub label: String,
    pub rows: u32,
    pub cols: u32,
}

impl ArrayDescriptor {
    pub fn new(label: impl Into<String>, grid: &FabricGrid) -> Self {
        Self {
            label: label.into(),
            rows: grid.rows(),
            cols: grid.cols(),
        }
    }

    pub fn cell_count(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }

    pub fn size_bytes(&self) -> u64 {
        self.cell_count() * crate::constants::layout::CELL_SIZE_BYTES
    }
}

/// A compute API exposing explicit arrays, staging uploads and transitions
pub trait ComputeBackend {
    /// GPU-resident array handle; clones refer to the same array
    type Array: Clone;
    /// CPU-visible upload buffer
    type Staging;
    /// Ordered command stream
    type Recorder;
    /// Compiled kernel
    type Kernel: KernelHandle;

    fn begin_recording(&self, label: &str) -> Self::Recorder;

    /// Hand a finished recorder to the device
    fn submit(&self, recorder: Self::Recorder) -> FabricResult<()>;

    fn create_kernel(&self, kind: KernelKind) -> FabricResult<Self::Kernel>;

    fn create_array(&self, desc: &ArrayDescriptor) -> FabricResult<Self::Array>;

    fn create_staging(&self, label: &str, cells: &[GridCell]) -> FabricResult<Self::Staging>;

    /// Record a full upload; the staging buffer must match the array's size
    fn record_copy(&self, recorder: &mut Self::Recorder, staging: &Self::Staging, array: &Self::Array)
        -> FabricResult<()>;

    /// Resolve a kernel's bindings through the table without recording anything
    fn validate_bindings(
        &self,
        kernel: &Self::Kernel,
        bindings: &KernelBindings,
        table: &DescriptorTable<Self::Array>,
    ) -> FabricResult<()>;

    fn record_transition(&self, recorder: &mut Self::Recorder, array: &Self::Array, transition: Transition);

    fn record_dispatch(
        &self,
        recorder: &mut Self::Recorder,
        kernel: &Self::Kernel,
        constants: &SimulationConstants,
        bindings: &KernelBindings,
        table: &DescriptorTable<Self::Array>,
        groups: DispatchSize,
    ) -> FabricResult<()>;
}
