//! Fabric Simulation Core
//!
//! Triple-buffered grid of positions and velocities stepped by a compute
//! kernel at a fixed timestep, with runtime impulses. The logic here is
//! API-agnostic; concrete devices implement [`ComputeBackend`].

pub mod backend;
pub mod descriptors;
pub mod grid;
pub mod params;
pub mod roles;
pub mod simulation;
pub mod state;
pub mod timestep;
pub mod wind;

pub use backend::{ArrayDescriptor, ComputeBackend, DispatchSize, KernelBindings, KernelHandle, KernelKind};
pub use descriptors::{ArrayView, ArrayViewSlots, DescriptorTable, ViewAccess, ViewSlot};
pub use grid::{FabricGrid, GridCell};
pub use params::{Coefficients, SimulationConstants};
pub use roles::{BufferRole, RoleTable};
pub use simulation::{FabricDescriptor, GridSimulation, SimulationStats, UpdateOutcome};
pub use state::{AccessState, Transition};
pub use timestep::TimeAccumulator;
pub use wind::WindController;

#[cfg(test)]
mod tests;
