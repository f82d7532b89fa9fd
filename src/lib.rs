//! GPU cloth and wave surface simulation
//!
//! A rectangular grid of cells coupled by springs is stepped on a compute device
//! at a fixed timestep. Positions ping-pong between two arrays; runtime impulses
//! push individual cells. The simulation records commands against a
//! [`fabric::ComputeBackend`]: [`gpu::WgpuBackend`] for real devices and
//! [`reference::CpuBackend`] for validation on the host.

pub mod config;
pub mod constants;
pub mod demo;
pub mod error;
pub mod fabric;
pub mod gpu;
pub mod reference;

pub use config::FabricConfig;
pub use demo::FabricDemo;
pub use error::{FabricError, FabricResult};
pub use fabric::{
    AccessState, BufferRole, Coefficients, ComputeBackend, DescriptorTable, FabricDescriptor, GridCell,
    GridSimulation, KernelKind, UpdateOutcome, ViewSlot, WindController,
};
pub use gpu::{GpuContext, WgpuBackend};
pub use reference::CpuBackend;
