//! CPU Reference Backend
//!
//! Executes recorded fabric commands on the host with strict access-state
//! validation. Used by tests and as the demo fallback when no adapter exists.

pub mod backend;
pub mod kernels;

pub use backend::{CpuArray, CpuBackend, CpuCommand, CpuCommandList, CpuStaging};
pub use kernels::{cell_force, disturb_kernel, update_kernel};
