//! wgpu compute backend
//!
//! Runs the fabric kernels on a headless device. Arrays are storage buffers,
//! the kernels live in `shaders/fabric.wgsl`.

pub mod backend;
pub mod context;
pub mod pipelines;

pub use backend::{WgpuArray, WgpuBackend, WgpuStaging};
pub use context::GpuContext;
pub use pipelines::{FabricKernel, FabricPipelines};
