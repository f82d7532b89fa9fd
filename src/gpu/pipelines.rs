use crate::constants::generate_wgsl_constants;
use crate::constants::layout::{BINDING_CONSTANTS, CONSTANTS_SIZE_BYTES};
use crate::fabric::{KernelHandle, KernelKind};
use std::num::NonZeroU64;
use std::sync::Arc;
use wgpu::{BindGroupLayout, ComputePipeline, Device};

/// Compiled fabric kernel and the bind group layout it expects
#[derive(Clone)]
pub struct FabricKernel {
    kind: KernelKind,
    pub pipeline: Arc<ComputePipeline>,
    pub layout: Arc<BindGroupLayout>,
}

impl KernelHandle for FabricKernel {
    fn kind(&self) -> KernelKind {
        self.kind
    }
}

/// Full shader source: generated constants followed by the kernels
pub fn fabric_shader_source() -> String {
    format!("{}\n{}", generate_wgsl_constants(), include_str!("../shaders/fabric.wgsl"))
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Bind group layout for a kernel: the uniform block plus its storage arrays
pub fn create_kernel_layout(device: &Device, kind: KernelKind) -> BindGroupLayout {
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: BINDING_CONSTANTS,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(CONSTANTS_SIZE_BYTES),
        },
        count: None,
    }];
    entries.extend(kind.bindings().iter().map(|&binding| storage_entry(binding)));

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{} Bind Group Layout", kind.label())),
        entries: &entries,
    })
}

/// Compile one kernel from the shared shader module
pub fn create_fabric_kernel(device: &Device, shader: &wgpu::ShaderModule, kind: KernelKind) -> FabricKernel {
    let layout = create_kernel_layout(device, kind);

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{} Layout", kind.label())),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{} Pipeline", kind.label())),
        layout: Some(&pipeline_layout),
        module: shader,
        entry_point: kind.entry_point(),
    });

    log::info!(
        "[FabricPipelines] Created {} pipeline (entry point {})",
        kind.label(),
        kind.entry_point()
    );

    FabricKernel {
        kind,
        pipeline: Arc::new(pipeline),
        layout: Arc::new(layout),
    }
}

/// Both fabric kernels compiled from one shader module
pub struct FabricPipelines {
    pub update: FabricKernel,
    pub disturb: FabricKernel,
}

impl FabricPipelines {
    pub fn new(device: &Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fabric Shader"),
            source: wgpu::ShaderSource::Wgsl(fabric_shader_source().into()),
        });

        Self {
            update: create_fabric_kernel(device, &shader, KernelKind::Update),
            disturb: create_fabric_kernel(device, &shader, KernelKind::Disturb),
        }
    }

    pub fn get(&self, kind: KernelKind) -> &FabricKernel {
        match kind {
            KernelKind::Update => &self.update,
            KernelKind::Disturb => &self.disturb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::layout::{BINDING_CURRENT_POSITION, BINDING_CURRENT_VELOCITY, BINDING_PREVIOUS};

    #[test]
    fn test_shader_source_has_prelude_and_entry_points() {
        let source = fabric_shader_source();
        assert!(source.starts_with("// AUTO-GENERATED FABRIC CONSTANTS"));
        assert!(source.contains("fn update_fabric"));
        assert!(source.contains("fn disturb_fabric"));
        assert!(source.contains("@workgroup_size(TILE_SIZE, TILE_SIZE, 1)"));
    }

    #[test]
    fn test_disturb_layout_skips_previous() {
        assert!(!KernelKind::Disturb.bindings().contains(&BINDING_PREVIOUS));
        assert_eq!(
            KernelKind::Disturb.bindings(),
            &[BINDING_CURRENT_POSITION, BINDING_CURRENT_VELOCITY]
        );
    }
}
