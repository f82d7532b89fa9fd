use super::context::GpuContext;
use super::pipelines::{FabricKernel, FabricPipelines};
use crate::constants::layout::BINDING_CONSTANTS;
use crate::error::{FabricError, FabricResult};
use crate::fabric::{
    ArrayDescriptor, ComputeBackend, DescriptorTable, DispatchSize, GridCell, KernelBindings, KernelHandle, KernelKind,
    SimulationConstants, Transition, ViewAccess,
};
use std::sync::Arc;
use wgpu::util::DeviceExt;
use wgpu::{Buffer, CommandEncoder, Device, Queue};

/// Storage buffer holding one simulation array
#[derive(Clone, Debug)]
pub struct WgpuArray {
    pub buffer: Arc<Buffer>,
    label: Arc<str>,
    size: u64,
}

impl WgpuArray {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Upload buffer consumed by a seeding copy
pub struct WgpuStaging {
    buffer: Buffer,
    size: u64,
}

/// wgpu implementation of [`ComputeBackend`].
///
/// Arrays are `array<vec4<f32>>` storage buffers. wgpu inserts its own barriers,
/// so transitions are recorded as debug markers only; the simulation's state
/// machine still decides where they go.
pub struct WgpuBackend {
    device: Arc<Device>,
    queue: Arc<Queue>,
    pipelines: FabricPipelines,
}

impl WgpuBackend {
    pub fn new(device: Arc<Device>, queue: Arc<Queue>) -> Self {
        let pipelines = FabricPipelines::new(&device);
        log::info!("[WgpuBackend::new] Fabric pipelines ready");
        Self {
            device,
            queue,
            pipelines,
        }
    }

    pub fn from_context(context: &GpuContext) -> Self {
        Self::new(Arc::clone(&context.device), Arc::clone(&context.queue))
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    /// Copy an array back to the host, blocking until the GPU is done
    pub fn read_array(&self, array: &WgpuArray) -> FabricResult<Vec<GridCell>> {
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fabric Readback Buffer"),
            size: array.size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Fabric Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(&array.buffer, 0, &readback, 0, array.size);
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // Receiver only disappears if the caller already gave up
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        pollster::block_on(rx)
            .map_err(|_| FabricError::Gpu {
                message: format!("readback of {} was cancelled", array.label),
            })?
            .map_err(|e| FabricError::Gpu {
                message: format!("failed to map {} for readback: {:?}", array.label, e),
            })?;

        let cells = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, GridCell>(&data).to_vec()
        };
        readback.unmap();
        Ok(cells)
    }

    /// Run `create` inside out-of-memory and validation error scopes
    fn scoped_allocation<T>(&self, resource: &str, create: impl FnOnce() -> T) -> FabricResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        if let Some(error) = out_of_memory.or(validation) {
            return Err(FabricError::allocation(resource, error));
        }
        Ok(value)
    }
}

impl ComputeBackend for WgpuBackend {
    type Array = WgpuArray;
    type Staging = WgpuStaging;
    type Recorder = CommandEncoder;
    type Kernel = FabricKernel;

    fn begin_recording(&self, label: &str) -> CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn submit(&self, recorder: CommandEncoder) -> FabricResult<()> {
        self.queue.submit(Some(recorder.finish()));
        Ok(())
    }

    fn create_kernel(&self, kind: KernelKind) -> FabricResult<FabricKernel> {
        Ok(self.pipelines.get(kind).clone())
    }

    fn create_array(&self, desc: &ArrayDescriptor) -> FabricResult<WgpuArray> {
        let size = desc.size_bytes();
        let limits = self.device.limits();
        if size > limits.max_buffer_size || size > limits.max_storage_buffer_binding_size as u64 {
            return Err(FabricError::allocation(
                desc.label.as_str(),
                format!(
                    "{} bytes exceeds device limits (buffer {}, storage binding {})",
                    size, limits.max_buffer_size, limits.max_storage_buffer_binding_size
                ),
            ));
        }

        let buffer = self.scoped_allocation(&desc.label, || {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&desc.label),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        })?;

        log::debug!("[WgpuBackend::create_array] {} ({} bytes)", desc.label, size);
        Ok(WgpuArray {
            buffer: Arc::new(buffer),
            label: Arc::from(desc.label.as_str()),
            size,
        })
    }

    fn create_staging(&self, label: &str, cells: &[GridCell]) -> FabricResult<WgpuStaging> {
        let buffer = self.scoped_allocation(label, || {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(cells),
                usage: wgpu::BufferUsages::COPY_SRC,
            })
        })?;
        Ok(WgpuStaging {
            buffer,
            size: std::mem::size_of_val(cells) as u64,
        })
    }

    fn record_copy(&self, encoder: &mut CommandEncoder, staging: &WgpuStaging, array: &WgpuArray) -> FabricResult<()> {
        if staging.size != array.size {
            return Err(FabricError::Gpu {
                message: format!(
                    "copy of {} bytes into {} ({} bytes)",
                    staging.size, array.label, array.size
                ),
            });
        }
        encoder.copy_buffer_to_buffer(&staging.buffer, 0, &array.buffer, 0, staging.size);
        Ok(())
    }

    fn record_transition(&self, encoder: &mut CommandEncoder, array: &WgpuArray, transition: Transition) {
        encoder.insert_debug_marker(&format!(
            "{}: {:?} -> {:?}",
            array.label, transition.from, transition.to
        ));
    }

    fn validate_bindings(
        &self,
        kernel: &FabricKernel,
        bindings: &KernelBindings,
        table: &DescriptorTable<WgpuArray>,
    ) -> FabricResult<()> {
        resolve_bindings(kernel.kind(), bindings, table).map(|_| ())
    }

    fn record_dispatch(
        &self,
        encoder: &mut CommandEncoder,
        kernel: &FabricKernel,
        constants: &SimulationConstants,
        bindings: &KernelBindings,
        table: &DescriptorTable<WgpuArray>,
        groups: DispatchSize,
    ) -> FabricResult<()> {
        let kind = kernel.kind();
        let arrays = resolve_bindings(kind, bindings, table)?;

        // Per-dispatch uniform; a shared buffer rewritten with write_buffer
        // would only hold the last value by the time the encoder runs
        let uniform = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Constants", kind.label())),
            contents: bytemuck::bytes_of(constants),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: BINDING_CONSTANTS,
            resource: uniform.as_entire_binding(),
        }];
        entries.extend(arrays.iter().map(|(binding, array)| wgpu::BindGroupEntry {
            binding: *binding,
            resource: array.buffer.as_entire_binding(),
        }));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Bind Group", kind.label())),
            layout: &kernel.layout,
            entries: &entries,
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kind.label()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups.x, groups.y, groups.z);
        }

        log::trace!(
            "[WgpuBackend::record_dispatch] {} {}x{}x{}",
            kind.label(),
            groups.x,
            groups.y,
            groups.z
        );
        Ok(())
    }
}

/// Storage buffers a kernel binds, in binding order, with aliasing rejected
fn resolve_bindings<'a>(
    kind: KernelKind,
    bindings: &KernelBindings,
    table: &'a DescriptorTable<WgpuArray>,
) -> FabricResult<Vec<(u32, &'a WgpuArray)>> {
    let mut arrays: Vec<(u32, &WgpuArray)> = Vec::with_capacity(kind.bindings().len());
    for &binding in kind.bindings() {
        let slot = bindings.get(binding).ok_or(FabricError::DescriptorsUnbound)?;
        let array = table.resolve(slot, ViewAccess::ReadWrite)?;
        if arrays.iter().any(|(_, bound)| Arc::ptr_eq(&bound.buffer, &array.buffer)) {
            return Err(FabricError::AliasedBinding {
                array: array.label.to_string(),
            });
        }
        arrays.push((binding, array));
    }
    Ok(arrays)
}
