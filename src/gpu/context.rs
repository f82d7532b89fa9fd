use crate::error::{FabricError, FabricResult};
use std::sync::Arc;

/// Headless device and queue for compute-only work
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Request an adapter without a surface and open a device on it.
    ///
    /// Tries high-performance, then low-power, then the fallback adapter.
    pub async fn new_headless() -> FabricResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        log::info!("[GpuContext::new_headless] Requesting GPU adapter...");
        let mut adapter_options = wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        };

        let adapter = match instance.request_adapter(&adapter_options).await {
            Some(adapter) => adapter,
            None => {
                log::warn!("[GpuContext::new_headless] No high-performance adapter found, trying low power...");
                adapter_options.power_preference = wgpu::PowerPreference::LowPower;
                match instance.request_adapter(&adapter_options).await {
                    Some(adapter) => adapter,
                    None => {
                        log::warn!("[GpuContext::new_headless] No low-power adapter found, trying fallback...");
                        adapter_options.force_fallback_adapter = true;
                        instance
                            .request_adapter(&adapter_options)
                            .await
                            .ok_or_else(|| FabricError::Gpu {
                                message: "no GPU adapter available".to_string(),
                            })?
                    }
                }
            }
        };

        let adapter_info = adapter.get_info();
        log::info!(
            "[GpuContext::new_headless] Adapter: {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Fabric Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| FabricError::Gpu {
                message: format!("device request failed: {}", e),
            })?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
        })
    }

    /// Blocking wrapper around [`Self::new_headless`]
    pub fn new_headless_blocking() -> FabricResult<Self> {
        pollster::block_on(Self::new_headless())
    }
}
