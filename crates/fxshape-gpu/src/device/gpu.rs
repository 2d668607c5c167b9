use anyhow::{Context, Result};

use crate::backend::GpuId;
use crate::format::PixelFormat;

use super::{adapter, DeviceInit};

/// wgpu device handle cached per physical GPU.
///
/// Owns the adapter (for capability queries), the logical device and the
/// device's submission queue. Command queues handed out by the cache share
/// the submission queue; see [`super::WgpuQueue`].
pub struct WgpuDevice {
    gpu_id: GpuId,
    info: wgpu::AdapterInfo,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuDevice {
    /// Opens the adapter named by `gpu_id`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; this blocks.
    pub(crate) fn open(
        instance: &wgpu::Instance,
        init: &DeviceInit,
        gpu_id: GpuId,
    ) -> Result<Self> {
        let adapter = adapter::find(instance, init.backends, gpu_id)
            .with_context(|| format!("no adapter matches GPU {gpu_id}"))?;
        let info = adapter.get_info();

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("fxshape device"),
            required_features: init.required_features,
            required_limits: init.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: init.memory_hints.clone(),
            trace: wgpu::Trace::Off,
        }))
        .with_context(|| format!("failed to create wgpu device for {} ({gpu_id})", info.name))?;

        log::debug!("gpu {gpu_id}: {} via {:?}", info.name, info.backend);

        Ok(Self {
            gpu_id,
            info,
            adapter,
            device,
            queue,
        })
    }

    #[inline]
    pub fn gpu_id(&self) -> GpuId {
        self.gpu_id
    }

    #[inline]
    pub fn info(&self) -> &wgpu::AdapterInfo {
        &self.info
    }

    /// Returns a reference to the logical device.
    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns the device's submission queue.
    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Whether `format` can be a render target here, with blending if asked.
    pub fn supports_target(&self, format: PixelFormat, blending: bool) -> bool {
        let features = self.adapter.get_texture_format_features(format.to_wgpu());
        if !features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        {
            return false;
        }
        !blending
            || features
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE)
    }
}
