//! wgpu implementation of the cache's collaborators.
//!
//! This module is responsible for:
//! - resolving a GPU identifier to a wgpu adapter and opening a device on it
//! - compiling pipeline descriptors into render pipelines
//! - creating command queues with their per-queue staging buffers

mod adapter;
mod gpu;
mod init;
mod pipeline;
mod queue;

pub use adapter::gpu_id_for;
pub use gpu::WgpuDevice;
pub use init::DeviceInit;
pub use pipeline::WgpuPipeline;
pub use queue::{WgpuQueue, MAX_VERTICES, UNIFORM_SLOTS};

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;

use crate::backend::{GpuBackend, GpuId};
use crate::format::PixelFormat;
use crate::pipeline::PipelineDescriptor;

/// Production backend: one wgpu instance shared by every device it opens.
pub struct WgpuBackend {
    instance: wgpu::Instance,
    init: DeviceInit,
    next_queue: AtomicU64,
}

impl WgpuBackend {
    pub fn new(init: DeviceInit) -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        });
        Self {
            instance,
            init,
            next_queue: AtomicU64::new(0),
        }
    }

    /// Visible adapters and the identifiers they are cached under.
    pub fn adapters(&self) -> Vec<(GpuId, wgpu::AdapterInfo)> {
        adapter::enumerate(&self.instance, self.init.backends)
            .iter()
            .map(|a| {
                let info = a.get_info();
                (gpu_id_for(&info), info)
            })
            .collect()
    }
}

impl GpuBackend for WgpuBackend {
    type Device = WgpuDevice;
    type Pipeline = WgpuPipeline;
    type Queue = WgpuQueue;

    fn open_device(&self, gpu_id: GpuId) -> Result<WgpuDevice> {
        WgpuDevice::open(&self.instance, &self.init, gpu_id)
    }

    fn build_pipeline(
        &self,
        device: &WgpuDevice,
        descriptor: &PipelineDescriptor,
    ) -> Result<WgpuPipeline> {
        pipeline::build(device, descriptor)
    }

    fn create_queue(&self, device: &WgpuDevice, format: PixelFormat) -> Result<WgpuQueue> {
        let serial = self.next_queue.fetch_add(1, Ordering::Relaxed);
        Ok(WgpuQueue::new(device, serial, format))
    }
}
