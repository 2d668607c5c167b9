use crate::format::PixelFormat;
use crate::pipeline::{OverlayUniforms, Vertex2D, UNIFORM_SLOT_STRIDE};

use super::WgpuDevice;

/// Uniform slots per queue: frame/shape and on-screen controls.
pub const UNIFORM_SLOTS: u64 = 2;

/// Vertices a queue can stage per submission.
pub const MAX_VERTICES: u64 = 64;

/// A command-submission context checked out from the cache.
///
/// Wraps the device's submission queue together with staging buffers that
/// are rewritten on every render. Those buffers are why a queue must be held
/// by one render call at a time.
pub struct WgpuQueue {
    serial: u64,
    created_for: PixelFormat,
    queue: wgpu::Queue,
    uniforms: wgpu::Buffer,
    vertices: wgpu::Buffer,
}

impl WgpuQueue {
    pub(crate) fn new(gpu: &WgpuDevice, serial: u64, format: PixelFormat) -> Self {
        let device = gpu.device();

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fxshape queue uniforms"),
            size: UNIFORM_SLOT_STRIDE * UNIFORM_SLOTS,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fxshape queue vertices"),
            size: MAX_VERTICES * std::mem::size_of::<Vertex2D>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            serial,
            created_for: format,
            queue: gpu.queue().clone(),
            uniforms,
            vertices,
        }
    }

    /// Process-unique number, for logs and diagnostics.
    #[inline]
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Format of the render that first created this queue.
    #[inline]
    pub fn created_for(&self) -> PixelFormat {
        self.created_for
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    #[inline]
    pub fn vertices(&self) -> &wgpu::Buffer {
        &self.vertices
    }

    /// Binding for uniform slot `slot`.
    pub fn uniform_binding(&self, slot: u64) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.uniforms,
            offset: slot * UNIFORM_SLOT_STRIDE,
            size: wgpu::BufferSize::new(OverlayUniforms::SIZE),
        })
    }

    pub fn write_uniforms(&self, slot: u64, uniforms: &OverlayUniforms) {
        debug_assert!(slot < UNIFORM_SLOTS);
        self.queue.write_buffer(
            &self.uniforms,
            slot * UNIFORM_SLOT_STRIDE,
            bytemuck::bytes_of(uniforms),
        );
    }

    /// Uploads `vertices`; returns how many fit.
    pub fn write_vertices(&self, vertices: &[Vertex2D]) -> u32 {
        let n = vertices.len().min(MAX_VERTICES as usize);
        if n > 0 {
            self.queue
                .write_buffer(&self.vertices, 0, bytemuck::cast_slice(&vertices[..n]));
        }
        n as u32
    }

    /// Submits the recorded commands.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
