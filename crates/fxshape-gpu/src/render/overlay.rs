use anyhow::{Context, Result};

use crate::backend::GpuId;
use crate::cache::{device_cache, DeviceCache};
use crate::device::WgpuBackend;
use crate::format::FrameDescriptor;
use crate::pipeline::{OverlayUniforms, Purpose, Vertex2D};

use super::shape::ShapeParams;

/// Edge length of an on-screen-control handle, in pixels.
pub const HANDLE_SIZE: f32 = 10.0;

/// One frame of the effect.
pub struct OverlayFrame<'a> {
    /// Host description of the output tile; decides the pixel format.
    pub frame: FrameDescriptor,
    /// Source image. Sampled with `textureLoad`, any float-readable format.
    pub input: &'a wgpu::TextureView,
    /// Render target; its format must match the resolved pixel format.
    pub output: &'a wgpu::TextureView,
    /// Output size in pixels.
    pub size: [f32; 2],
    pub shape: ShapeParams,
    /// Linear premultiplied RGBA.
    pub color: [f32; 4],
}

/// On-screen-control drawing into the host's 8-bit canvas.
pub struct ControlFrame<'a> {
    pub canvas: &'a wgpu::TextureView,
    pub size: [f32; 2],
    pub shape: ShapeParams,
    /// Linear premultiplied RGBA.
    pub color: [f32; 4],
}

/// Render path: takes device, pipelines and a queue from the cache per call.
///
/// Holds no GPU state of its own, so one renderer can serve any number of
/// threads and GPUs.
#[derive(Clone, Copy)]
pub struct OverlayRenderer<'c> {
    cache: &'c DeviceCache<WgpuBackend>,
}

impl OverlayRenderer<'static> {
    /// Renderer over the process-wide cache.
    pub fn global() -> Self {
        Self::new(device_cache())
    }
}

impl<'c> OverlayRenderer<'c> {
    pub fn new(cache: &'c DeviceCache<WgpuBackend>) -> Self {
        Self { cache }
    }

    /// Copies the input into the output and fills the shape over it.
    pub fn render(&self, gpu_id: GpuId, frame: &OverlayFrame<'_>) -> Result<()> {
        let cache = self.cache;
        let format = cache.resolve_pixel_format(&frame.frame);

        let gpu = cache.device(gpu_id).context("render: no device")?;
        let image = cache
            .pipeline(Purpose::ImageComposite, gpu_id, format)
            .context("render: image pipeline")?;
        let shape = cache
            .pipeline(Purpose::ShapeFill, gpu_id, format)
            .context("render: shape pipeline")?;

        // Returned to the pool on every exit path below.
        let queue = cache
            .command_queue(gpu_id, format)
            .context("render: no command queue")?;

        let (min, max) = frame.shape.bounds();
        let mut vertices = Vec::with_capacity(12);
        vertices.extend(Vertex2D::quad([0.0, 0.0], frame.size));
        vertices.extend(Vertex2D::quad(min, max));
        queue.write_vertices(&vertices);
        queue.write_uniforms(
            0,
            &OverlayUniforms {
                viewport: frame.size,
                shape_kind: frame.shape.kind(),
                _pad: 0,
                color: frame.color,
            },
        );

        let device = gpu.device();
        let image_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fxshape image bind group"),
            layout: image.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: queue.uniform_binding(0),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(frame.input),
                },
            ],
        });
        let shape_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fxshape shape bind group"),
            layout: shape.bind_group_layout(),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: queue.uniform_binding(0),
            }],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("fxshape frame encoder"),
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("fxshape overlay pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame.output,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_vertex_buffer(0, queue.vertices().slice(..));

            rpass.set_pipeline(image.pipeline());
            rpass.set_bind_group(0, &image_bind_group, &[]);
            rpass.draw(0..6, 0..1);

            if !frame.shape.is_empty() {
                rpass.set_pipeline(shape.pipeline());
                rpass.set_bind_group(0, &shape_bind_group, &[]);
                rpass.draw(6..12, 0..1);
            }
        }

        queue.submit(encoder);
        log::trace!("gpu {gpu_id}: frame submitted on queue {}", queue.serial());
        cache.return_command_queue(queue);
        Ok(())
    }

    /// Draws one handle per shape parameter on top of the canvas contents.
    pub fn render_controls(&self, gpu_id: GpuId, frame: &ControlFrame<'_>) -> Result<()> {
        let cache = self.cache;
        let gpu = cache.device(gpu_id).context("controls: no device")?;
        let osc = cache.osc_pipeline(gpu_id).context("controls: osc pipeline")?;
        let queue = cache
            .command_queue(gpu_id, osc.format())
            .context("controls: no command queue")?;

        let half = HANDLE_SIZE * 0.5;
        let vertices: Vec<Vertex2D> = frame
            .shape
            .handles()
            .into_iter()
            .flat_map(|(_, [x, y])| Vertex2D::quad([x - half, y - half], [x + half, y + half]))
            .collect();
        let count = queue.write_vertices(&vertices);
        queue.write_uniforms(
            1,
            &OverlayUniforms {
                viewport: frame.size,
                shape_kind: frame.shape.kind(),
                _pad: 0,
                color: frame.color,
            },
        );

        let device = gpu.device();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fxshape osc bind group"),
            layout: osc.bind_group_layout(),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: queue.uniform_binding(1),
            }],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("fxshape osc encoder"),
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("fxshape osc pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame.canvas,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(osc.pipeline());
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, queue.vertices().slice(..));
            rpass.draw(0..count, 0..1);
        }

        queue.submit(encoder);
        cache.return_command_queue(queue);
        Ok(())
    }
}
