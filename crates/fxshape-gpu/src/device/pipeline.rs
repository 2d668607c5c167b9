use anyhow::{bail, Result};

use crate::format::PixelFormat;
use crate::pipeline::{BindingLayout, OverlayUniforms, PipelineDescriptor, Purpose};

use super::WgpuDevice;

/// Compiled render pipeline plus the bind-group layout its group 0 expects.
pub struct WgpuPipeline {
    purpose: Purpose,
    format: PixelFormat,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl WgpuPipeline {
    #[inline]
    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    #[inline]
    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }
}

pub(crate) fn build(gpu: &WgpuDevice, desc: &PipelineDescriptor) -> Result<WgpuPipeline> {
    let target = desc.color_target;
    if !gpu.supports_target(target.format, target.blend.is_blending()) {
        bail!(
            "{} is not a {}render target on {}",
            target.format.name(),
            if target.blend.is_blending() { "blendable " } else { "" },
            gpu.info().name
        );
    }

    let device = gpu.device();

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&desc.label),
        source: wgpu::ShaderSource::Wgsl(desc.shader_source.into()),
    });

    let info = pollster::block_on(shader.get_compilation_info());
    let errors: Vec<&str> = info
        .messages
        .iter()
        .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
        .map(|m| m.message.as_str())
        .collect();
    if !errors.is_empty() {
        bail!("shader compilation failed: {}", errors.join("; "));
    }

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&desc.label),
        entries: &bind_group_entries(desc.bindings),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&desc.label),
        bind_group_layouts: &[&bind_group_layout],
        immediate_size: 0,
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&desc.label),
        layout: Some(&pipeline_layout),

        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some(desc.vertex_entry),
            compilation_options: Default::default(),
            buffers: &[desc.vertex_layout.to_wgpu()],
        },

        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some(desc.fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: target.format.to_wgpu(),
                blend: target.blend.to_wgpu(),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    Ok(WgpuPipeline {
        purpose: desc.purpose,
        format: target.format,
        pipeline,
        bind_group_layout,
    })
}

fn bind_group_entries(layout: BindingLayout) -> Vec<wgpu::BindGroupLayoutEntry> {
    let uniforms = wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(OverlayUniforms::SIZE),
        },
        count: None,
    };

    match layout {
        BindingLayout::Uniforms => vec![uniforms],
        BindingLayout::UniformsAndInputImage => vec![
            uniforms,
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    // Loaded with `textureLoad`, so float32 inputs work too.
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
        ],
    }
}
