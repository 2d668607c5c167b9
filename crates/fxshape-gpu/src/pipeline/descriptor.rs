use crate::format::PixelFormat;

use super::{Purpose, Vertex2D};

const IMAGE_SHADER: &str = include_str!("shaders/image.wgsl");
const SHAPE_SHADER: &str = include_str!("shaders/shape.wgsl");
const OSC_SHADER: &str = include_str!("shaders/osc.wgsl");

// ── blend ─────────────────────────────────────────────────────────────────

/// How the fragment output combines with the render target.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendMode {
    /// Output overwrites the target.
    Replace,
    /// Premultiplied-alpha "over" compositing.
    PremultipliedOver,
}

impl BlendMode {
    pub fn to_wgpu(self) -> Option<wgpu::BlendState> {
        match self {
            BlendMode::Replace => None,
            BlendMode::PremultipliedOver => {
                let over = wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                };
                Some(wgpu::BlendState {
                    color: over,
                    alpha: over,
                })
            }
        }
    }

    #[inline]
    pub fn is_blending(self) -> bool {
        self != BlendMode::Replace
    }
}

/// Color attachment configuration of a pipeline.
///
/// The format is an input of descriptor construction, not a property of the
/// shader program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ColorTargetConfig {
    pub format: PixelFormat,
    pub blend: BlendMode,
}

/// Resources bound at group 0.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BindingLayout {
    /// binding 0: `OverlayUniforms`.
    Uniforms,
    /// binding 0: `OverlayUniforms`, binding 1: unfilterable 2D input texture.
    UniformsAndInputImage,
}

/// Vertex buffer layout at slot 0.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexLayout {
    /// [`Vertex2D`]: pixel position and texture coordinate.
    Vertex2D,
}

impl VertexLayout {
    pub fn to_wgpu(self) -> wgpu::VertexBufferLayout<'static> {
        match self {
            VertexLayout::Vertex2D => Vertex2D::layout(),
        }
    }
}

/// Everything a backend needs to compile one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDescriptor {
    pub purpose: Purpose,
    pub label: String,
    pub shader_source: &'static str,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
    pub vertex_layout: VertexLayout,
    pub bindings: BindingLayout,
    pub color_target: ColorTargetConfig,
}

/// Static per-purpose pipeline descriptions.
pub struct PipelineDescriptorSet;

impl PipelineDescriptorSet {
    /// Builds the descriptor for `purpose` rendering into `format`.
    pub fn describe(purpose: Purpose, format: PixelFormat) -> PipelineDescriptor {
        let (shader_source, bindings, blend) = match purpose {
            Purpose::ImageComposite => (
                IMAGE_SHADER,
                BindingLayout::UniformsAndInputImage,
                BlendMode::Replace,
            ),
            Purpose::ShapeFill => (
                SHAPE_SHADER,
                BindingLayout::Uniforms,
                BlendMode::PremultipliedOver,
            ),
            Purpose::OnScreenControl => (
                OSC_SHADER,
                BindingLayout::Uniforms,
                BlendMode::PremultipliedOver,
            ),
        };

        PipelineDescriptor {
            purpose,
            label: format!("fxshape {} pipeline ({})", purpose.name(), format.name()),
            shader_source,
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            vertex_layout: VertexLayout::Vertex2D,
            bindings,
            color_target: ColorTargetConfig { format, blend },
        }
    }

    /// Format of the host's on-screen-control canvas.
    ///
    /// OSC drawing happens in a separate 8-bit pass that does not depend on
    /// the frame being rendered.
    #[inline]
    pub const fn osc_format() -> PixelFormat {
        PixelFormat::Rgba8Unorm
    }
}

/// Shorthand for [`PipelineDescriptorSet::describe`].
#[inline]
pub fn describe(purpose: Purpose, format: PixelFormat) -> PipelineDescriptor {
    PipelineDescriptorSet::describe(purpose, format)
}
