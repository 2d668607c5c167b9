//! Pipeline purposes and their static descriptors.
//!
//! A pipeline is identified by `(Purpose, PixelFormat)` within a device. The
//! descriptor set here is pure data; compiling it is the backend's job.

mod descriptor;
mod vertex;

pub use descriptor::{
    describe, BindingLayout, BlendMode, ColorTargetConfig, PipelineDescriptor,
    PipelineDescriptorSet, VertexLayout,
};
pub use vertex::{OverlayUniforms, Vertex2D, UNIFORM_SLOT_STRIDE};

use crate::format::PixelFormat;

/// Rendering use-case a pipeline is built for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Purpose {
    /// Copies the input image into the output.
    ImageComposite,
    /// Fills the rectangle or ellipse.
    ShapeFill,
    /// Draws interactive on-screen-control handles.
    OnScreenControl,
}

impl Purpose {
    pub const ALL: [Purpose; 3] = [
        Purpose::ImageComposite,
        Purpose::ShapeFill,
        Purpose::OnScreenControl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Purpose::ImageComposite => "image",
            Purpose::ShapeFill => "shape",
            Purpose::OnScreenControl => "osc",
        }
    }
}

/// Per-device pipeline cache key.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PipelineKey {
    pub purpose: Purpose,
    pub format: PixelFormat,
}

impl PipelineKey {
    #[inline]
    pub const fn new(purpose: Purpose, format: PixelFormat) -> Self {
        Self { purpose, format }
    }
}
