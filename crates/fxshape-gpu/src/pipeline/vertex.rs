//! GPU-side vertex and uniform layouts shared by every overlay pipeline.

use bytemuck::{Pod, Zeroable};

// ── vertex ────────────────────────────────────────────────────────────────

/// Vertex used for the input image, the shape quad and OSC handles.
///
/// `position` is in output pixels (top-left origin, +Y down); the vertex
/// shaders convert to NDC using the viewport uniform.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex2D {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

impl Vertex2D {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x2  // tex_coord
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex2D>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }

    /// Two triangles covering `[min, max]`, texture coordinates `0..1`.
    pub fn quad(min: [f32; 2], max: [f32; 2]) -> [Vertex2D; 6] {
        let v = |x: f32, y: f32, u: f32, w: f32| Vertex2D {
            position: [x, y],
            tex_coord: [u, w],
        };
        let tl = v(min[0], min[1], 0.0, 0.0);
        let tr = v(max[0], min[1], 1.0, 0.0);
        let br = v(max[0], max[1], 1.0, 1.0);
        let bl = v(min[0], max[1], 0.0, 1.0);
        [tl, tr, br, tl, br, bl]
    }
}

// ── uniforms ──────────────────────────────────────────────────────────────

/// Byte distance between uniform slots inside a queue's uniform buffer.
///
/// Matches the default `min_uniform_buffer_offset_alignment`.
pub const UNIFORM_SLOT_STRIDE: u64 = 256;

/// Uniform block read by all three shaders (32 bytes).
///
///  offset  0  viewport    [f32; 2]
///  offset  8  shape_kind  u32       (0 = rectangle, 1 = ellipse)
///  offset 12  _pad        u32
///  offset 16  color       [f32; 4]  linear premultiplied
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct OverlayUniforms {
    pub viewport: [f32; 2],
    pub shape_kind: u32,
    pub _pad: u32,
    pub color: [f32; 4],
}

impl OverlayUniforms {
    pub const SIZE: u64 = std::mem::size_of::<OverlayUniforms>() as u64;
}
