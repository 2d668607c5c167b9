//! Render path.
//!
//! Consumes the device cache once per frame: resolve the pixel format, take
//! the device and pipelines, check out a command queue, draw, return the
//! queue.
//!
//! Convention:
//! - CPU geometry is in output pixels (top-left origin, +Y down).
//! - Vertex shaders convert to NDC using the viewport uniform.

mod overlay;
mod shape;

pub use overlay::{ControlFrame, OverlayFrame, OverlayRenderer, HANDLE_SIZE};
pub use shape::{ParamId, ShapeParams};
