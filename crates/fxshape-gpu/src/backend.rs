//! Collaborator contract consumed by the device cache.
//!
//! The cache never talks to a graphics API directly. A backend knows how to
//! open a device for a GPU identifier, compile a pipeline descriptor, and
//! create a command queue. [`crate::device::WgpuBackend`] is the production
//! implementation.

use std::fmt;

use anyhow::Result;

use crate::format::PixelFormat;
use crate::pipeline::PipelineDescriptor;

/// Opaque, stable identifier of one physical GPU.
///
/// Supplied by the host per frame. Unique per device for the lifetime of the
/// process; a device may appear or disappear between calls.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct GpuId(pub u64);

impl GpuId {
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for GpuId {
    #[inline]
    fn from(raw: u64) -> Self {
        GpuId(raw)
    }
}

impl fmt::Debug for GpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuId({:#x})", self.0)
    }
}

impl fmt::Display for GpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Device, pipeline and queue constructors for one graphics API.
///
/// Implementations must be callable from any render thread. Construction
/// failures are reported with `anyhow` and classified by the cache.
pub trait GpuBackend: Send + Sync + 'static {
    /// Device handle; shared by every render call on that GPU.
    type Device: Send + Sync + 'static;
    /// Compiled, immutable pipeline object.
    type Pipeline: Send + Sync + 'static;
    /// Stateful submission context; used by one render call at a time.
    type Queue: Send + 'static;

    /// Opens the device named by `gpu_id`.
    fn open_device(&self, gpu_id: GpuId) -> Result<Self::Device>;

    /// Compiles `descriptor` for `device`.
    fn build_pipeline(
        &self,
        device: &Self::Device,
        descriptor: &PipelineDescriptor,
    ) -> Result<Self::Pipeline>;

    /// Creates a new command queue on `device`.
    fn create_queue(&self, device: &Self::Device, format: PixelFormat) -> Result<Self::Queue>;
}
