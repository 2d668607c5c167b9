//! FxShape GPU crate.
//!
//! This crate owns the GPU side of the shape overlay effect: the process-wide
//! device/resource cache that hands every render call a ready device,
//! pipeline and command queue, and the render path built on it.

pub mod backend;
pub mod cache;
pub mod device;
pub mod format;
pub mod logging;
pub mod pipeline;
pub mod render;

pub use backend::{GpuBackend, GpuId};
pub use cache::{device_cache, CacheError, DeviceCache, DeviceCacheEntry, QueueLease};
pub use format::{resolve_pixel_format, ComponentEncoding, FrameDescriptor, PixelFormat};
pub use pipeline::Purpose;
