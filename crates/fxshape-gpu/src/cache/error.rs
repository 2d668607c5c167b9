use thiserror::Error;

use crate::backend::GpuId;
use crate::format::PixelFormat;
use crate::pipeline::Purpose;

/// Failures surfaced by the device cache.
///
/// None of these leave partial state behind: a failed device is not cached,
/// a failed pipeline leaves its slot empty, a failed queue leaves the pool
/// untouched. The next call retries.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("GPU {gpu_id} is not available")]
    DeviceUnavailable {
        gpu_id: GpuId,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to build {} pipeline ({}) on GPU {gpu_id}", .purpose.name(), .format.name())]
    PipelineBuild {
        gpu_id: GpuId,
        purpose: Purpose,
        format: PixelFormat,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create a command queue on GPU {gpu_id}")]
    QueueCreation {
        gpu_id: GpuId,
        #[source]
        source: anyhow::Error,
    },
}

impl CacheError {
    /// GPU the failure belongs to.
    pub fn gpu_id(&self) -> GpuId {
        match self {
            CacheError::DeviceUnavailable { gpu_id, .. }
            | CacheError::PipelineBuild { gpu_id, .. }
            | CacheError::QueueCreation { gpu_id, .. } => *gpu_id,
        }
    }
}
