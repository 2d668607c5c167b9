use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{GpuBackend, GpuId};
use crate::format::PixelFormat;
use crate::pipeline::{describe, PipelineKey, Purpose};

use super::error::CacheError;
use super::queue_pool::{QueueLease, QueuePool, QueuePoolStats};
use super::slot::InitSlot;

/// Everything cached for one physical GPU.
///
/// Owns the device, the pipelines built for it and its command-queue pool.
/// There is no back-reference to the host; the entry lives as long as the
/// cache that created it.
pub struct DeviceCacheEntry<B: GpuBackend> {
    gpu_id: GpuId,
    backend: Arc<B>,
    device: Arc<B::Device>,

    /// Guarded separately from the registry; held only to find or insert a
    /// slot, never while a pipeline compiles.
    pipelines: Mutex<HashMap<PipelineKey, Arc<InitSlot<B::Pipeline>>>>,

    queues: Arc<QueuePool<B::Queue>>,
}

impl<B: GpuBackend> DeviceCacheEntry<B> {
    pub(crate) fn new(gpu_id: GpuId, backend: Arc<B>, device: B::Device) -> Self {
        Self {
            gpu_id,
            backend,
            device: Arc::new(device),
            pipelines: Mutex::new(HashMap::new()),
            queues: Arc::new(QueuePool::new(gpu_id)),
        }
    }

    #[inline]
    pub fn gpu_id(&self) -> GpuId {
        self.gpu_id
    }

    #[inline]
    pub fn device(&self) -> Arc<B::Device> {
        Arc::clone(&self.device)
    }

    /// Returns the pipeline for `(purpose, format)`, compiling it on first use.
    ///
    /// Concurrent first requests for the same key compile once; requests for
    /// other keys are not blocked by the compile. A failed compile is not
    /// cached.
    pub fn pipeline(
        &self,
        purpose: Purpose,
        format: PixelFormat,
    ) -> Result<Arc<B::Pipeline>, CacheError> {
        let key = PipelineKey::new(purpose, format);
        let slot = {
            let mut pipelines = self.pipelines.lock();
            Arc::clone(
                pipelines
                    .entry(key)
                    .or_insert_with(|| Arc::new(InitSlot::new())),
            )
        };

        slot.get_or_try_init(|| {
            log::debug!(
                "gpu {}: building {} pipeline ({})",
                self.gpu_id,
                purpose.name(),
                format.name()
            );
            let descriptor = describe(purpose, format);
            self.backend.build_pipeline(&self.device, &descriptor)
        })
        .map_err(|source| {
            log::debug!(
                "gpu {}: {} pipeline ({}) failed: {source:#}",
                self.gpu_id,
                purpose.name(),
                format.name()
            );
            CacheError::PipelineBuild {
                gpu_id: self.gpu_id,
                purpose,
                format,
                source,
            }
        })
    }

    /// Number of pipelines built so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines
            .lock()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    /// Checks out a command queue, creating one if none is available.
    pub fn checkout_queue(&self, format: PixelFormat) -> Result<QueueLease<B::Queue>, CacheError> {
        self.queues
            .checkout(|| self.backend.create_queue(&self.device, format))
            .map_err(|source| CacheError::QueueCreation {
                gpu_id: self.gpu_id,
                source,
            })
    }

    /// Returns a queue to this entry's pool.
    ///
    /// A lease owned by another entry is logged and sent back to its own
    /// pool instead.
    pub fn return_queue(&self, lease: QueueLease<B::Queue>) {
        if !lease.belongs_to(&self.queues) {
            log::warn!(
                "gpu {}: command queue {:?} belongs to gpu {}; returning it to its owner",
                self.gpu_id,
                lease.id(),
                lease.owner()
            );
        }
        drop(lease);
    }

    pub fn queue_stats(&self) -> QueuePoolStats {
        self.queues.stats()
    }
}
