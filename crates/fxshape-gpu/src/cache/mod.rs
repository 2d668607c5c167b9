//! GPU device/resource cache.
//!
//! Maps a [`GpuId`] to a [`DeviceCacheEntry`] holding the device, its
//! compiled pipelines and a pool of command queues.
//!
//! Locking discipline:
//! - registry `RwLock`: read for lookup, write only to insert an empty slot;
//!   never held while a device opens or a pipeline compiles
//! - per-key `InitSlot`: serializes first construction of one entry or one
//!   pipeline; other keys proceed
//! - per-entry pipeline map and queue pool mutexes: held for map/partition
//!   updates only
//!
//! Entries are never evicted. A GPU that disappears keeps its stale entry
//! until process exit.

mod entry;
mod error;
mod queue_pool;
mod slot;

#[cfg(test)]
mod mock;

pub use entry::DeviceCacheEntry;
pub use error::CacheError;
pub use queue_pool::{QueueId, QueueLease, QueuePool, QueuePoolStats};

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::backend::{GpuBackend, GpuId};
use crate::device::{DeviceInit, WgpuBackend};
use crate::format::{resolve_pixel_format, FrameDescriptor, PixelFormat};
use crate::pipeline::{PipelineDescriptorSet, Purpose};

use slot::InitSlot;

static DEVICE_CACHE: OnceLock<DeviceCache<WgpuBackend>> = OnceLock::new();

/// Process-wide cache backed by wgpu, created on first call.
pub fn device_cache() -> &'static DeviceCache<WgpuBackend> {
    DEVICE_CACHE.get_or_init(|| {
        log::debug!("creating process-wide device cache");
        DeviceCache::new(WgpuBackend::new(DeviceInit::default()))
    })
}

/// Registry of per-GPU entries; the façade used by the render path.
pub struct DeviceCache<B: GpuBackend> {
    backend: Arc<B>,
    entries: RwLock<HashMap<GpuId, Arc<InitSlot<DeviceCacheEntry<B>>>>>,
}

impl<B: GpuBackend> DeviceCache<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// See [`resolve_pixel_format`].
    #[inline]
    pub fn resolve_pixel_format(&self, frame: &FrameDescriptor) -> PixelFormat {
        resolve_pixel_format(frame)
    }

    /// Finds or creates the entry for `gpu_id`.
    ///
    /// Opening the device can fail; nothing is cached in that case and the
    /// next call tries again.
    pub fn entry(&self, gpu_id: GpuId) -> Result<Arc<DeviceCacheEntry<B>>, CacheError> {
        let slot = self.slot(gpu_id);
        let result = slot.get_or_try_init(|| {
            self.backend
                .open_device(gpu_id)
                .map(|device| {
                    log::info!("gpu {gpu_id}: device opened");
                    DeviceCacheEntry::new(gpu_id, Arc::clone(&self.backend), device)
                })
                .map_err(|source| CacheError::DeviceUnavailable { gpu_id, source })
        });
        if result.is_err() {
            self.discard_empty_slot(gpu_id, &slot);
        }
        result
    }

    fn slot(&self, gpu_id: GpuId) -> Arc<InitSlot<DeviceCacheEntry<B>>> {
        if let Some(slot) = self.entries.read().get(&gpu_id) {
            return Arc::clone(slot);
        }
        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(gpu_id)
                .or_insert_with(|| Arc::new(InitSlot::new())),
        )
    }

    /// Drops `slot` from the registry if it is still empty and no other caller
    /// holds it.
    ///
    /// Clones of a slot are only made under the registry lock, so with the
    /// write lock held a strong count of two (registry and `slot`) means no
    /// one is waiting to retry the build on it.
    fn discard_empty_slot(&self, gpu_id: GpuId, slot: &Arc<InitSlot<DeviceCacheEntry<B>>>) {
        let mut entries = self.entries.write();
        let unused = entries.get(&gpu_id).is_some_and(|current| {
            Arc::ptr_eq(current, slot) && current.get().is_none() && Arc::strong_count(slot) == 2
        });
        if unused {
            entries.remove(&gpu_id);
        }
    }

    #[cfg(test)]
    fn registry_len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn device(&self, gpu_id: GpuId) -> Result<Arc<B::Device>, CacheError> {
        Ok(self.entry(gpu_id)?.device())
    }

    pub fn pipeline(
        &self,
        purpose: Purpose,
        gpu_id: GpuId,
        format: PixelFormat,
    ) -> Result<Arc<B::Pipeline>, CacheError> {
        self.entry(gpu_id)?.pipeline(purpose, format)
    }

    /// On-screen-control pipeline for the host's 8-bit control canvas.
    pub fn osc_pipeline(&self, gpu_id: GpuId) -> Result<Arc<B::Pipeline>, CacheError> {
        self.pipeline(
            Purpose::OnScreenControl,
            gpu_id,
            PipelineDescriptorSet::osc_format(),
        )
    }

    /// Checks out a command queue for `gpu_id`.
    ///
    /// `format` is passed to queue construction only; the pool is shared by
    /// all formats.
    pub fn command_queue(
        &self,
        gpu_id: GpuId,
        format: PixelFormat,
    ) -> Result<QueueLease<B::Queue>, CacheError> {
        self.entry(gpu_id)?.checkout_queue(format)
    }

    /// Returns a queue to the entry that owns it.
    ///
    /// Dropping the lease has the same effect.
    pub fn return_command_queue(&self, lease: QueueLease<B::Queue>) {
        let owner = lease.owner();
        let entry = self.entries.read().get(&owner).and_then(|slot| slot.get());
        match entry {
            Some(entry) => entry.return_queue(lease),
            None => {
                log::warn!(
                    "command queue {:?} names unknown gpu {owner}; releasing to its pool",
                    lease.id()
                );
                drop(lease);
            }
        }
    }

    /// Number of GPUs with a live entry.
    pub fn entry_count(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockBackend, MockQueue};
    use super::*;

    use std::collections::HashSet;
    use std::sync::{mpsc, Barrier};
    use std::time::Duration;

    use parking_lot::Mutex;

    const G: GpuId = GpuId(0xABCD);
    const F8: PixelFormat = PixelFormat::Rgba8Unorm;
    const F16: PixelFormat = PixelFormat::Rgba16Float;
    const WAIT: Duration = Duration::from_secs(5);

    fn cache() -> DeviceCache<MockBackend> {
        DeviceCache::new(MockBackend::default())
    }

    // ── entry lifecycle ───────────────────────────────────────────────────

    #[test]
    fn device_is_created_once_per_gpu() {
        let cache = cache();
        let a = cache.device(G).unwrap();
        let b = cache.device(G).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.gpu_id, G);
        assert_eq!(cache.backend().devices_opened(), 1);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn distinct_gpus_get_distinct_entries() {
        let cache = cache();
        let a = cache.device(GpuId(1)).unwrap();
        let b = cache.device(GpuId(2)).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.entry_count(), 2);
    }

    #[test]
    fn unavailable_device_is_not_cached() {
        let cache = cache();
        cache.backend().set_unavailable(G, true);

        let err = cache.pipeline(Purpose::ShapeFill, G, F8).unwrap_err();
        assert!(matches!(err, CacheError::DeviceUnavailable { gpu_id, .. } if gpu_id == G));
        assert_eq!(cache.entry_count(), 0);

        // Device comes back: the retry succeeds normally.
        cache.backend().set_unavailable(G, false);
        assert!(cache.pipeline(Purpose::ShapeFill, G, F8).is_ok());
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn failed_lookups_leave_no_registry_slots() {
        let cache = cache();
        for raw in 0..1000 {
            cache.backend().set_unavailable(GpuId(raw), true);
            assert!(cache.device(GpuId(raw)).is_err());
        }
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.registry_len(), 0);

        cache.backend().set_unavailable(GpuId(7), false);
        cache.device(GpuId(7)).unwrap();
        assert_eq!(cache.registry_len(), 1);
    }

    #[test]
    fn slow_device_open_does_not_block_other_gpus() {
        let cache = &cache();
        let slow = cache.backend().gate_device(GpuId(1));

        std::thread::scope(|s| {
            let pending = s.spawn(|| cache.device(GpuId(1)));
            slow.entered.recv_timeout(WAIT).unwrap();

            let (done_tx, done_rx) = mpsc::channel();
            s.spawn(move || {
                let _ = done_tx.send(cache.device(GpuId(2)).is_ok());
            });
            let fast = done_rx.recv_timeout(WAIT);
            let still_pending = !pending.is_finished();
            slow.release.send(()).unwrap();

            assert_eq!(fast, Ok(true));
            assert!(still_pending);
            assert!(pending.join().unwrap().is_ok());
        });
        assert_eq!(cache.backend().devices_opened(), 2);
    }

    #[test]
    fn concurrent_first_lookup_opens_one_device() {
        const THREADS: usize = 8;
        let cache = DeviceCache::new(MockBackend::with_delay(Duration::from_millis(20)));
        let barrier = Barrier::new(THREADS);

        let devices: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.device(G).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.backend().devices_opened(), 1);
        assert!(devices.iter().all(|d| Arc::ptr_eq(d, &devices[0])));
    }

    // ── pipelines ─────────────────────────────────────────────────────────

    #[test]
    fn pipeline_scenario() {
        let cache = cache();

        let p1 = cache.pipeline(Purpose::ShapeFill, G, F8).unwrap();
        assert_eq!(cache.backend().pipelines_built(), 1);

        let again = cache.pipeline(Purpose::ShapeFill, G, F8).unwrap();
        assert!(Arc::ptr_eq(&p1, &again));
        assert_eq!(cache.backend().pipelines_built(), 1);

        let p2 = cache.pipeline(Purpose::ShapeFill, G, F16).unwrap();
        assert!(!Arc::ptr_eq(&p1, &p2));
        assert_eq!(p2.format, F16);
        assert_eq!(cache.backend().pipelines_built(), 2);

        let later = cache.pipeline(Purpose::ShapeFill, G, F8).unwrap();
        assert!(Arc::ptr_eq(&p1, &later));
        assert_eq!(cache.backend().pipelines_built(), 2);
        assert_eq!(cache.entry(G).unwrap().pipeline_count(), 2);
    }

    #[test]
    fn slow_pipeline_build_does_not_block_other_keys() {
        let cache = &cache();
        cache.device(G).unwrap();
        let slow = cache.backend().gate_pipeline(G, Purpose::ShapeFill, F8);

        std::thread::scope(|s| {
            let pending = s.spawn(|| cache.pipeline(Purpose::ShapeFill, G, F8));
            slow.entered.recv_timeout(WAIT).unwrap();

            let (done_tx, done_rx) = mpsc::channel();
            s.spawn(move || {
                let image = cache.pipeline(Purpose::ImageComposite, G, F8).is_ok();
                let other_format = cache.pipeline(Purpose::ShapeFill, G, F16).is_ok();
                let _ = done_tx.send(image && other_format);
            });
            let fast = done_rx.recv_timeout(WAIT);
            let still_pending = !pending.is_finished();
            slow.release.send(()).unwrap();

            assert_eq!(fast, Ok(true));
            assert!(still_pending);
            assert_eq!(pending.join().unwrap().unwrap().purpose, Purpose::ShapeFill);
        });
        assert_eq!(cache.entry(G).unwrap().pipeline_count(), 3);
    }

    #[test]
    fn purposes_are_cached_separately() {
        let cache = cache();
        let image = cache.pipeline(Purpose::ImageComposite, G, F8).unwrap();
        let shape = cache.pipeline(Purpose::ShapeFill, G, F8).unwrap();
        assert!(!Arc::ptr_eq(&image, &shape));
        assert_eq!(image.purpose, Purpose::ImageComposite);
        assert_eq!(shape.purpose, Purpose::ShapeFill);
    }

    #[test]
    fn osc_pipeline_uses_canvas_format() {
        let cache = cache();
        let osc = cache.osc_pipeline(G).unwrap();
        assert_eq!(osc.purpose, Purpose::OnScreenControl);
        assert_eq!(osc.format, PixelFormat::Rgba8Unorm);
        let direct = cache.pipeline(Purpose::OnScreenControl, G, F8).unwrap();
        assert!(Arc::ptr_eq(&osc, &direct));
    }

    #[test]
    fn concurrent_first_pipeline_request_builds_once() {
        const THREADS: usize = 16;
        let cache = DeviceCache::new(MockBackend::with_delay(Duration::from_millis(20)));
        let barrier = Barrier::new(THREADS);

        let pipelines: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.pipeline(Purpose::ShapeFill, G, F8).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.backend().pipelines_built(), 1);
        assert!(pipelines.iter().all(|p| Arc::ptr_eq(p, &pipelines[0])));
    }

    #[test]
    fn failed_build_is_retried() {
        let cache = cache();
        cache.backend().fail_pipeline(G, Purpose::ShapeFill, F16, true);

        let err = cache.pipeline(Purpose::ShapeFill, G, F16).unwrap_err();
        match err {
            CacheError::PipelineBuild { gpu_id, purpose, format, .. } => {
                assert_eq!((gpu_id, purpose, format), (G, Purpose::ShapeFill, F16));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cache.entry(G).unwrap().pipeline_count(), 0);

        // Other slots and the device are unaffected.
        assert!(cache.pipeline(Purpose::ShapeFill, G, F8).is_ok());
        assert_eq!(cache.backend().devices_opened(), 1);

        cache.backend().fail_pipeline(G, Purpose::ShapeFill, F16, false);
        assert!(cache.pipeline(Purpose::ShapeFill, G, F16).is_ok());
        assert_eq!(cache.entry(G).unwrap().pipeline_count(), 2);
    }

    #[test]
    fn build_failure_is_isolated_per_gpu() {
        let cache = cache();
        let g1 = GpuId(1);
        let g2 = GpuId(2);
        cache.backend().fail_pipeline(g1, Purpose::ShapeFill, F8, true);

        assert!(cache.pipeline(Purpose::ShapeFill, g1, F8).is_err());
        let p = cache.pipeline(Purpose::ShapeFill, g2, F8).unwrap();
        assert_eq!(p.gpu_id, g2);

        let lease = cache.command_queue(g2, F8).unwrap();
        assert_eq!(lease.owner(), g2);
    }

    // ── command queues ────────────────────────────────────────────────────

    #[test]
    fn sequential_renders_reuse_one_queue() {
        let cache = cache();
        for _ in 0..50 {
            let lease = cache.command_queue(G, F8).unwrap();
            cache.return_command_queue(lease);
        }
        assert_eq!(cache.backend().queues_created(), 1);
        assert_eq!(cache.entry(G).unwrap().queue_stats().live, 1);
    }

    #[test]
    fn queues_are_format_agnostic() {
        let cache = cache();
        drop(cache.command_queue(G, F8).unwrap());
        drop(cache.command_queue(G, F16).unwrap());
        assert_eq!(cache.backend().queues_created(), 1);
    }

    #[test]
    fn concurrent_renders_grow_to_high_water_mark_then_reuse() {
        const K: usize = 6;
        let cache = cache();
        let barrier = Barrier::new(K);

        std::thread::scope(|s| {
            for _ in 0..K {
                s.spawn(|| {
                    let lease = cache.command_queue(G, F8).unwrap();
                    // Everyone holds a queue at the same time.
                    barrier.wait();
                    cache.return_command_queue(lease);
                });
            }
        });

        assert_eq!(cache.backend().queues_created(), K);

        for _ in 0..20 {
            drop(cache.command_queue(G, F8).unwrap());
        }
        let stats = cache.entry(G).unwrap().queue_stats();
        assert_eq!(cache.backend().queues_created(), K);
        assert_eq!(
            stats,
            QueuePoolStats {
                live: K,
                available: K,
                checked_out: 0,
            }
        );
    }

    #[test]
    fn concurrent_queues_are_never_shared() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 200;
        let cache = cache();
        let held: Mutex<HashSet<u64>> = Mutex::new(HashSet::new());

        std::thread::scope(|s| {
            for t in 0..THREADS {
                let cache = &cache;
                let held = &held;
                s.spawn(move || {
                    let gpu = if t % 2 == 0 { G } else { GpuId(0x1234) };
                    for _ in 0..ROUNDS {
                        let lease = cache.command_queue(gpu, F8).unwrap();
                        let serial = lease.serial;
                        assert!(held.lock().insert(serial), "queue {serial} handed out twice");
                        std::thread::yield_now();
                        assert!(held.lock().remove(&serial));
                        cache.return_command_queue(lease);
                    }
                });
            }
        });

        assert!(held.lock().is_empty());
        for gpu in [G, GpuId(0x1234)] {
            let stats = cache.entry(gpu).unwrap().queue_stats();
            assert_eq!(stats.checked_out, 0);
            assert!(stats.live <= THREADS);
        }
    }

    #[test]
    fn queue_creation_failure_leaves_pool_unchanged() {
        let cache = cache();
        let kept = cache.command_queue(G, F8).unwrap();
        let before = cache.entry(G).unwrap().queue_stats();

        cache.backend().fail_queues(G, true);
        let err = cache.command_queue(G, F8).unwrap_err();
        assert!(matches!(err, CacheError::QueueCreation { gpu_id, .. } if gpu_id == G));
        assert_eq!(cache.entry(G).unwrap().queue_stats(), before);

        // An available queue is still handed out without creating one.
        drop(kept);
        assert!(cache.command_queue(G, F8).is_ok());
    }

    #[test]
    fn lease_returned_to_wrong_entry_goes_home() {
        let cache = cache();
        let g1 = GpuId(1);
        let g2 = GpuId(2);
        let lease = cache.command_queue(g1, F8).unwrap();
        let e1 = cache.entry(g1).unwrap();
        let e2 = cache.entry(g2).unwrap();

        e2.return_queue(lease);

        assert_eq!(
            e1.queue_stats(),
            QueuePoolStats {
                live: 1,
                available: 1,
                checked_out: 0,
            }
        );
        assert_eq!(e2.queue_stats(), QueuePoolStats::default());
    }

    #[test]
    fn leases_work_across_threads() {
        let cache = cache();
        let lease: QueueLease<MockQueue> = cache.command_queue(G, F8).unwrap();
        std::thread::scope(|s| {
            s.spawn(|| cache.return_command_queue(lease));
        });
        assert_eq!(cache.entry(G).unwrap().queue_stats().available, 1);
    }

    // ── façade ────────────────────────────────────────────────────────────

    #[test]
    fn resolve_pixel_format_delegates() {
        let cache = cache();
        assert_eq!(
            cache.resolve_pixel_format(&FrameDescriptor::float32()),
            PixelFormat::Rgba32Float
        );
        assert_eq!(cache.entry_count(), 0);
    }
}
