//! Counting backend used by the cache tests; needs no GPU.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{bail, Result};
use parking_lot::Mutex;

use crate::backend::{GpuBackend, GpuId};
use crate::format::PixelFormat;
use crate::pipeline::{PipelineDescriptor, Purpose};

#[derive(Debug)]
pub(crate) struct MockDevice {
    pub gpu_id: GpuId,
}

#[derive(Debug)]
pub(crate) struct MockPipeline {
    pub gpu_id: GpuId,
    pub purpose: Purpose,
    pub format: PixelFormat,
}

#[derive(Debug)]
pub(crate) struct MockQueue {
    pub serial: u64,
}

/// Test side of a gated backend call.
///
/// `entered` fires once the call is in flight; the call then blocks until
/// `release` is sent to or dropped.
pub(crate) struct GateHandle {
    pub entered: mpsc::Receiver<()>,
    pub release: mpsc::Sender<()>,
}

struct Gate {
    entered: mpsc::Sender<()>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl Gate {
    fn new() -> (Self, GateHandle) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Gate {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        };
        let handle = GateHandle {
            entered: entered_rx,
            release: release_tx,
        };
        (gate, handle)
    }

    fn pass(&self) {
        let _ = self.entered.send(());
        let _ = self.release.lock().recv();
    }
}

type PipelineKey = (GpuId, Purpose, PixelFormat);

#[derive(Default)]
pub(crate) struct MockBackend {
    delay: Duration,
    devices_opened: AtomicUsize,
    pipelines_built: AtomicUsize,
    queues_created: AtomicUsize,
    next_queue: AtomicU64,
    unavailable: Mutex<HashSet<GpuId>>,
    failing_pipelines: Mutex<HashSet<PipelineKey>>,
    failing_queues: Mutex<HashSet<GpuId>>,
    device_gates: Mutex<HashMap<GpuId, Gate>>,
    pipeline_gates: Mutex<HashMap<PipelineKey, Gate>>,
}

impl MockBackend {
    /// Device opens and pipeline builds sleep for `delay`, widening race windows.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn devices_opened(&self) -> usize {
        self.devices_opened.load(Ordering::SeqCst)
    }

    pub fn pipelines_built(&self) -> usize {
        self.pipelines_built.load(Ordering::SeqCst)
    }

    pub fn queues_created(&self) -> usize {
        self.queues_created.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, gpu_id: GpuId, unavailable: bool) {
        toggle(&self.unavailable, gpu_id, unavailable);
    }

    pub fn fail_pipeline(
        &self,
        gpu_id: GpuId,
        purpose: Purpose,
        format: PixelFormat,
        fail: bool,
    ) {
        toggle(&self.failing_pipelines, (gpu_id, purpose, format), fail);
    }

    pub fn fail_queues(&self, gpu_id: GpuId, fail: bool) {
        toggle(&self.failing_queues, gpu_id, fail);
    }

    /// Holds the next device open for `gpu_id` until released.
    pub fn gate_device(&self, gpu_id: GpuId) -> GateHandle {
        let (gate, handle) = Gate::new();
        self.device_gates.lock().insert(gpu_id, gate);
        handle
    }

    /// Holds the next build of `(gpu_id, purpose, format)` until released.
    pub fn gate_pipeline(
        &self,
        gpu_id: GpuId,
        purpose: Purpose,
        format: PixelFormat,
    ) -> GateHandle {
        let (gate, handle) = Gate::new();
        self.pipeline_gates
            .lock()
            .insert((gpu_id, purpose, format), gate);
        handle
    }

    fn pause(&self) {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

fn toggle<K: Eq + std::hash::Hash>(set: &Mutex<HashSet<K>>, key: K, on: bool) {
    let mut set = set.lock();
    if on {
        set.insert(key);
    } else {
        set.remove(&key);
    }
}

impl GpuBackend for MockBackend {
    type Device = MockDevice;
    type Pipeline = MockPipeline;
    type Queue = MockQueue;

    fn open_device(&self, gpu_id: GpuId) -> Result<MockDevice> {
        self.pause();
        let gate = self.device_gates.lock().remove(&gpu_id);
        if let Some(gate) = gate {
            gate.pass();
        }
        if self.unavailable.lock().contains(&gpu_id) {
            bail!("no adapter with id {gpu_id}");
        }
        self.devices_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockDevice { gpu_id })
    }

    fn build_pipeline(
        &self,
        device: &MockDevice,
        descriptor: &PipelineDescriptor,
    ) -> Result<MockPipeline> {
        self.pause();
        let format = descriptor.color_target.format;
        let key = (device.gpu_id, descriptor.purpose, format);
        let gate = self.pipeline_gates.lock().remove(&key);
        if let Some(gate) = gate {
            gate.pass();
        }
        if self.failing_pipelines.lock().contains(&key) {
            bail!("{} is not renderable", format.name());
        }
        self.pipelines_built.fetch_add(1, Ordering::SeqCst);
        Ok(MockPipeline {
            gpu_id: device.gpu_id,
            purpose: descriptor.purpose,
            format,
        })
    }

    fn create_queue(&self, device: &MockDevice, _format: PixelFormat) -> Result<MockQueue> {
        if self.failing_queues.lock().contains(&device.gpu_id) {
            bail!("queue allocation failed");
        }
        self.queues_created.fetch_add(1, Ordering::SeqCst);
        Ok(MockQueue {
            serial: self.next_queue.fetch_add(1, Ordering::SeqCst),
        })
    }
}
