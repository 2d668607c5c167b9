use std::collections::HashSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::GpuId;

/// Identifier of a queue within its pool.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct QueueId(pub(crate) u64);

/// Snapshot of a pool's occupancy.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct QueuePoolStats {
    /// Queues created so far. Never decreases.
    pub live: usize,
    pub available: usize,
    pub checked_out: usize,
}

struct PoolState<Q> {
    available: Vec<(QueueId, Q)>,
    checked_out: HashSet<QueueId>,
    next_id: u64,
}

/// Per-device pool of reusable command queues.
///
/// Grows to the high-water mark of concurrent checkouts and never shrinks.
/// The lock is held only to move queues between the two partitions; queue
/// construction happens outside it.
pub struct QueuePool<Q> {
    owner: GpuId,
    state: Mutex<PoolState<Q>>,
}

impl<Q> QueuePool<Q> {
    pub(crate) fn new(owner: GpuId) -> Self {
        Self {
            owner,
            state: Mutex::new(PoolState {
                available: Vec::new(),
                checked_out: HashSet::new(),
                next_id: 0,
            }),
        }
    }

    #[inline]
    pub fn owner(&self) -> GpuId {
        self.owner
    }

    pub fn stats(&self) -> QueuePoolStats {
        let state = self.state.lock();
        let available = state.available.len();
        let checked_out = state.checked_out.len();
        QueuePoolStats {
            live: available + checked_out,
            available,
            checked_out,
        }
    }

    /// Hands out an available queue, or one built by `create` if none is free.
    ///
    /// A failing `create` leaves the pool untouched.
    pub(crate) fn checkout<E, F>(self: &Arc<Self>, create: F) -> Result<QueueLease<Q>, E>
    where
        F: FnOnce() -> Result<Q, E>,
    {
        if let Some((id, queue)) = self.pop_available() {
            return Ok(self.lease(id, queue));
        }

        let queue = create()?;

        let id = {
            let mut state = self.state.lock();
            let id = QueueId(state.next_id);
            state.next_id += 1;
            state.checked_out.insert(id);
            id
        };
        log::debug!("gpu {}: created command queue {:?}", self.owner, id);
        Ok(self.lease(id, queue))
    }

    fn pop_available(&self) -> Option<(QueueId, Q)> {
        let mut state = self.state.lock();
        let (id, queue) = state.available.pop()?;
        state.checked_out.insert(id);
        Some((id, queue))
    }

    fn lease(self: &Arc<Self>, id: QueueId, queue: Q) -> QueueLease<Q> {
        QueueLease {
            id,
            queue: Some(queue),
            pool: Arc::clone(self),
        }
    }

    /// Moves a queue back to the available partition.
    ///
    /// An id that is not currently checked out is a caller bug; it is logged
    /// and the queue is discarded so the pool never holds duplicates.
    fn release(&self, id: QueueId, queue: Q) {
        let mut state = self.state.lock();
        if !state.checked_out.remove(&id) {
            drop(state);
            log::warn!(
                "gpu {}: command queue {:?} returned but not checked out; ignored",
                self.owner,
                id
            );
            return;
        }
        state.available.push((id, queue));
    }
}

/// A checked-out command queue.
///
/// Exclusive to its holder until dropped or handed to
/// [`DeviceCache::return_command_queue`](crate::cache::DeviceCache::return_command_queue);
/// either way the queue goes back to the pool it came from, on every exit
/// path.
pub struct QueueLease<Q> {
    id: QueueId,
    queue: Option<Q>,
    pool: Arc<QueuePool<Q>>,
}

impl<Q> QueueLease<Q> {
    #[inline]
    pub fn id(&self) -> QueueId {
        self.id
    }

    /// GPU whose pool owns this queue.
    #[inline]
    pub fn owner(&self) -> GpuId {
        self.pool.owner
    }

    #[inline]
    pub(crate) fn belongs_to(&self, pool: &Arc<QueuePool<Q>>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }
}

impl<Q> Deref for QueueLease<Q> {
    type Target = Q;

    fn deref(&self) -> &Q {
        // Only `drop` takes the queue out.
        match self.queue.as_ref() {
            Some(q) => q,
            None => unreachable!("queue lease used after release"),
        }
    }
}

impl<Q> DerefMut for QueueLease<Q> {
    fn deref_mut(&mut self) -> &mut Q {
        match self.queue.as_mut() {
            Some(q) => q,
            None => unreachable!("queue lease used after release"),
        }
    }
}

impl<Q> Drop for QueueLease<Q> {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.take() {
            self.pool.release(self.id, queue);
        }
    }
}

impl<Q> fmt::Debug for QueueLease<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueLease")
            .field("id", &self.id)
            .field("owner", &self.pool.owner)
            .finish()
    }
}
