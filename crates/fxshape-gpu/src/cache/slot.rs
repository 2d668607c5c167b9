use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

/// A value built at most once, with fallible construction.
///
/// Reads after initialization are lock-free. Concurrent first callers are
/// serialized on `init`: the first one builds, the others wait and reuse its
/// result. A failed build leaves the slot empty so a later call can retry.
pub(crate) struct InitSlot<T> {
    value: OnceLock<Arc<T>>,
    init: Mutex<()>,
}

impl<T> InitSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            value: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Returns the value if it has been built. Never blocks.
    #[inline]
    pub(crate) fn get(&self) -> Option<Arc<T>> {
        self.value.get().cloned()
    }

    pub(crate) fn get_or_try_init<E, F>(&self, build: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(v) = self.value.get() {
            return Ok(v.clone());
        }

        let _guard = self.init.lock();

        // Another caller may have finished while we waited for the lock.
        if let Some(v) = self.value.get() {
            return Ok(v.clone());
        }

        let built = Arc::new(build()?);
        // Only the `init` holder writes, so the slot is still empty here.
        let _ = self.value.set(built.clone());
        Ok(built)
    }
}
