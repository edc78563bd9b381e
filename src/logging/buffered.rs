//! Buffered sink for parallel target execution.
use std::sync::{Arc, Mutex, PoisonError};

use super::types::{BuildEvent, EventSink};

/// Holds one target's events until the target completes.
///
/// Parallel targets each get their own buffer so their output never
/// interleaves. [`flush`](Self::flush) replays the buffer into the shared
/// sink under a lock shared by all buffers of the build.
pub struct BufferedSink {
    inner: Arc<dyn EventSink>,
    flush_lock: Arc<Mutex<()>>,
    entries: Mutex<Vec<BuildEvent>>,
}

impl std::fmt::Debug for BufferedSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedSink")
            .field("buffered", &self.len())
            .finish_non_exhaustive()
    }
}

impl BufferedSink {
    /// Create a buffer in front of `inner`.
    #[must_use]
    pub const fn new(inner: Arc<dyn EventSink>, flush_lock: Arc<Mutex<()>>) -> Self {
        Self {
            inner,
            flush_lock,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Number of events waiting to be flushed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |g| g.len())
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replay buffered events into the inner sink, in emission order.
    pub fn flush(&self) {
        let _guard = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = match self.entries.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        for event in entries {
            self.inner.emit(event);
        }
    }
}

impl EventSink for BufferedSink {
    fn emit(&self, event: BuildEvent) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(event);
        }
    }
}
