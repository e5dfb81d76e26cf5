//! Concurrent stream limit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Caps the number of concurrently open streams.
#[derive(Debug)]
pub struct SessionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl SessionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Take a slot, or `None` when the limit is reached.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SessionPermit> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(SessionPermit {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// Slot held by one stream; released on drop.
#[derive(Debug)]
pub struct SessionPermit {
    limiter: Arc<SessionLimiter>,
}

impl Drop for SessionPermit {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}
