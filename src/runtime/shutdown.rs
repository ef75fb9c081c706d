//! Cancellation token for the event loop.
//!
//! Cloneable and `Send`: a signal thread or a test can request a stop while the
//! loop is blocked in `wait`. Every attached waker is poked so the blocked
//! wait returns within one cycle.

use mio::Waker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Debug, Default)]
struct Inner {
    stop: AtomicBool,
    wakers: Mutex<Vec<Arc<Waker>>>,
}

/// Shared stop flag plus the wakers of the loops observing it.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every attached loop to stop.
    pub fn request_stop(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);

        let wakers = match self.inner.wakers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for waker in wakers.iter() {
            if let Err(e) = waker.wake() {
                warn!(error = %e, "Failed to wake event loop");
            }
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.stop.load(Ordering::SeqCst)
    }

    /// Attach a loop's waker so `request_stop` can interrupt its wait.
    pub(crate) fn attach(&self, waker: Arc<Waker>) {
        let mut wakers = match self.inner.wakers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        wakers.push(waker);
    }
}
