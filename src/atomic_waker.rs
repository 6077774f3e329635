//! Waker slot shared between the receive interrupt and an async reader.
//!
//! Only one future waits on a given ring buffer at a time, so a single slot is enough.

use core::{cell::Cell, task::Waker};
use critical_section::Mutex;

/// A waker registered by the consumer and taken by the producer.
pub(crate) struct AtomicWaker {
    waker: Mutex<Cell<Option<Waker>>>,
}

impl AtomicWaker {
    pub(crate) const fn new() -> Self {
        Self {
            waker: Mutex::new(Cell::new(None)),
        }
    }

    /// Register `new_waker`, replacing any previous one unless it would wake the same task.
    pub(crate) fn register(&self, new_waker: &Waker) {
        critical_section::with(|cs| {
            let slot = self.waker.borrow(cs);
            match slot.take() {
                Some(old) if old.will_wake(new_waker) => slot.set(Some(old)),
                _ => slot.set(Some(new_waker.clone())),
            }
        });
    }

    /// Wake the registered waker, if any. Called from the producer side.
    pub(crate) fn wake(&self) {
        // Wake outside the critical section.
        if let Some(w) = critical_section::with(|cs| self.waker.borrow(cs).take()) {
            w.wake();
        }
    }
}
