// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::errors::ResolverError;

/// The one channel through which failures leave the lazy pipelines.
///
/// Iterators deep inside the search cannot return errors, so they record the
/// first one here and terminate; every subtree step and merge-fold iteration
/// checks `is_set` and observes an empty sequence afterwards. Cancellation is
/// tracked separately so that it survives the latch resets between the
/// debugger's trial resolutions.
#[derive(Default)]
pub(crate) struct ErrorLatch {
    tripped: AtomicBool,
    cancelled: AtomicBool,
    error: Mutex<Option<ResolverError>>,
}

impl ErrorLatch {
    pub(crate) fn new() -> ErrorLatch {
        ErrorLatch::default()
    }

    /// Records the first error; later ones are dropped.
    pub(crate) fn set(&self, error: ResolverError) {
        let mut slot = self.error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(error);
            self.tripped.store(true, Ordering::Release);
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn is_set(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.tripped.load(Ordering::Acquire)
    }

    /// The error the search should surface, cancellation taking precedence.
    pub(crate) fn current(&self) -> Option<ResolverError> {
        if self.is_cancelled() {
            return Some(ResolverError::Cancelled);
        }
        self.error.lock().unwrap().clone()
    }

    /// Clears any recorded error. Cancellation is sticky: once a resolver is
    /// cancelled it stays cancelled.
    pub(crate) fn reset(&self) {
        let mut slot = self.error.lock().unwrap();
        *slot = None;
        self.tripped.store(false, Ordering::Release);
    }
}
