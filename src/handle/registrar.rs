//! Process-wide bookkeeping for automatic release.
//!
//! Every [`NativeHandle`](super::NativeHandle) registers a [`Cleanup`] token
//! when it is created. Dropping the last owner fires the token; an explicit
//! `free` stops it first. Both paths funnel into the handle's own atomic
//! release, so the token only decides whether the drop path runs at all.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static REGISTERED: AtomicU64 = AtomicU64::new(0);
static CANCELLED: AtomicU64 = AtomicU64::new(0);
static FINALIZED: AtomicU64 = AtomicU64::new(0);
static PANICKED: AtomicU64 = AtomicU64::new(0);

/// Snapshot of the registrar counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrarStats {
    /// Handles created
    pub registered: u64,
    /// Cleanups cancelled by an explicit `free`
    pub cancelled: u64,
    /// Handles released by the drop path
    pub finalized: u64,
    /// Drop-path releases that panicked and were swallowed
    pub panicked: u64,
}

/// Current counter values. Counters are global and only ever grow.
pub fn stats() -> RegistrarStats {
    RegistrarStats {
        registered: REGISTERED.load(Ordering::Relaxed),
        cancelled: CANCELLED.load(Ordering::Relaxed),
        finalized: FINALIZED.load(Ordering::Relaxed),
        panicked: PANICKED.load(Ordering::Relaxed),
    }
}

/// Pending automatic release of one handle.
#[derive(Debug)]
pub(crate) struct Cleanup {
    armed: AtomicBool,
}

impl Cleanup {
    pub(crate) fn register(kind: &'static str) -> Self {
        REGISTERED.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(kind, "registered native handle");
        Self {
            armed: AtomicBool::new(true),
        }
    }

    /// Cancel the pending release. No-op if it already ran or was cancelled.
    pub(crate) fn stop(&self) {
        if self.armed.swap(false, Ordering::AcqRel) {
            CANCELLED.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Claim the pending release. Returns `false` if it was cancelled.
    pub(crate) fn fire(&self) -> bool {
        self.armed.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

pub(crate) fn record_finalized() {
    FINALIZED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_panicked() {
    PANICKED.fetch_add(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_then_fire() {
        let cleanup = Cleanup::register("test");
        assert!(cleanup.is_armed());
        cleanup.stop();
        assert!(!cleanup.is_armed());
        assert!(!cleanup.fire());
    }

    #[test]
    fn test_fire_once() {
        let cleanup = Cleanup::register("test");
        assert!(cleanup.fire());
        assert!(!cleanup.fire());
        cleanup.stop();
    }

    #[test]
    fn test_counters_grow() {
        let before = stats();
        let cleanup = Cleanup::register("test");
        cleanup.stop();
        let after = stats();
        assert!(after.registered > before.registered);
        assert!(after.cancelled > before.cancelled);
    }
}
