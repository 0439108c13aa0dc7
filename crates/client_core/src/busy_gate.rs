use std::sync::atomic::{AtomicBool, Ordering};

/// Single-flight flag for the create path.
///
/// A second caller is turned away rather than queued. The flag is cleared when
/// the returned [`BusyPermit`] drops, so every exit path of the guarded action
/// (including cancellation of its future) releases it.
#[derive(Debug, Default)]
pub struct BusyGate {
    busy: AtomicBool,
}

impl BusyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<BusyPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyPermit { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[must_use = "the gate is released as soon as the permit is dropped"]
pub struct BusyPermit<'a> {
    gate: &'a BusyGate,
}

impl Drop for BusyPermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
