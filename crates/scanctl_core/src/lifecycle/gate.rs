use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const CLOSED: u64 = 0;

/// Epoch-tagged gate for engine event delivery.
///
/// Intended use (adapter layer):
/// - `open(epoch)` when a running period starts
/// - `close()` when leaving `Running`
/// - event forwarders check `admits(epoch)` with the epoch the event was tagged with,
///   so events queued during an earlier running period are dropped
#[derive(Debug)]
pub struct DeliveryGate {
    epoch: AtomicU64,
}

impl DeliveryGate {
    pub const fn new() -> Self {
        Self {
            epoch: AtomicU64::new(CLOSED),
        }
    }

    /// Open the gate for `epoch`. Epoch 0 is reserved for "closed".
    pub fn open(&self, epoch: u64) {
        debug_assert!(epoch != CLOSED);
        self.epoch.store(epoch, Ordering::Release);
    }

    pub fn close(&self) {
        self.epoch.store(CLOSED, Ordering::Release);
    }

    /// Close the gate only if it is still open for `epoch`.
    ///
    /// Returns true for exactly one caller per running period.
    pub fn close_if(&self, epoch: u64) -> bool {
        epoch != CLOSED
            && self
                .epoch
                .compare_exchange(epoch, CLOSED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    pub fn is_open(&self) -> bool {
        self.epoch.load(Ordering::Acquire) != CLOSED
    }

    pub fn admits(&self, epoch: u64) -> bool {
        epoch != CLOSED && self.epoch.load(Ordering::Acquire) == epoch
    }
}

impl Default for DeliveryGate {
    fn default() -> Self {
        Self::new()
    }
}

/// One-way disposal flag checked by every pending continuation.
#[derive(Debug, Default)]
pub struct DisposalToken {
    disposed: AtomicBool,
}

impl DisposalToken {
    pub const fn new() -> Self {
        Self {
            disposed: AtomicBool::new(false),
        }
    }

    /// Mark disposed. Returns true only for the first call.
    pub fn dispose(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
