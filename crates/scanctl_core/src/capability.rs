/// Result of the one-time platform capture probe.
///
/// Computed once during application start-up and handed to each controller,
/// so no controller ever consults global state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CaptureCapability {
    supported: bool,
}

impl CaptureCapability {
    pub const fn new(supported: bool) -> Self {
        Self { supported }
    }

    /// Evaluate a platform predicate exactly once.
    pub fn probe<F>(predicate: F) -> Self
    where
        F: FnOnce() -> bool,
    {
        Self::new(predicate())
    }

    pub const fn supported() -> Self {
        Self::new(true)
    }

    pub const fn unsupported() -> Self {
        Self::new(false)
    }

    pub const fn is_supported(self) -> bool {
        self.supported
    }
}
