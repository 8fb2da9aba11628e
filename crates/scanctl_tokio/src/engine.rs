//! Recognition engine boundary.
//!
//! The engine is opaque: it owns frame acquisition and symbol decoding. The
//! controller is the only caller of `initialize`/`start`/`stop`.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use scanctl_core::config::CaptureConfig;
use scanctl_core::detection::RawDetection;
use thiserror::Error;

/// Engine-side failure reported from `initialize`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub message: Cow<'static, str>,
}

impl EngineError {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Completion of an `initialize` call.
pub type EngineFuture = Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + 'static>>;

pub type DetectedHandler = Box<dyn Fn(RawDetection) + Send + Sync + 'static>;
pub type ProcessedHandler = Box<dyn Fn() + Send + Sync + 'static>;

/// Frame-capture and recognition capability driven by the controller.
pub trait RecognitionEngine: Send + Sync + 'static {
    /// Begin initialization. The call itself must not block; completion is
    /// reported through the returned future.
    fn initialize(&self, config: CaptureConfig) -> EngineFuture;

    /// Only valid after a successful `initialize`.
    fn start(&self);

    /// Idempotent; safe to call when not running.
    fn stop(&self);

    fn subscribe_detected(&self, handler: DetectedHandler) -> Subscription;

    fn subscribe_processed(&self, handler: ProcessedHandler) -> Subscription;

    /// Hide any debug overlay the engine draws over the capture surface.
    fn hide_overlay(&self) {}
}

/// Handle for an engine event subscription. Revoked on `revoke()` or drop.
pub struct Subscription {
    revoke: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Subscription {
    pub fn new<F>(revoke: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            revoke: Some(Box::new(revoke)),
        }
    }

    /// A subscription with nothing to revoke.
    pub fn detached() -> Self {
        Self { revoke: None }
    }

    pub fn revoke(mut self) {
        self.run_revoke();
    }

    fn run_revoke(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_revoke();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.revoke.is_some())
            .finish()
    }
}
