//! In-memory engine with scripted `initialize` outcomes.
//!
//! Records every call the controller makes and lets the caller push
//! detections through whatever handlers are currently subscribed. Used by the
//! replay tool and by tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use scanctl_core::config::CaptureConfig;
use scanctl_core::detection::RawDetection;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::engine::{
    DetectedHandler, EngineError, EngineFuture, ProcessedHandler, RecognitionEngine, Subscription,
};

/// How the next `initialize` call resolves.
#[derive(Debug)]
pub enum InitScript {
    Succeed,
    Fail(EngineError),
    /// Resolve with the given outcome after a delay.
    After(Duration, Result<(), EngineError>),
    /// Resolve when the paired `InitRelease` is used (or dropped, which fails).
    Hold(oneshot::Receiver<Result<(), EngineError>>),
}

/// Releases a held `initialize`.
#[derive(Debug)]
pub struct InitRelease {
    tx: oneshot::Sender<Result<(), EngineError>>,
}

impl InitRelease {
    pub fn succeed(self) {
        let _ = self.tx.send(Ok(()));
    }

    pub fn fail(self, message: impl Into<String>) {
        let _ = self.tx.send(Err(EngineError::new(message.into())));
    }
}

/// Call counters.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct EngineCalls {
    pub initialize: usize,
    pub start: usize,
    pub stop: usize,
    pub overlay_hidden: usize,
}

type SharedDetected = Arc<dyn Fn(RawDetection) + Send + Sync>;
type SharedProcessed = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Script {
    queued: VecDeque<InitScript>,
    calls: EngineCalls,
    running: bool,
    last_config: Option<CaptureConfig>,
    next_id: u64,
    detected: Vec<(u64, SharedDetected)>,
    processed: Vec<(u64, SharedProcessed)>,
}

/// Scriptable `RecognitionEngine`. Unscripted initializes succeed immediately.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of a future `initialize`.
    pub fn push_init(&self, script: InitScript) {
        self.lock().queued.push_back(script);
    }

    pub fn succeed_after(&self, delay: Duration) {
        self.push_init(InitScript::After(delay, Ok(())));
    }

    pub fn fail_next(&self, message: impl Into<String>) {
        self.push_init(InitScript::Fail(EngineError::new(message.into())));
    }

    /// Hold the next `initialize` open until the returned release is used.
    pub fn hold_next(&self) -> InitRelease {
        let (tx, rx) = oneshot::channel();
        self.push_init(InitScript::Hold(rx));
        InitRelease { tx }
    }

    pub fn calls(&self) -> EngineCalls {
        self.lock().calls
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn last_config(&self) -> Option<CaptureConfig> {
        self.lock().last_config.clone()
    }

    /// Number of live detection subscriptions.
    pub fn detected_subscribers(&self) -> usize {
        self.lock().detected.len()
    }

    /// Number of live "frame processed" subscriptions.
    pub fn processed_subscribers(&self) -> usize {
        self.lock().processed.len()
    }

    /// Push a detection through every subscribed handler. Returns how many were reached.
    pub fn emit_detected(&self, raw: RawDetection) -> usize {
        let handlers: Vec<SharedDetected> = self
            .lock()
            .detected
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in &handlers {
            handler(raw.clone());
        }
        handlers.len()
    }

    /// Fire the "frame processed" event. Returns how many handlers were reached.
    pub fn emit_processed(&self) -> usize {
        let handlers: Vec<SharedProcessed> = self
            .lock()
            .processed
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in &handlers {
            handler();
        }
        handlers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        lock_script(&self.script)
    }
}

fn lock_script(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    match script.lock() {
        Ok(guard) => guard,
        Err(poison) => {
            warn!("scripted engine mutex poisoned");
            poison.into_inner()
        }
    }
}

fn unsubscribe(script: Weak<Mutex<Script>>, id: u64) -> impl FnOnce() + Send + 'static {
    move || {
        if let Some(script) = script.upgrade() {
            let mut script = lock_script(&script);
            script.detected.retain(|(sid, _)| *sid != id);
            script.processed.retain(|(sid, _)| *sid != id);
        }
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn initialize(&self, config: CaptureConfig) -> EngineFuture {
        let next = {
            let mut script = self.lock();
            script.calls.initialize += 1;
            script.last_config = Some(config);
            script.queued.pop_front()
        };

        match next {
            None | Some(InitScript::Succeed) => Box::pin(async { Ok(()) }),
            Some(InitScript::Fail(err)) => Box::pin(async move { Err(err) }),
            Some(InitScript::After(delay, outcome)) => Box::pin(async move {
                tokio::time::sleep(delay).await;
                outcome
            }),
            Some(InitScript::Hold(rx)) => Box::pin(async move {
                rx.await
                    .unwrap_or_else(|_| Err(EngineError::new("initialize abandoned")))
            }),
        }
    }

    fn start(&self) {
        let mut script = self.lock();
        script.calls.start += 1;
        script.running = true;
        debug!("scripted engine started");
    }

    fn stop(&self) {
        let mut script = self.lock();
        script.calls.stop += 1;
        script.running = false;
        debug!("scripted engine stopped");
    }

    fn subscribe_detected(&self, handler: DetectedHandler) -> Subscription {
        let mut script = self.lock();
        script.next_id += 1;
        let id = script.next_id;
        script.detected.push((id, Arc::from(handler)));
        Subscription::new(unsubscribe(Arc::downgrade(&self.script), id))
    }

    fn subscribe_processed(&self, handler: ProcessedHandler) -> Subscription {
        let mut script = self.lock();
        script.next_id += 1;
        let id = script.next_id;
        script.processed.push((id, Arc::from(handler)));
        Subscription::new(unsubscribe(Arc::downgrade(&self.script), id))
    }

    fn hide_overlay(&self) {
        self.lock().calls.overlay_hidden += 1;
    }
}
