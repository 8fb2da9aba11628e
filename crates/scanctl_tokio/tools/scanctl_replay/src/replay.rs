use std::sync::{Arc, Mutex};
use std::time::Duration;

use scanctl_core::detection::RawDetection;
use scanctl_core::error::{CoreError, Result};
use scanctl_tokio::scripted::EngineCalls;
use scanctl_tokio::{
    CaptureCapability, DetectionResult, LifecycleController, Phase, PhaseEvent, ScannerProps,
    ScriptedEngine,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::Config;

/// Upper bound on how long one delivered payload may take to reach the host.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(1);

/// What a host mounted for the whole replay would have observed.
#[derive(Debug)]
pub struct ReplayReport {
    pub detections: Vec<DetectionResult>,
    pub errors: Vec<CoreError>,
    pub phases: Vec<PhaseEvent>,
    pub final_phase: Phase,
    pub calls: EngineCalls,
    /// Payloads no engine handler was subscribed for.
    pub unheard: usize,
}

/// Decode one engine payload per non-blank line.
pub fn parse_payloads(input: &str) -> Result<Vec<RawDetection>> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(RawDetection::from_json)
        .collect()
}

/// Mount a controller, push every payload through the engine, unmount.
///
/// Payloads are emitted one at a time; each one that reaches a subscribed
/// handler is awaited before the next is sent.
pub async fn run(config: &Config, payloads: Vec<RawDetection>) -> ReplayReport {
    let engine = ScriptedEngine::new();
    if let Some(message) = &config.fail_init {
        engine.fail_next(message.clone());
    } else if !config.init_delay.is_zero() {
        engine.succeed_after(config.init_delay);
    }

    let capability = if config.media_available {
        CaptureCapability::supported()
    } else {
        CaptureCapability::unsupported()
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors_sink = Arc::clone(&errors);
    let props = ScannerProps::new(true)
        .scan_type(config.scan_type)
        .mode(config.mode)
        .on_detected(move |detection| {
            let _ = tx.send(detection);
        })
        .on_error(move |err| match errors_sink.lock() {
            Ok(mut errors) => errors.push(err),
            Err(poison) => poison.into_inner().push(err),
        });

    let controller = LifecycleController::new(Arc::new(engine.clone()), capability, props);
    let mut phase_rx = controller.subscribe_phase_events();

    controller.mount();
    controller.settle().await;

    let mut detections = Vec::new();
    let mut unheard = 0;
    for (index, raw) in payloads.into_iter().enumerate() {
        if engine.emit_detected(raw) == 0 {
            debug!(index, "payload emitted with no subscribed handler");
            unheard += 1;
            continue;
        }
        match tokio::time::timeout(DELIVERY_TIMEOUT, rx.recv()).await {
            Ok(Some(detection)) => detections.push(detection),
            Ok(None) => break,
            Err(_) => warn!(index, "payload was not delivered"),
        }
    }

    let final_phase = controller.phase();
    controller.unmount();

    let mut phases = Vec::new();
    while let Ok(event) = phase_rx.try_recv() {
        phases.push(event);
    }

    let errors = match errors.lock() {
        Ok(errors) => errors.clone(),
        Err(poison) => poison.into_inner().clone(),
    };

    ReplayReport {
        detections,
        errors,
        phases,
        final_phase,
        calls: engine.calls(),
        unheard,
    }
}
