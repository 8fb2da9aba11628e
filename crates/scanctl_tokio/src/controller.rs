//! Lifecycle controller: reconciles host props against the engine protocol.
//!
//! Responsibilities:
//! - Own the `ControlState` and every `initialize`/`start`/`stop` decision
//! - Gate mounting on capability, scan type and handler presence
//! - Bridge engine detections to the host, tagged by running period
//! - Guarantee nothing reaches the host after `unmount()`
//!
//! Locking: all state lives behind one mutex and engine calls are made while
//! holding it. Host callbacks are never invoked under that lock; they run
//! under the delivery lock instead, which `unmount()` also takes first.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use scanctl_core::capability::CaptureCapability;
use scanctl_core::config::{ConfigBuilder, DesiredState, DetectionMode, ReconfigurePolicy};
use scanctl_core::detection::DetectionResult;
use scanctl_core::error::{CoreError, Domain, ErrorKind};
use scanctl_core::lifecycle::{
    begin, finish, reconcile, ControlState, DeliveryGate, DisposalToken, InitOutcome, Phase,
    Transition,
};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::bridge::{self, BridgeEvent, BridgeReceiver, BridgeSender, Dispatch};
use crate::engine::{EngineError, RecognitionEngine, Subscription};
use crate::error::log_core_error;
use crate::events::PhaseEvent;
use crate::props::{ErrorReport, ScannerProps};

const PHASE_EVENT_CAPACITY: usize = 32;

/// Host-facing scanner controller.
///
/// One controller drives exactly one engine for one mount cycle. After
/// `unmount()` (or drop) it is inert; remounting means constructing a new one.
pub struct LifecycleController<E: RecognitionEngine> {
    shared: Arc<Shared<E>>,
}

struct Shared<E: RecognitionEngine> {
    engine: Arc<E>,
    capability: CaptureCapability,
    builder: ConfigBuilder,
    inner: Mutex<Inner>,
    gate: DeliveryGate,
    token: DisposalToken,
    delivery: Delivery,

    // broadcast so a slow or absent observer never blocks a transition
    phase_events: broadcast::Sender<PhaseEvent>,
    bridge_tx: BridgeSender,
}

struct Inner {
    state: ControlState,
    props: ScannerProps,
    mounted: bool,
    // Bumped on every initialize; identifies one running period.
    epoch: u64,
    // Set after a single-shot stop; cleared once the host presents `enabled = false`.
    spent: bool,
    // Desired state the engine was last initialized with.
    applied: Option<DesiredState>,
    subscriptions: Vec<Subscription>,
    pending: Option<JoinHandle<()>>,
    bridge: Option<JoinHandle<()>>,
    bridge_rx: Option<BridgeReceiver>,
    runtime: Option<Handle>,
}

/// Public API (host facing).
impl<E: RecognitionEngine> LifecycleController<E> {
    /// Create a controller in `Idle`. Does not touch the engine.
    pub fn new(engine: Arc<E>, capability: CaptureCapability, props: ScannerProps) -> Self {
        Self::with_builder(engine, capability, props, ConfigBuilder::default())
    }

    /// Like `new`, with explicit capture defaults.
    pub fn with_builder(
        engine: Arc<E>,
        capability: CaptureCapability,
        props: ScannerProps,
        builder: ConfigBuilder,
    ) -> Self {
        let (phase_events, _rx) = broadcast::channel(PHASE_EVENT_CAPACITY);
        let (bridge_tx, bridge_rx) = bridge::channel();

        Self {
            shared: Arc::new(Shared {
                engine,
                capability,
                builder,
                inner: Mutex::new(Inner {
                    state: ControlState::new(),
                    props,
                    mounted: false,
                    epoch: 0,
                    spent: false,
                    applied: None,
                    subscriptions: Vec::new(),
                    pending: None,
                    bridge: None,
                    bridge_rx: Some(bridge_rx),
                    runtime: None,
                }),
                gate: DeliveryGate::new(),
                token: DisposalToken::new(),
                delivery: Delivery::default(),
                phase_events,
                bridge_tx,
            }),
        }
    }

    /// Validate props and start the engine lifecycle.
    ///
    /// Never fails: every problem is recorded as `Failed` and delivered once
    /// to the host's `on_error`. Must be called from within a tokio runtime.
    pub fn mount(&self) {
        Shared::mount(&self.shared);
    }

    /// Apply a new set of host props.
    pub fn update(&self, props: ScannerProps) {
        Shared::update(&self.shared, props);
    }

    /// Tear down synchronously. Idempotent.
    ///
    /// After this returns, no engine event and no pending `initialize`
    /// completion reaches the host.
    pub fn unmount(&self) {
        self.shared.unmount();
    }

    /// Wait for any in-flight `initialize` completion to be processed.
    pub async fn settle(&self) {
        loop {
            let pending = self.shared.lock().pending.take();
            match pending {
                Some(handle) => {
                    if let Err(err) = handle.await {
                        warn!("initialize task ended abnormally: {err}");
                    }
                }
                None => break,
            }
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.shared.lock().state.phase()
    }

    /// The error that put the controller in `Failed`, if any.
    pub fn error(&self) -> Option<CoreError> {
        self.shared.lock().state.error().cloned()
    }

    /// Whether the host should render a loading affordance.
    pub fn loading(&self) -> bool {
        self.shared.lock().state.loading()
    }

    /// Snapshot of the observable state.
    pub fn state(&self) -> ControlState {
        self.shared.lock().state.clone()
    }

    /// True once `unmount()` (or drop) has run.
    pub fn is_disposed(&self) -> bool {
        self.shared.token.is_disposed()
    }

    /// Subscribe to phase transitions.
    pub fn subscribe_phase_events(&self) -> broadcast::Receiver<PhaseEvent> {
        self.shared.phase_events.subscribe()
    }
}

impl<E: RecognitionEngine> Drop for LifecycleController<E> {
    fn drop(&mut self) {
        self.shared.unmount();
    }
}

fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poison) => {
            warn!("{what} mutex poisoned");
            poison.into_inner()
        }
    }
}

/// Serializes host callbacks against `unmount()`.
///
/// Re-entrant per thread: a host callback may call back into the controller
/// (including `unmount()`) without deadlocking on the delivery it is part of.
#[derive(Default)]
struct Delivery {
    lock: Mutex<()>,
    owner: Mutex<Option<ThreadId>>,
}

struct DeliveryGuard<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
    _held: MutexGuard<'a, ()>,
}

impl Delivery {
    /// Returns `None` when the calling thread already holds the lock.
    fn enter(&self) -> Option<DeliveryGuard<'_>> {
        let me = thread::current().id();
        if *lock_or_recover(&self.owner, "delivery owner") == Some(me) {
            return None;
        }
        let held = lock_or_recover(&self.lock, "delivery");
        *lock_or_recover(&self.owner, "delivery owner") = Some(me);
        Some(DeliveryGuard {
            owner: &self.owner,
            _held: held,
        })
    }
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        *lock_or_recover(self.owner, "delivery owner") = None;
    }
}

/// Internal plumbing.
impl<E: RecognitionEngine> Shared<E> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_or_recover(&self.inner, "controller state")
    }

    /// Hand an error to the host unless the controller was unmounted meanwhile.
    fn deliver_report(&self, report: ErrorReport) {
        let _delivery = self.delivery.enter();
        if self.token.is_disposed() {
            debug!("error report dropped after unmount");
            return;
        }
        report.deliver();
    }

    fn emit(&self, transition: Transition, from: Phase, to: Phase) {
        debug!(
            transition = transition.label(),
            from = from.label(),
            to = to.label(),
            "phase transition"
        );
        // No receivers is fine.
        let _ = self.phase_events.send(PhaseEvent {
            transition,
            from,
            to,
        });
    }

    fn mount(this: &Arc<Self>) {
        let report = {
            let mut inner = this.lock();
            if this.token.is_disposed() || inner.mounted {
                debug!("mount ignored: controller already mounted or disposed");
                return;
            }
            inner.mounted = true;
            Self::mount_locked(this, &mut inner)
        };

        if let Some(report) = report {
            this.deliver_report(report);
        }
    }

    fn mount_locked(this: &Arc<Self>, inner: &mut Inner) -> Option<ErrorReport> {
        if let Err(err) = this.validate(&inner.props) {
            return Some(this.reject(inner, err));
        }

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                let err = CoreError::error()
                    .domain(Domain::Lifecycle)
                    .kind(ErrorKind::InvalidState)
                    .msg("mount requires a tokio runtime")
                    .build();
                return Some(this.reject(inner, err));
            }
        };

        if let Some(rx) = inner.bridge_rx.take() {
            inner.bridge = Some(runtime.spawn(bridge::run(Arc::downgrade(this), rx)));
        }
        inner.runtime = Some(runtime);

        Self::reconcile_locked(this, inner)
    }

    /// Pre-engine checks, in order: capability, scan type, detection handler.
    fn validate(&self, props: &ScannerProps) -> Result<(), CoreError> {
        if !self.capability.is_supported() {
            return Err(CoreError::capability_unavailable());
        }
        if !props.desired.scan_type.is_supported() {
            return Err(CoreError::invalid_scan_target(props.desired.scan_type));
        }
        if props.on_detected.is_none() {
            return Err(CoreError::missing_handler());
        }
        Ok(())
    }

    fn reject(&self, inner: &mut Inner, err: CoreError) -> ErrorReport {
        let from = inner.state.phase();
        match begin(from, Transition::Reject) {
            Ok(_) => {
                warn!(kind = ?err.kind, "mount rejected: {}", err.message);
                inner.state.fail(err.clone());
                self.emit(Transition::Reject, from, Phase::Failed);
            }
            Err(transition_err) => log_core_error(&transition_err),
        }
        inner.props.error_report(err)
    }

    fn update(this: &Arc<Self>, next: ScannerProps) {
        let report = {
            let mut inner = this.lock();
            if this.token.is_disposed() {
                debug!("update ignored after unmount");
                return;
            }

            let previous = std::mem::replace(&mut inner.props, next);
            if !inner.props.desired.enabled {
                inner.spent = false;
            }
            if !inner.mounted || inner.state.phase() == Phase::Failed {
                return;
            }

            if inner.state.phase() == Phase::Running
                && inner.props.desired.reconfigure == ReconfigurePolicy::Deferred
                && previous.desired.capture_differs(&inner.props.desired)
            {
                debug!("capture parameters changed; applied on next resume");
            }

            this.restart_if_stale_locked(&mut inner);
            Self::reconcile_locked(this, &mut inner)
        };

        if let Some(report) = report {
            this.deliver_report(report);
        }
    }

    fn reconcile_locked(this: &Arc<Self>, inner: &mut Inner) -> Option<ErrorReport> {
        let enabled = inner.props.desired.enabled && !inner.spent;

        match reconcile(inner.state.phase(), enabled)? {
            Transition::Initialize => Self::initialize_locked(this, inner),
            Transition::Stop => {
                this.stop_locked(inner);
                None
            }
            Transition::Park => {
                let from = inner.state.phase();
                match begin(from, Transition::Park) {
                    Ok(to) => {
                        inner.state.enter(to);
                        this.emit(Transition::Park, from, to);
                    }
                    Err(err) => log_core_error(&err),
                }
                None
            }
            Transition::Reject => None,
        }
    }

    fn initialize_locked(this: &Arc<Self>, inner: &mut Inner) -> Option<ErrorReport> {
        let from = inner.state.phase();
        let mid = match begin(from, Transition::Initialize) {
            Ok(mid) => mid,
            Err(err) => {
                log_core_error(&err);
                return None;
            }
        };
        let Some(runtime) = inner.runtime.clone() else {
            let err = CoreError::error()
                .domain(Domain::Lifecycle)
                .kind(ErrorKind::InvalidState)
                .msg("initialize requested before mount")
                .build();
            log_core_error(&err);
            return None;
        };

        inner.epoch += 1;
        let epoch = inner.epoch;
        inner.state.enter(mid);
        this.emit(Transition::Initialize, from, mid);

        inner.applied = Some(inner.props.desired.clone());
        let config = this.builder.build(&inner.props.desired);
        info!(
            epoch,
            target = %config.input_stream.target,
            workers = config.num_of_workers,
            "initializing engine"
        );
        let init = this.engine.initialize(config);

        let shared = Arc::clone(this);
        inner.pending = Some(runtime.spawn(async move {
            let outcome = init.await;
            Self::complete_initialize(&shared, epoch, outcome);
        }));

        None
    }

    fn complete_initialize(this: &Arc<Self>, epoch: u64, outcome: Result<(), EngineError>) {
        let report = {
            let mut inner = this.lock();
            if this.token.is_disposed() {
                debug!(epoch, "discarding initialize completion after unmount");
                return;
            }
            if inner.epoch != epoch || inner.state.phase() != Phase::Initializing {
                debug!(epoch, "discarding stale initialize completion");
                return;
            }

            match outcome {
                Err(engine_err) => {
                    let err = CoreError::from(engine_err);
                    match finish(Phase::Initializing, Transition::Initialize, InitOutcome::Failed)
                    {
                        Ok(to) => {
                            warn!(epoch, "engine initialize failed: {}", err.message);
                            inner.state.fail(err.clone());
                            this.emit(Transition::Initialize, Phase::Initializing, to);
                        }
                        Err(transition_err) => log_core_error(&transition_err),
                    }
                    Some(inner.props.error_report(err))
                }
                Ok(()) => {
                    this.start_locked(&mut inner, epoch);
                    // Apply whatever the host asked for while we were initializing.
                    this.restart_if_stale_locked(&mut inner);
                    Self::reconcile_locked(this, &mut inner)
                }
            }
        };

        if let Some(report) = report {
            this.deliver_report(report);
        }
    }

    fn start_locked(&self, inner: &mut Inner, epoch: u64) {
        let to = match finish(
            Phase::Initializing,
            Transition::Initialize,
            InitOutcome::Succeeded,
        ) {
            Ok(to) => to,
            Err(err) => {
                log_core_error(&err);
                return;
            }
        };

        self.engine.start();
        inner.subscriptions.push(
            self.engine
                .subscribe_detected(bridge::detected_handler(self.bridge_tx.clone(), epoch)),
        );
        inner.subscriptions.push(
            self.engine
                .subscribe_processed(bridge::processed_handler(self.bridge_tx.clone(), epoch)),
        );
        self.gate.open(epoch);

        inner.state.enter(to);
        info!(epoch, "engine running");
        self.emit(Transition::Initialize, Phase::Initializing, to);
    }

    /// Under `Restart`, stop a running engine whose config no longer matches
    /// the host's; the following reconcile reinitializes it.
    fn restart_if_stale_locked(&self, inner: &mut Inner) {
        let desired = &inner.props.desired;
        let stale = inner.state.phase() == Phase::Running
            && desired.enabled
            && desired.reconfigure == ReconfigurePolicy::Restart
            && inner
                .applied
                .as_ref()
                .is_some_and(|applied| applied.capture_differs(desired));
        if stale {
            info!("capture parameters changed; restarting engine");
            self.stop_locked(inner);
        }
    }

    fn stop_locked(&self, inner: &mut Inner) {
        let from = inner.state.phase();
        let to = match begin(from, Transition::Stop) {
            Ok(to) => to,
            Err(err) => {
                log_core_error(&err);
                return;
            }
        };

        self.gate.close();
        self.engine.stop();
        for subscription in inner.subscriptions.drain(..) {
            subscription.revoke();
        }

        inner.state.enter(to);
        info!(epoch = inner.epoch, "engine stopped");
        self.emit(Transition::Stop, from, to);
    }

    fn unmount(&self) {
        // Waits out any callback in flight on another thread.
        let _delivery = self.delivery.enter();
        let mut inner = self.lock();
        if !self.token.dispose() {
            return;
        }

        self.gate.close();
        if inner.state.phase() == Phase::Running {
            self.stop_locked(&mut inner);
        }
        for subscription in inner.subscriptions.drain(..) {
            subscription.revoke();
        }
        if let Some(bridge) = inner.bridge.take() {
            bridge.abort();
        }
        // A pending initialize keeps running; its completion observes the token.
        debug!(phase = inner.state.phase().label(), "controller unmounted");
    }

    /// Single-shot: first detection of a running period stops the engine.
    fn finish_single_shot(&self, epoch: u64) {
        let mut inner = self.lock();
        if self.token.is_disposed()
            || inner.epoch != epoch
            || inner.state.phase() != Phase::Running
        {
            return;
        }
        inner.spent = true;
        self.stop_locked(&mut inner);
    }
}

impl<E: RecognitionEngine> Dispatch for Shared<E> {
    fn dispatch(&self, event: BridgeEvent) {
        let _delivery = self.delivery.enter();
        if self.token.is_disposed() || !self.gate.admits(event.epoch()) {
            trace!(epoch = event.epoch(), "dropping engine event outside its running period");
            return;
        }

        match event {
            BridgeEvent::Processed { .. } => self.engine.hide_overlay(),
            BridgeEvent::Detected { epoch, raw } => {
                let (handler, mode) = {
                    let inner = self.lock();
                    (inner.props.on_detected.clone(), inner.props.desired.mode)
                };

                if mode == DetectionMode::SingleShot {
                    if !self.gate.close_if(epoch) {
                        return;
                    }
                    self.finish_single_shot(epoch);
                }

                match handler {
                    Some(handler) => handler(DetectionResult::from(raw)),
                    None => debug!(epoch, "detection dropped: no on_detected handler"),
                }
            }
        }
    }
}
