//! Engine to host event bridge.
//!
//! Engine handlers only enqueue; a dispatcher task delivers. Host callbacks
//! never run on the engine's call stack.

use scanctl_core::detection::RawDetection;
use tokio::sync::mpsc;

use crate::engine::{DetectedHandler, ProcessedHandler};

/// Engine event tagged with the running period (epoch) it was produced in.
#[derive(Debug, Clone)]
pub(crate) enum BridgeEvent {
    Detected { epoch: u64, raw: RawDetection },
    Processed { epoch: u64 },
}

impl BridgeEvent {
    pub(crate) fn epoch(&self) -> u64 {
        match self {
            BridgeEvent::Detected { epoch, .. } | BridgeEvent::Processed { epoch } => *epoch,
        }
    }
}

pub(crate) type BridgeSender = mpsc::UnboundedSender<BridgeEvent>;
pub(crate) type BridgeReceiver = mpsc::UnboundedReceiver<BridgeEvent>;

pub(crate) fn channel() -> (BridgeSender, BridgeReceiver) {
    mpsc::unbounded_channel()
}

/// Engine-facing detection handler for one running period.
pub(crate) fn detected_handler(tx: BridgeSender, epoch: u64) -> DetectedHandler {
    Box::new(move |raw| {
        // Closed channel means the controller is gone; nothing left to notify.
        let _ = tx.send(BridgeEvent::Detected { epoch, raw });
    })
}

/// Engine-facing "frame processed" handler for one running period.
pub(crate) fn processed_handler(tx: BridgeSender, epoch: u64) -> ProcessedHandler {
    Box::new(move || {
        let _ = tx.send(BridgeEvent::Processed { epoch });
    })
}

/// Receiving side of the bridge.
pub(crate) trait Dispatch: Send + Sync + 'static {
    fn dispatch(&self, event: BridgeEvent);
}

/// Deliver bridge events until the channel closes or the dispatcher is dropped.
pub(crate) async fn run<D>(dispatcher: std::sync::Weak<D>, mut rx: BridgeReceiver)
where
    D: Dispatch,
{
    while let Some(event) = rx.recv().await {
        let Some(dispatcher) = dispatcher.upgrade() else {
            break;
        };
        dispatcher.dispatch(event);
    }
    tracing::trace!("event bridge closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanctl_core::detection::CodeResult;
    use std::sync::{Arc, Mutex};

    struct Recorder(Mutex<Vec<u64>>);

    impl Dispatch for Recorder {
        fn dispatch(&self, event: BridgeEvent) {
            self.0.lock().unwrap().push(event.epoch());
        }
    }

    fn raw() -> RawDetection {
        RawDetection {
            code_result: CodeResult {
                code: "42".into(),
                direction: 1,
                format: "ean_8".into(),
            },
            angle: 0.0,
            pattern: vec![],
        }
    }

    #[tokio::test]
    async fn handlers_tag_events_with_their_epoch() {
        let (tx, rx) = channel();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));

        detected_handler(tx.clone(), 3)(raw());
        processed_handler(tx.clone(), 4)();
        drop(tx);

        run(Arc::downgrade(&recorder), rx).await;
        assert_eq!(*recorder.0.lock().unwrap(), vec![3, 4]);
    }

    #[tokio::test]
    async fn bridge_stops_when_dispatcher_is_gone() {
        let (tx, rx) = channel();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let weak = Arc::downgrade(&recorder);
        drop(recorder);

        detected_handler(tx.clone(), 1)(raw());
        // returns even though the sender is still alive
        run(weak, rx).await;
    }
}
