//! scanctl_tokio
//!
//! Tokio adapter that drives an opaque recognition engine through the
//! lifecycle defined in `scanctl_core`, and exposes it to a host application
//! as a declarative, props-driven controller.

pub mod error;

pub mod engine;
pub mod events;
pub mod props;
pub mod scripted;

mod bridge;
mod controller;

pub use controller::LifecycleController;
pub use engine::{EngineError, RecognitionEngine, Subscription};
pub use events::PhaseEvent;
pub use props::ScannerProps;
pub use scripted::ScriptedEngine;

// Re-export core types that hosts will commonly need
pub use scanctl_core::capability::CaptureCapability;
pub use scanctl_core::config::{DesiredState, DetectionMode, ReconfigurePolicy, ScanTarget};
pub use scanctl_core::detection::DetectionResult;
pub use scanctl_core::error::{CoreError, ErrorKind, Result};
pub use scanctl_core::lifecycle::{ControlState, Phase, Transition};
