//! scanctl_core: runtime-agnostic core for an embeddable scanner controller.
//!
//! Design goals:
//! - Pure, testable logic (no async runtime, no engine).
//! - Explicit types; no macro wizardry.
//! - Small, stable public API surface.

pub mod error;

/// One-time platform capture probe.
pub mod capability;

/// Host intent and the engine capture configuration (ConfigBuilder).
pub mod config;

/// Raw engine detections and their normalized host-facing shape.
pub mod detection;

/// Controller phases, transitions and delivery gating.
pub mod lifecycle;
