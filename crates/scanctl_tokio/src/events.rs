//! Phase transition event stream.
//!
//! Emitted after every controller transition so hosts (and tests) can observe
//! the exact phase sequence without polling.

use scanctl_core::lifecycle::{Phase, Transition};

/// Emitted after a phase change.
///
/// Both halves of an initialize (`Idle -> Initializing`, `Initializing -> Running|Failed`)
/// are reported with `Transition::Initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseEvent {
    pub transition: Transition,
    pub from: Phase,
    pub to: Phase,
}
