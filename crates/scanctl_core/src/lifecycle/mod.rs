//! scanctl_core::lifecycle
//!
//! Pure (runtime-agnostic) lifecycle semantics for the scanner controller.
//! This module intentionally contains **no** async or engine code.
//!
//! Key ideas:
//! - Stable phases + one intermediate phase (`Initializing`)
//! - Explicit transition pipeline: `begin()` -> engine initialize -> `finish()`
//! - `reconcile()` maps the host's desired `enabled` flag onto the next transition
//! - Adapter layer owns the engine, the async gap, and delivery gating

mod gate;
mod graph;
mod machine;
mod state;
mod transition;

pub use gate::{DeliveryGate, DisposalToken};
pub use graph::{transition_graph, TransitionEdge, TransitionGraph};
pub use machine::{available_transitions, begin, finish, goal_phase_for_transition, reconcile};
pub use state::{ControlState, Phase, ALL_PHASES};
pub use transition::{InitOutcome, Transition};
