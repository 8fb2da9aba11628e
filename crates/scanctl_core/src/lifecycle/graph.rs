use crate::error::Result;

use super::{available_transitions, goal_phase_for_transition, Phase, Transition, ALL_PHASES};

/// Lifecycle transition graph derived from core phase/transition tables.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransitionGraph {
    pub phases: Vec<Phase>,
    pub transitions: Vec<TransitionEdge>,
}

/// Directed lifecycle transition edge (success path).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TransitionEdge {
    pub start: Phase,
    pub transition: Transition,
    pub goal: Phase,
}

/// Build the canonical controller transition graph.
pub fn transition_graph() -> Result<TransitionGraph> {
    let mut transitions = Vec::new();

    for phase in ALL_PHASES {
        for transition in available_transitions(phase) {
            let goal = goal_phase_for_transition(phase, *transition)?;
            transitions.push(TransitionEdge {
                start: phase,
                transition: *transition,
                goal,
            });
        }
    }

    Ok(TransitionGraph {
        phases: ALL_PHASES.to_vec(),
        transitions,
    })
}
