use crate::error::{CoreError, Result};

use super::{InitOutcome, Phase, Transition};

/// Begin a transition from a **stable** phase.
///
/// For `Initialize` this yields the intermediate `Initializing` phase; the
/// transition is completed later by `finish()` once the engine reports back.
/// All other transitions complete immediately.
///
/// This enforces:
/// - which transitions are allowed from which phases
/// - that no second `initialize` can start while one is outstanding
/// - that `Failed` is a sink for the mount cycle
pub fn begin(current: Phase, via: Transition) -> Result<Phase> {
    use Phase::*;
    use Transition::*;

    let next = match (current, via) {
        (Idle | Stopped, Initialize) => Initializing,
        (Running, Stop) => Stopped,
        (Idle, Park) => Stopped,
        (Idle, Reject) => Failed,

        _ => {
            return Err(CoreError::invalid_transition(current.id(), via.id()));
        }
    };

    Ok(next)
}

/// Finish an `Initialize` by exiting `Initializing` based on the engine outcome.
pub fn finish(intermediate: Phase, via: Transition, outcome: InitOutcome) -> Result<Phase> {
    match (intermediate, via, outcome) {
        (Phase::Initializing, Transition::Initialize, InitOutcome::Succeeded) => Ok(Phase::Running),
        (Phase::Initializing, Transition::Initialize, InitOutcome::Failed) => Ok(Phase::Failed),
        _ => Err(CoreError::invalid_transition(intermediate.id(), via.id())),
    }
}

/// Get the expected goal phase when a transition succeeds.
pub fn goal_phase_for_transition(start: Phase, transition: Transition) -> Result<Phase> {
    let next = begin(start, transition)?;
    if next.is_transitioning() {
        finish(next, transition, InitOutcome::Succeeded)
    } else {
        Ok(next)
    }
}

/// Get the list of transitions the controller may start from a given phase.
///
/// Busy (`Initializing`) and terminal (`Failed`) phases accept nothing.
pub fn available_transitions(phase: Phase) -> &'static [Transition] {
    use Phase::*;
    use Transition::*;

    match phase {
        Idle => &[Initialize, Park, Reject],
        Stopped => &[Initialize],
        Running => &[Stop],
        Initializing | Failed => &[],
    }
}

/// Decide which transition, if any, brings `phase` in line with the host's
/// desired `enabled` flag.
///
/// Returns `None` when the phase already matches (repeated identical signals
/// are no-ops), while an `initialize` is outstanding (the latest desire is
/// reconciled again on completion), and once `Failed`.
pub fn reconcile(phase: Phase, enabled: bool) -> Option<Transition> {
    use Phase::*;

    match (phase, enabled) {
        (Idle, true) | (Stopped, true) => Some(Transition::Initialize),
        (Idle, false) => Some(Transition::Park),
        (Running, false) => Some(Transition::Stop),
        (Running, true) | (Stopped, false) | (Initializing, _) | (Failed, _) => None,
    }
}

/// Unit tests for lifecycle state machine primitives.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Domain, ErrorKind, Payload};
    use crate::lifecycle::ALL_PHASES;

    #[test]
    fn invalid_transition_has_payload() {
        let e = begin(Phase::Running, Transition::Initialize).unwrap_err();
        assert_eq!(e.kind, ErrorKind::InvalidTransition);
        assert_eq!(e.domain, Domain::Lifecycle);

        match e.payload {
            Payload::Transition {
                from_phase,
                via_transition,
            } => {
                assert_eq!(from_phase, Phase::Running.id());
                assert_eq!(via_transition, Transition::Initialize.id());
            }
            _ => panic!("expected Transition payload"),
        }
    }

    #[test]
    fn initialize_success_path_uses_intermediate_phase() {
        let mid = begin(Phase::Idle, Transition::Initialize).unwrap();
        assert_eq!(mid, Phase::Initializing);

        let end = finish(mid, Transition::Initialize, InitOutcome::Succeeded).unwrap();
        assert_eq!(end, Phase::Running);
    }

    #[test]
    fn initialize_failure_is_terminal() {
        let mid = begin(Phase::Stopped, Transition::Initialize).unwrap();
        let end = finish(mid, Transition::Initialize, InitOutcome::Failed).unwrap();
        assert_eq!(end, Phase::Failed);
        assert!(available_transitions(end).is_empty());
    }

    #[test]
    fn second_initialize_is_rejected_while_pending() {
        let err = begin(Phase::Initializing, Transition::Initialize).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidTransition);
    }

    #[test]
    fn finish_requires_an_outstanding_initialize() {
        assert!(finish(Phase::Running, Transition::Initialize, InitOutcome::Succeeded).is_err());
        assert!(finish(Phase::Initializing, Transition::Stop, InitOutcome::Succeeded).is_err());
    }

    #[test]
    fn reconcile_is_idempotent_for_matching_phases() {
        assert_eq!(reconcile(Phase::Running, true), None);
        assert_eq!(reconcile(Phase::Stopped, false), None);
        assert_eq!(reconcile(Phase::Running, false), Some(Transition::Stop));
        assert_eq!(reconcile(Phase::Stopped, true), Some(Transition::Initialize));
    }

    #[test]
    fn reconcile_never_leaves_failed() {
        assert_eq!(reconcile(Phase::Failed, true), None);
        assert_eq!(reconcile(Phase::Failed, false), None);
    }

    #[test]
    fn reconciled_transitions_are_always_available() {
        for phase in ALL_PHASES {
            for enabled in [true, false] {
                if let Some(t) = reconcile(phase, enabled) {
                    assert!(
                        available_transitions(phase).contains(&t),
                        "{phase:?} cannot take {t:?}"
                    );
                }
            }
        }
    }
}
