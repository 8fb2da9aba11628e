use crate::error::CoreError;

/// Controller lifecycle phases.
///
/// Stable phases:
/// - Idle, Running, Stopped, Failed
///
/// Intermediate phase (an `initialize` call is outstanding):
/// - Initializing
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    Idle,
    Initializing,
    Running,
    Stopped,
    Failed,
}

/// Internal, compact IDs used for error payloads and event streams.
impl Phase {
    pub const fn id(self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::Running => 1,
            Phase::Stopped => 2,
            Phase::Failed => 3,
            Phase::Initializing => 10,
        }
    }

    /// True while an `initialize` call is outstanding.
    pub const fn is_transitioning(self) -> bool {
        matches!(self, Phase::Initializing)
    }

    /// Terminal sink for the current mount cycle.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Phase::Failed)
    }

    /// Whether a host should render its "loading" affordance.
    ///
    /// False once a mount attempt has settled (`Running` or `Failed`).
    pub const fn is_loading(self) -> bool {
        !matches!(self, Phase::Running | Phase::Failed)
    }

    /// Stable, human-readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Initializing => "Initializing",
            Phase::Running => "Running",
            Phase::Stopped => "Stopped",
            Phase::Failed => "Failed",
        }
    }
}

/// Canonical list of all phases.
pub const ALL_PHASES: [Phase; 5] = [
    Phase::Idle,
    Phase::Initializing,
    Phase::Running,
    Phase::Stopped,
    Phase::Failed,
];

/// Observable controller state.
///
/// `error` is only ever populated in `Failed`; entering any other phase clears it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ControlState {
    phase: Phase,
    error: Option<CoreError>,
}

impl ControlState {
    pub const fn new() -> Self {
        Self {
            phase: Phase::Idle,
            error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn error(&self) -> Option<&CoreError> {
        self.error.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.phase.is_loading()
    }

    /// Move to a non-failed phase. Returns the previous phase.
    pub fn enter(&mut self, phase: Phase) -> Phase {
        debug_assert!(phase != Phase::Failed, "use fail() to enter Failed");
        let previous = self.phase;
        self.phase = phase;
        self.error = None;
        previous
    }

    /// Record a failure and move to `Failed`. Returns the previous phase.
    pub fn fail(&mut self, error: CoreError) -> Phase {
        let previous = self.phase;
        self.phase = Phase::Failed;
        self.error = Some(error);
        previous
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_clears_only_in_settled_phases() {
        let loading: Vec<_> = ALL_PHASES.iter().filter(|p| p.is_loading()).collect();
        assert_eq!(
            loading,
            [&Phase::Idle, &Phase::Initializing, &Phase::Stopped]
        );
    }

    #[test]
    fn error_is_cleared_when_leaving_failed() {
        let mut state = ControlState::new();
        assert_eq!(state.fail(CoreError::missing_handler()), Phase::Idle);
        assert!(state.error().is_some());
        assert!(!state.loading());

        assert_eq!(state.enter(Phase::Stopped), Phase::Failed);
        assert!(state.error().is_none());
        assert!(state.loading());
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<u8> = ALL_PHASES.iter().map(|p| p.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), ALL_PHASES.len());
    }
}
