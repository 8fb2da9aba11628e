/// Controller-initiated lifecycle transitions.
///
/// Completion of an `Initialize` is modeled via `finish(Initializing, Initialize, InitOutcome)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transition {
    /// Build a fresh config and call the engine's `initialize`.
    Initialize,
    /// Stop a running engine.
    Stop,
    /// Mounted while disabled: settle without touching the engine.
    Park,
    /// Validation failed before any engine call.
    Reject,
}

/// Internal, compact IDs used for error payloads.
impl Transition {
    pub const fn id(self) -> u8 {
        match self {
            Transition::Initialize => 1,
            Transition::Stop => 2,
            Transition::Park => 3,
            Transition::Reject => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Transition::Initialize => "initialize",
            Transition::Stop => "stop",
            Transition::Park => "park",
            Transition::Reject => "reject",
        }
    }
}

/// Outcome of an engine `initialize` call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InitOutcome {
    Succeeded,
    Failed,
}
