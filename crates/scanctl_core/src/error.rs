use std::borrow::Cow;
use thiserror::Error;

use crate::config::ScanTarget;

pub type Result<T> = std::result::Result<T, CoreError>;

/// How loudly an error should be logged when no host handler takes it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    /// Recoverable or ignorable: stale transitions, malformed payloads.
    Warn,
    /// Ends the mount cycle.
    Error,
}

/// Subsystem an error originated in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Domain {
    Lifecycle,
    Capability,
    Config,
    Engine,
    Host,
    Other,
}

/// What went wrong, for matching.
///
/// The first four are the mount failures a host can observe through
/// `on_error`; each one leaves the controller in `Failed`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// The platform cannot provide a capture stream.
    CapabilityUnavailable,
    /// No detection handler was supplied by the host.
    MissingHandler,
    /// The requested recognition mode is not served by the engine.
    InvalidScanTarget,
    /// The engine rejected `initialize` (bad config, hardware or permission denial).
    EngineInit,

    /// The controller was driven outside a tokio runtime.
    InvalidState,
    /// A transition was requested from a phase that does not allow it.
    InvalidTransition,
    /// An engine payload did not decode.
    ProtocolViolation,
    Other,
}

/// Structured context attached to an error.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Payload {
    None,
    Context {
        key: &'static str,
        value: Cow<'static, str>,
    },
    /// Phase and transition ids of a rejected transition.
    Transition { from_phase: u8, via_transition: u8 },
}

/// Error shared by the core, the tokio adapter and the host callbacks.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("{severity:?}: {message}")]
pub struct CoreError {
    pub domain: Domain,
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: Cow<'static, str>,
    pub payload: Payload,
}

impl CoreError {
    /// Start building an error that ends the mount cycle.
    pub fn error() -> CoreErrorBuilder {
        CoreErrorBuilder::with_severity(Severity::Error)
    }

    /// Start building a recoverable error.
    pub fn warn() -> CoreErrorBuilder {
        CoreErrorBuilder::with_severity(Severity::Warn)
    }

    pub fn capability_unavailable() -> Self {
        CoreError::error()
            .domain(Domain::Capability)
            .kind(ErrorKind::CapabilityUnavailable)
            .msg("media capture is not supported on this platform")
            .build()
    }

    pub fn missing_handler() -> Self {
        CoreError::error()
            .domain(Domain::Host)
            .kind(ErrorKind::MissingHandler)
            .msg("on_detected handler is missing")
            .build()
    }

    /// The host requested a recognition mode the engine cannot serve.
    pub fn invalid_scan_target(target: ScanTarget) -> Self {
        CoreError::error()
            .domain(Domain::Config)
            .kind(ErrorKind::InvalidScanTarget)
            .msg(format!("no valid scan type is specified: {}", target.label()))
            .payload(Payload::Context {
                key: "scan_type",
                value: Cow::Borrowed(target.label()),
            })
            .build()
    }

    pub fn engine_init(message: impl Into<Cow<'static, str>>) -> Self {
        CoreError::error()
            .domain(Domain::Engine)
            .kind(ErrorKind::EngineInit)
            .msg(message)
            .build()
    }

    /// `via_transition` is not allowed from `from_phase`.
    pub fn invalid_transition(from_phase: u8, via_transition: u8) -> Self {
        CoreError::warn()
            .domain(Domain::Lifecycle)
            .kind(ErrorKind::InvalidTransition)
            .msg("invalid lifecycle transition")
            .payload(Payload::Transition {
                from_phase,
                via_transition,
            })
            .build()
    }

    /// True for the kinds that put a controller into its terminal `Failed` phase.
    pub const fn is_mount_fatal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::CapabilityUnavailable
                | ErrorKind::MissingHandler
                | ErrorKind::InvalidScanTarget
                | ErrorKind::EngineInit
                | ErrorKind::InvalidState
        )
    }
}

/// Chained builder for `CoreError`. Unset fields fall back to
/// `Domain::Other`, `ErrorKind::Other`, an empty message and no payload.
#[derive(Debug, Clone)]
pub struct CoreErrorBuilder {
    error: CoreError,
}

impl CoreErrorBuilder {
    fn with_severity(severity: Severity) -> Self {
        Self {
            error: CoreError {
                domain: Domain::Other,
                kind: ErrorKind::Other,
                severity,
                message: Cow::Borrowed(""),
                payload: Payload::None,
            },
        }
    }

    pub fn domain(mut self, domain: Domain) -> Self {
        self.error.domain = domain;
        self
    }

    pub fn kind(mut self, kind: ErrorKind) -> Self {
        self.error.kind = kind;
        self
    }

    pub fn msg(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.error.message = message.into();
        self
    }

    /// Replaces any payload set earlier.
    pub fn payload(mut self, payload: Payload) -> Self {
        self.error.payload = payload;
        self
    }

    pub fn build(self) -> CoreError {
        self.error
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::warn()
            .domain(Domain::Engine)
            .kind(ErrorKind::ProtocolViolation)
            .msg("malformed engine payload")
            .payload(Payload::Context {
                key: "json",
                value: e.to_string().into(),
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_other() {
        let e = CoreError::warn().msg("x").build();
        assert_eq!(e.domain, Domain::Other);
        assert_eq!(e.kind, ErrorKind::Other);
        assert_eq!(e.payload, Payload::None);
        assert_eq!(e.to_string(), "Warn: x");
    }

    #[test]
    fn mount_failures_are_fatal() {
        for e in [
            CoreError::capability_unavailable(),
            CoreError::missing_handler(),
            CoreError::invalid_scan_target(ScanTarget::QrCode),
            CoreError::engine_init("permission denied"),
        ] {
            assert!(e.is_mount_fatal(), "{e}");
            assert_eq!(e.severity, Severity::Error);
        }
        assert!(!CoreError::invalid_transition(0, 0).is_mount_fatal());
    }

    #[test]
    fn invalid_scan_target_names_the_target() {
        let e = CoreError::invalid_scan_target(ScanTarget::QrCode);
        assert!(e.message.contains("qrcode"));
        assert_eq!(
            e.payload,
            Payload::Context {
                key: "scan_type",
                value: Cow::Borrowed("qrcode"),
            }
        );
    }

    #[test]
    fn json_errors_are_protocol_violations() {
        let e = CoreError::from(serde_json::from_str::<u32>("{").unwrap_err());
        assert_eq!(e.kind, ErrorKind::ProtocolViolation);
        assert_eq!(e.severity, Severity::Warn);
        assert!(matches!(e.payload, Payload::Context { key: "json", .. }));
    }
}
