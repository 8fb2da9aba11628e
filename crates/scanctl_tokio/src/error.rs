use scanctl_core::error::{CoreError, Severity};

use crate::engine::EngineError;

pub fn log_core_error(err: &CoreError) {
    match err.severity {
        Severity::Warn => tracing::warn!(kind = ?err.kind, domain = ?err.domain, "{err}"),
        Severity::Error => tracing::error!(kind = ?err.kind, domain = ?err.domain, "{err}"),
    }
}

impl From<EngineError> for CoreError {
    fn from(e: EngineError) -> Self {
        CoreError::engine_init(e.message)
    }
}
