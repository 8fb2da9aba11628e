use std::fmt;
use std::sync::Arc;

use scanctl_core::config::{
    CaptureOptions, DesiredState, DetectionMode, ReconfigurePolicy, ScanTarget,
};
use scanctl_core::detection::DetectionResult;
use scanctl_core::error::CoreError;

use crate::error::log_core_error;

pub type DetectionHandler = Arc<dyn Fn(DetectionResult) + Send + Sync + 'static>;
pub type ErrorHandler = Arc<dyn Fn(CoreError) + Send + Sync + 'static>;

/// Everything the host declares on mount and on each update.
///
/// Built fluently:
///
/// ```ignore
/// let props = ScannerProps::new(true)
///     .on_detected(|d| println!("{}", d.result))
///     .device_id("rear-cam");
/// ```
#[derive(Clone)]
pub struct ScannerProps {
    pub desired: DesiredState,
    pub on_detected: Option<DetectionHandler>,
    pub on_error: Option<ErrorHandler>,
}

impl ScannerProps {
    pub fn new(enabled: bool) -> Self {
        Self::from_desired(DesiredState::new(enabled))
    }

    pub fn from_desired(desired: DesiredState) -> Self {
        Self {
            desired,
            on_detected: None,
            on_error: None,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.desired.enabled = enabled;
        self
    }

    pub fn on_detected<F>(mut self, handler: F) -> Self
    where
        F: Fn(DetectionResult) + Send + Sync + 'static,
    {
        self.on_detected = Some(Arc::new(handler));
        self
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(CoreError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.desired.target = target.into();
        self
    }

    pub fn scan_type(mut self, scan_type: ScanTarget) -> Self {
        self.desired.scan_type = scan_type;
        self
    }

    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.desired.width = width;
        self.desired.height = height;
        self
    }

    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.desired.device_id = Some(device_id.into());
        self
    }

    pub fn options(mut self, options: CaptureOptions) -> Self {
        self.desired.options = options;
        self
    }

    pub fn mode(mut self, mode: DetectionMode) -> Self {
        self.desired.mode = mode;
        self
    }

    pub fn reconfigure(mut self, policy: ReconfigurePolicy) -> Self {
        self.desired.reconfigure = policy;
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.desired.class_name = Some(class_name.into());
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.desired.style = Some(style.into());
        self
    }

    /// Package an error for delivery once the controller lock is released.
    pub(crate) fn error_report(&self, error: CoreError) -> ErrorReport {
        ErrorReport {
            handler: self.on_error.clone(),
            error,
        }
    }
}

/// An error waiting to be handed to the host.
#[must_use]
pub(crate) struct ErrorReport {
    handler: Option<ErrorHandler>,
    error: CoreError,
}

impl ErrorReport {
    /// Deliver to the host, falling back to logging when no handler was given.
    pub(crate) fn deliver(self) {
        match self.handler {
            Some(handler) => handler(self.error),
            None => log_core_error(&self.error),
        }
    }
}

impl fmt::Debug for ScannerProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerProps")
            .field("desired", &self.desired)
            .field("on_detected", &self.on_detected.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn builder_sets_desired_fields() {
        let props = ScannerProps::new(false)
            .enabled(true)
            .target("scanner")
            .dimensions(1280, 720)
            .device_id("cam-1")
            .mode(DetectionMode::SingleShot)
            .class_name("viewport");

        assert!(props.desired.enabled);
        assert_eq!(props.desired.target, "scanner");
        assert_eq!((props.desired.width, props.desired.height), (1280, 720));
        assert_eq!(props.desired.device_id.as_deref(), Some("cam-1"));
        assert_eq!(props.desired.mode, DetectionMode::SingleShot);
        assert!(props.on_detected.is_none());
    }

    #[test]
    fn error_report_uses_host_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let props = ScannerProps::new(true).on_error(move |e| seen2.lock().unwrap().push(e));

        let report = props.error_report(CoreError::missing_handler());
        assert!(seen.lock().unwrap().is_empty());
        report.deliver();
        assert_eq!(seen.lock().unwrap().len(), 1);

        // no handler: logs and returns
        ScannerProps::new(true)
            .error_report(CoreError::missing_handler())
            .deliver();
    }
}
