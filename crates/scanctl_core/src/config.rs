//! Host intent and engine capture configuration.
//!
//! `DesiredState` is what the host declares on every update. `ConfigBuilder`
//! merges its partial `CaptureOptions` over `CaptureDefaults` and produces the
//! immutable `CaptureConfig` handed verbatim to the engine's `initialize`.

use serde::{Deserialize, Serialize};

/// Capture-target identifier used when the host does not name one.
pub const DEFAULT_TARGET: &str = "__process_div";
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_FREQUENCY: u32 = 5;
pub const DEFAULT_STREAM_NAME: &str = "Live";
/// Worker count used when host parallelism cannot be determined.
pub const FALLBACK_WORKERS: u32 = 4;

/// Recognition mode requested by the host.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanTarget {
    #[default]
    Barcode,
    QrCode,
}

impl ScanTarget {
    pub const fn label(self) -> &'static str {
        match self {
            ScanTarget::Barcode => "barcode",
            ScanTarget::QrCode => "qrcode",
        }
    }

    /// Only linear barcodes are served by the engine.
    pub const fn is_supported(self) -> bool {
        matches!(self, ScanTarget::Barcode)
    }
}

/// Whether the engine keeps running after a detection.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Keep detecting until the host disables the controller.
    #[default]
    Continuous,
    /// Stop the engine after the first detection of a running period.
    SingleShot,
}

/// What to do when capture parameters change while the engine is running.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconfigurePolicy {
    /// Record the change; it takes effect on the next resume.
    #[default]
    Deferred,
    /// Stop and reinitialize immediately.
    Restart,
}

/// Engine input stream type.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum StreamType {
    ImageStream,
    VideoStream,
    #[default]
    LiveStream,
}

/// Symbology readers understood by the engine.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Reader {
    #[serde(rename = "2of5_reader")]
    TwoOfFive,
    #[serde(rename = "codabar_reader")]
    Codabar,
    #[serde(rename = "code_39_reader")]
    Code39,
    #[serde(rename = "code_39_vin_reader")]
    Code39Vin,
    #[serde(rename = "code_93_reader")]
    Code93,
    #[serde(rename = "code_128_reader")]
    Code128,
    #[serde(rename = "ean_reader")]
    Ean,
    #[serde(rename = "ean_2_reader")]
    Ean2,
    #[serde(rename = "ean_5_reader")]
    Ean5,
    #[serde(rename = "ean_8_reader")]
    Ean8,
    #[serde(rename = "ean_13_reader")]
    Ean13,
    #[serde(rename = "i2of5_reader")]
    Interleaved2of5,
    #[serde(rename = "upc_reader")]
    Upc,
    #[serde(rename = "upc_e_reader")]
    UpcE,
}

impl Reader {
    /// Engine-facing reader name.
    pub const fn label(self) -> &'static str {
        match self {
            Reader::TwoOfFive => "2of5_reader",
            Reader::Codabar => "codabar_reader",
            Reader::Code39 => "code_39_reader",
            Reader::Code39Vin => "code_39_vin_reader",
            Reader::Code93 => "code_93_reader",
            Reader::Code128 => "code_128_reader",
            Reader::Ean => "ean_reader",
            Reader::Ean2 => "ean_2_reader",
            Reader::Ean5 => "ean_5_reader",
            Reader::Ean8 => "ean_8_reader",
            Reader::Ean13 => "ean_13_reader",
            Reader::Interleaved2of5 => "i2of5_reader",
            Reader::Upc => "upc_reader",
            Reader::UpcE => "upc_e_reader",
        }
    }
}

/// Canonical list of all readers.
pub const ALL_READERS: [Reader; 14] = [
    Reader::TwoOfFive,
    Reader::Codabar,
    Reader::Code39,
    Reader::Code39Vin,
    Reader::Code93,
    Reader::Code128,
    Reader::Ean,
    Reader::Ean2,
    Reader::Ean5,
    Reader::Ean8,
    Reader::Ean13,
    Reader::Interleaved2of5,
    Reader::Upc,
    Reader::UpcE,
];

/// Caller-supplied partial override of `CaptureDefaults`.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_of_workers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub stream_type: Option<StreamType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readers: Option<Vec<Reader>>,
}

/// Base capture options.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CaptureDefaults {
    pub frequency: u32,
    pub num_of_workers: u32,
    pub name: String,
    pub stream_type: StreamType,
    pub readers: Vec<Reader>,
}

impl CaptureDefaults {
    /// Defaults with the worker count taken from host parallelism.
    pub fn detect() -> Self {
        let num_of_workers = std::thread::available_parallelism()
            .ok()
            .and_then(|n| u32::try_from(n.get()).ok())
            .unwrap_or(FALLBACK_WORKERS);
        Self::with_workers(num_of_workers)
    }

    pub fn with_workers(num_of_workers: u32) -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY,
            num_of_workers,
            name: DEFAULT_STREAM_NAME.to_string(),
            stream_type: StreamType::LiveStream,
            readers: vec![Reader::Ean],
        }
    }

    /// Shallow merge: every `Some` in `options` replaces the default outright.
    pub fn merge(&self, options: &CaptureOptions) -> Self {
        Self {
            frequency: options.frequency.unwrap_or(self.frequency),
            num_of_workers: options.num_of_workers.unwrap_or(self.num_of_workers),
            name: options.name.clone().unwrap_or_else(|| self.name.clone()),
            stream_type: options.stream_type.unwrap_or(self.stream_type),
            readers: options
                .readers
                .clone()
                .unwrap_or_else(|| self.readers.clone()),
        }
    }
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self::detect()
    }
}

fn default_target() -> String {
    DEFAULT_TARGET.to_string()
}
fn default_width() -> u32 {
    DEFAULT_WIDTH
}
fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

/// Host-declared intent, re-evaluated on every update.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredState {
    pub enabled: bool,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub scan_type: ScanTarget,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub options: CaptureOptions,
    #[serde(default)]
    pub mode: DetectionMode,
    #[serde(default)]
    pub reconfigure: ReconfigurePolicy,

    // Presentation passthroughs; inert to the controller.
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

impl DesiredState {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            target: default_target(),
            scan_type: ScanTarget::default(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            device_id: None,
            options: CaptureOptions::default(),
            mode: DetectionMode::default(),
            reconfigure: ReconfigurePolicy::default(),
            class_name: None,
            style: None,
        }
    }

    /// True if any field that feeds `CaptureConfig` differs.
    pub fn capture_differs(&self, other: &DesiredState) -> bool {
        self.target != other.target
            || self.width != other.width
            || self.height != other.height
            || self.device_id != other.device_id
            || self.options != other.options
    }
}

// ---------------- Engine-facing configuration ----------------

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    Environment,
    User,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facing_mode: Option<FacingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorDebug {
    pub show_canvas: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    pub debug: LocatorDebug,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct InputStream {
    pub name: String,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    pub target: String,
    pub constraints: Constraints,
    pub locator: Locator,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Decoder {
    pub readers: Vec<Reader>,
    pub multiple: bool,
}

/// Immutable configuration passed verbatim to the engine's `initialize`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    pub num_of_workers: u32,
    pub locate: bool,
    pub input_stream: InputStream,
    pub frequency: u32,
    pub decoder: Decoder,
}

/// Builds `CaptureConfig` from host intent. Pure; cannot fail.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    defaults: CaptureDefaults,
}

impl ConfigBuilder {
    pub fn new(defaults: CaptureDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &CaptureDefaults {
        &self.defaults
    }

    pub fn build(&self, desired: &DesiredState) -> CaptureConfig {
        let opts = self.defaults.merge(&desired.options);
        let facing_mode = match desired.device_id {
            Some(_) => None,
            None => Some(FacingMode::Environment),
        };

        CaptureConfig {
            num_of_workers: opts.num_of_workers,
            locate: true,
            input_stream: InputStream {
                name: opts.name,
                stream_type: opts.stream_type,
                target: desired.target.clone(),
                constraints: Constraints {
                    width: desired.width,
                    height: desired.height,
                    facing_mode,
                    device_id: desired.device_id.clone(),
                },
                locator: Locator {
                    debug: LocatorDebug { show_canvas: false },
                },
            },
            frequency: opts.frequency,
            decoder: Decoder {
                readers: opts.readers,
                multiple: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder() -> ConfigBuilder {
        ConfigBuilder::new(CaptureDefaults::with_workers(8))
    }

    #[test]
    fn defaults_flow_into_config() {
        let config = builder().build(&DesiredState::new(true));

        assert_eq!(config.num_of_workers, 8);
        assert_eq!(config.frequency, DEFAULT_FREQUENCY);
        assert_eq!(config.input_stream.name, "Live");
        assert_eq!(config.input_stream.stream_type, StreamType::LiveStream);
        assert_eq!(config.input_stream.target, DEFAULT_TARGET);
        assert_eq!(config.decoder.readers, vec![Reader::Ean]);
        assert!(!config.decoder.multiple);
        assert!(config.locate);
    }

    #[test]
    fn overrides_replace_whole_fields() {
        let mut desired = DesiredState::new(true);
        desired.options = CaptureOptions {
            frequency: Some(10),
            readers: Some(vec![Reader::Code128, Reader::Ean8]),
            stream_type: Some(StreamType::VideoStream),
            ..CaptureOptions::default()
        };

        let config = builder().build(&desired);
        assert_eq!(config.frequency, 10);
        assert_eq!(config.decoder.readers, vec![Reader::Code128, Reader::Ean8]);
        assert_eq!(config.input_stream.stream_type, StreamType::VideoStream);
        // untouched fields keep their defaults
        assert_eq!(config.num_of_workers, 8);
        assert_eq!(config.input_stream.name, "Live");
    }

    #[test]
    fn device_id_suppresses_facing_mode() {
        let mut desired = DesiredState::new(true);
        let config = builder().build(&desired);
        assert_eq!(
            config.input_stream.constraints.facing_mode,
            Some(FacingMode::Environment)
        );

        desired.device_id = Some("cam-2".into());
        let config = builder().build(&desired);
        assert_eq!(config.input_stream.constraints.facing_mode, None);
        assert_eq!(config.input_stream.constraints.device_id.as_deref(), Some("cam-2"));
    }

    #[test]
    fn config_serializes_in_engine_shape() {
        let config = builder().build(&DesiredState::new(true));
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(
            value,
            json!({
                "numOfWorkers": 8,
                "locate": true,
                "inputStream": {
                    "name": "Live",
                    "type": "LiveStream",
                    "target": "__process_div",
                    "constraints": { "width": 640, "height": 480, "facingMode": "environment" },
                    "locator": { "debug": { "showCanvas": false } }
                },
                "frequency": 5,
                "decoder": { "readers": ["ean_reader"], "multiple": false }
            })
        );
    }

    #[test]
    fn desired_state_deserializes_with_defaults() {
        let desired: DesiredState = serde_json::from_value(json!({
            "enabled": true,
            "options": { "type": "ImageStream", "readers": ["upc_e_reader", "2of5_reader"] }
        }))
        .unwrap();

        assert_eq!(desired.width, DEFAULT_WIDTH);
        assert_eq!(desired.scan_type, ScanTarget::Barcode);
        assert_eq!(desired.mode, DetectionMode::Continuous);
        assert_eq!(desired.options.stream_type, Some(StreamType::ImageStream));
        assert_eq!(
            desired.options.readers,
            Some(vec![Reader::UpcE, Reader::TwoOfFive])
        );
    }

    #[test]
    fn desired_state_uses_camel_case_keys() {
        let mut desired = DesiredState::new(true);
        desired.device_id = Some("cam-1".into());
        desired.class_name = Some("viewport".into());
        desired.mode = DetectionMode::SingleShot;

        let value = serde_json::to_value(&desired).unwrap();
        assert_eq!(value["deviceId"], json!("cam-1"));
        assert_eq!(value["scanType"], json!("barcode"));
        assert_eq!(value["className"], json!("viewport"));
        assert_eq!(value["mode"], json!("single_shot"));
        assert!(value.get("device_id").is_none());

        let back: DesiredState = serde_json::from_value(json!({
            "enabled": false,
            "deviceId": "cam-2",
            "scanType": "qrcode"
        }))
        .unwrap();
        assert_eq!(back.device_id.as_deref(), Some("cam-2"));
        assert_eq!(back.scan_type, ScanTarget::QrCode);
    }

    #[test]
    fn enabled_is_required() {
        let err = serde_json::from_value::<DesiredState>(json!({ "width": 320 }));
        assert!(err.is_err());
    }

    #[test]
    fn unknown_reader_is_rejected_at_deserialization() {
        let err = serde_json::from_value::<CaptureOptions>(json!({ "readers": ["qr_reader"] }));
        assert!(err.is_err());
    }

    #[test]
    fn reader_labels_match_serde_names() {
        for reader in ALL_READERS {
            assert_eq!(
                serde_json::to_value(reader).unwrap(),
                json!(reader.label())
            );
        }
    }

    #[test]
    fn capture_differs_ignores_enabled_and_presentation() {
        let a = DesiredState::new(true);
        let mut b = a.clone();
        b.enabled = false;
        b.class_name = Some("scanner".into());
        b.mode = DetectionMode::SingleShot;
        assert!(!a.capture_differs(&b));

        b.width = 1280;
        assert!(a.capture_differs(&b));
    }
}
