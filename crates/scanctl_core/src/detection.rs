//! Engine detection payloads and the normalized shape delivered to hosts.

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::Result;

/// Decoded symbol as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeResult {
    pub code: String,
    pub direction: i32,
    pub format: String,
}

/// Raw engine detection event. Fields the controller does not forward
/// (bounding boxes, scan lines) are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    pub code_result: CodeResult,
    pub angle: f64,
    /// Passed through as the engine encoded it.
    #[serde(default)]
    pub pattern: Vec<Number>,
}

impl RawDetection {
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn from_value(payload: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(payload)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionMeta {
    pub angle: f64,
    pub direction: i32,
    pub format: String,
    pub pattern: Vec<Number>,
}

/// Normalized detection handed to the host's `on_detected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub result: String,
    pub meta: DetectionMeta,
}

impl From<RawDetection> for DetectionResult {
    fn from(raw: RawDetection) -> Self {
        let RawDetection {
            code_result:
                CodeResult {
                    code,
                    direction,
                    format,
                },
            angle,
            pattern,
        } = raw;

        Self {
            result: code,
            meta: DetectionMeta {
                angle,
                direction,
                format,
                pattern,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn bits(values: &[u8]) -> Vec<Number> {
        values.iter().copied().map(Number::from).collect()
    }

    const EAN_13: &str = r#"{
        "codeResult": { "code": "012345678905", "direction": 1, "format": "ean_13" },
        "angle": 3.2,
        "pattern": [0, 1, 1, 0, 1],
        "box": [[0, 0], [1, 1]]
    }"#;

    #[test]
    fn maps_ean13_payload_without_loss() {
        let result = DetectionResult::from(RawDetection::from_json(EAN_13).unwrap());

        assert_eq!(
            result,
            DetectionResult {
                result: "012345678905".into(),
                meta: DetectionMeta {
                    angle: 3.2,
                    direction: 1,
                    format: "ean_13".into(),
                    pattern: bits(&[0, 1, 1, 0, 1]),
                },
            }
        );
    }

    #[test]
    fn normalized_json_keeps_field_order() {
        let result = DetectionResult::from(RawDetection::from_json(EAN_13).unwrap());
        let text = serde_json::to_string(&result).unwrap();
        assert_eq!(
            text,
            r#"{"result":"012345678905","meta":{"angle":3.2,"direction":1,"format":"ean_13","pattern":[0,1,1,0,1]}}"#
        );
    }

    #[test]
    fn fractional_pattern_values_survive_unchanged() {
        let raw = RawDetection::from_value(json!({
            "codeResult": { "code": "96385074", "direction": -1, "format": "ean_8" },
            "angle": 0.5,
            "pattern": [0.25, 1, 0.0]
        }))
        .unwrap();
        let value = serde_json::to_value(DetectionResult::from(raw)).unwrap();
        assert_eq!(value["meta"]["pattern"].to_string(), "[0.25,1,0.0]");
    }

    #[test]
    fn missing_code_result_is_a_protocol_violation() {
        let err = RawDetection::from_value(json!({ "angle": 0.0 })).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProtocolViolation);
    }
}
