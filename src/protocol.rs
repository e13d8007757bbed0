// Control-channel message vocabulary
//
// Messages are JSON objects tagged by an `action` field. Both directions are
// closed unions: an unknown tag is Malformed, a known tag with a bad payload
// is InvalidPayload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::SensitivityLevel;
use crate::calibration::Baseline;
use crate::error::ProtocolError;
use crate::metrics::MetricName;

/// Actions consumed from the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlAction {
    /// Capture a baseline from the latest snapshot
    Calibrate,
    /// Install a stored baseline; `null` leaves the session uncalibrated
    SetBaseline { data: Option<Baseline> },
    SetSensitivity { level: SensitivityLevel },
    StartMonitoring,
    StopMonitoring,
}

impl ControlAction {
    pub const ACTIONS: [&'static str; 5] = [
        "calibrate",
        "setBaseline",
        "setSensitivity",
        "startMonitoring",
        "stopMonitoring",
    ];

    /// Decode and validate one controller message
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::Malformed {
                reason: "missing string field 'action'".to_string(),
            })?
            .to_string();

        if !Self::ACTIONS.contains(&action.as_str()) {
            return Err(ProtocolError::Malformed {
                reason: format!("unknown action '{}'", action),
            });
        }

        let parsed: ControlAction =
            serde_json::from_value(value).map_err(|err| ProtocolError::InvalidPayload {
                action: action.clone(),
                reason: err.to_string(),
            })?;

        if let ControlAction::SetBaseline { data: Some(baseline) } = &parsed {
            baseline
                .validate()
                .map_err(|err| ProtocolError::InvalidPayload {
                    action,
                    reason: err.to_string(),
                })?;
        }

        Ok(parsed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ControlAction::Calibrate => "calibrate",
            ControlAction::SetBaseline { .. } => "setBaseline",
            ControlAction::SetSensitivity { .. } => "setSensitivity",
            ControlAction::StartMonitoring => "startMonitoring",
            ControlAction::StopMonitoring => "stopMonitoring",
        }
    }
}

/// Events produced for the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CoreEvent {
    /// Show a notification; `reason` is `None` for non-posture messages
    SendNotification {
        message: String,
        reason: Option<MetricName>,
    },
    /// Persist a freshly captured baseline
    SaveBaseline { data: Baseline },
    /// Frame counts of the interval that was just flushed
    #[serde(rename_all = "camelCase")]
    UpdateFrameStats { good_frames: u64, bad_frames: u64 },
}

impl CoreEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::BASELINE_SCHEMA_VERSION;
    use crate::error::{ErrorCode, ProtocolErrorCodes};
    use serde_json::json;

    #[test]
    fn test_parse_unit_actions() {
        assert_eq!(
            ControlAction::from_json(r#"{"action":"calibrate"}"#).unwrap(),
            ControlAction::Calibrate
        );
        assert_eq!(
            ControlAction::from_json(r#"{"action":"stopMonitoring"}"#).unwrap(),
            ControlAction::StopMonitoring
        );
    }

    #[test]
    fn test_parse_set_sensitivity() {
        let action = ControlAction::from_json(r#"{"action":"setSensitivity","level":3}"#).unwrap();
        assert_eq!(
            action,
            ControlAction::SetSensitivity {
                level: SensitivityLevel::High
            }
        );
    }

    #[test]
    fn test_out_of_range_level_is_invalid_payload() {
        for level in [0, 4] {
            let raw = json!({ "action": "setSensitivity", "level": level }).to_string();
            let err = ControlAction::from_json(&raw).unwrap_err();
            assert_eq!(err.code(), ProtocolErrorCodes::INVALID_PAYLOAD);
        }
    }

    #[test]
    fn test_unknown_action_is_malformed() {
        let err = ControlAction::from_json(r#"{"action":"selfDestruct"}"#).unwrap_err();
        assert_eq!(err.code(), ProtocolErrorCodes::MALFORMED);

        let err = ControlAction::from_json(r#"{"level":2}"#).unwrap_err();
        assert_eq!(err.code(), ProtocolErrorCodes::MALFORMED);

        let err = ControlAction::from_json("not json").unwrap_err();
        assert_eq!(err.code(), ProtocolErrorCodes::MALFORMED);
    }

    #[test]
    fn test_set_baseline_null_and_valid() {
        let cleared = ControlAction::from_json(r#"{"action":"setBaseline","data":null}"#).unwrap();
        assert_eq!(cleared, ControlAction::SetBaseline { data: None });

        let raw = json!({
            "action": "setBaseline",
            "data": {
                "schemaVersion": BASELINE_SCHEMA_VERSION,
                "capturedAt": "2024-05-01T09:30:00Z",
                "metrics": {
                    "neckAngle": 160.0,
                    "slumpDepth": -4.0,
                    "headTilt": 0.0,
                    "shoulderTilt": 0.5
                }
            }
        });
        let action = ControlAction::from_value(raw).unwrap();
        assert!(matches!(action, ControlAction::SetBaseline { data: Some(_) }));
    }

    #[test]
    fn test_set_baseline_rejects_legacy_and_partial() {
        let legacy = json!({
            "action": "setBaseline",
            "data": { "turtle_diff_x": 0.1, "tilt_diff_y": 0.0 }
        });
        assert!(matches!(
            ControlAction::from_value(legacy),
            Err(ProtocolError::InvalidPayload { .. })
        ));

        let partial = json!({
            "action": "setBaseline",
            "data": {
                "schemaVersion": BASELINE_SCHEMA_VERSION,
                "capturedAt": "2024-05-01T09:30:00Z",
                "metrics": { "neckAngle": 160.0 }
            }
        });
        assert!(matches!(
            ControlAction::from_value(partial),
            Err(ProtocolError::InvalidPayload { ref action, .. }) if action == "setBaseline"
        ));
    }

    #[test]
    fn test_event_wire_format() {
        let event = CoreEvent::UpdateFrameStats {
            good_frames: 40,
            bad_frames: 10,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "action": "updateFrameStats", "goodFrames": 40, "badFrames": 10 })
        );

        let notification = CoreEvent::SendNotification {
            message: "Sit up".to_string(),
            reason: Some(MetricName::NeckAngle),
        };
        assert_eq!(
            serde_json::to_value(&notification).unwrap(),
            json!({ "action": "sendNotification", "message": "Sit up", "reason": "neckAngle" })
        );
    }
}
