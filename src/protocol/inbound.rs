//! Inbound message types.
//!
//! Every text message from the analysis service is a flat JSON object.
//! The `type` and `error` fields select the message kind; all other fields
//! form a sparse telemetry patch.
//!
//! # Message Kinds
//!
//! | Kind | Wire shape | Effect |
//! |------|------------|--------|
//! | `Connected` | `{"type":"connected", ...}` | Handshake ack |
//! | `Keepalive` | `{"type":"keepalive"}` | Liveness only |
//! | `ServiceError` | `{"error":"..."}` | Non-fatal service error |
//! | `Data` | `{"counter":3, "stage":"down", ...}` | Telemetry patch |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use serde::Deserialize;
use serde_json::from_str;

use crate::error::{Error, Result};

// ============================================================================
// RawMessage
// ============================================================================

/// Wire representation before classification.
///
/// `null` values deserialize to `None` and count as absent.
#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    counter: Option<u32>,
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    calibration_progress: Option<f64>,
    #[serde(default)]
    calibration_complete: Option<bool>,
    #[serde(default)]
    frame: Option<String>,
    #[serde(default)]
    max_reach_cm: Option<f64>,
    #[serde(default)]
    max_height_cm: Option<f64>,
    #[serde(default)]
    max_distance_cm: Option<f64>,
    #[serde(default)]
    jump_count: Option<u32>,
    #[serde(default)]
    rep_count: Option<u32>,
}

// ============================================================================
// MessageKind
// ============================================================================

/// Discriminant of an [`InboundMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Handshake acknowledgement.
    Connected,
    /// Liveness heartbeat.
    Keepalive,
    /// Service-reported error.
    Error,
    /// Telemetry payload.
    Data,
}

impl MessageKind {
    /// Returns the kind as a short label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Keepalive => "keepalive",
            Self::Error => "error",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// HandshakeAck
// ============================================================================

/// Contents of a `connected` message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeAck {
    /// Session the service bound this connection to, if it says.
    pub session_id: Option<String>,
}

// ============================================================================
// TelemetryPatch
// ============================================================================

/// Sparse telemetry update.
///
/// `None` means the field was absent and must not overwrite anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryPatch {
    /// Repetition counter.
    pub counter: Option<u32>,
    /// Posture stage label.
    pub stage: Option<String>,
    /// Coaching feedback.
    pub feedback: Option<String>,
    /// Calibration progress, clamped to `0..=100`.
    pub calibration_progress: Option<f64>,
    /// Calibration finished flag.
    pub calibration_complete: Option<bool>,
    /// Decoded annotated preview image.
    pub preview_frame: Option<Vec<u8>>,
    /// Sit-and-reach extremum.
    pub max_reach_cm: Option<f64>,
    /// Vertical jump extremum.
    pub max_height_cm: Option<f64>,
    /// Broad jump extremum.
    pub max_distance_cm: Option<f64>,
    /// Skipping / jumping jack count.
    pub jump_count: Option<u32>,
    /// Generic repetition count.
    pub rep_count: Option<u32>,
}

impl TelemetryPatch {
    /// Returns `true` if the patch carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// InboundMessage
// ============================================================================

/// A classified message from the analysis service.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Handshake acknowledgement; confirms session binding.
    Connected(HandshakeAck),
    /// Liveness heartbeat.
    Keepalive,
    /// Application-level error reported by the service.
    ServiceError(String),
    /// Telemetry patch.
    Data(TelemetryPatch),
}

impl InboundMessage {
    /// Parses and classifies a text message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for invalid JSON, a non-object payload,
    /// mistyped fields, or an undecodable `frame`.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawMessage =
            from_str(text).map_err(|e| Error::protocol(format!("unparseable message: {e}")))?;

        match raw.kind.as_deref() {
            Some("connected") => {
                return Ok(Self::Connected(HandshakeAck {
                    session_id: raw.session_id,
                }));
            }
            Some("keepalive") => return Ok(Self::Keepalive),
            _ => {}
        }

        if let Some(error) = raw.error
            && !error.is_empty()
        {
            return Ok(Self::ServiceError(error));
        }

        let preview_frame = match raw.frame {
            Some(encoded) => Some(
                Base64Standard
                    .decode(encoded.as_bytes())
                    .map_err(|e| Error::protocol(format!("frame is not valid base64: {e}")))?,
            ),
            None => None,
        };

        Ok(Self::Data(TelemetryPatch {
            counter: raw.counter,
            stage: raw.stage,
            feedback: raw.feedback,
            calibration_progress: raw.calibration_progress.map(|p| p.clamp(0.0, 100.0)),
            calibration_complete: raw.calibration_complete,
            preview_frame,
            max_reach_cm: raw.max_reach_cm,
            max_height_cm: raw.max_height_cm,
            max_distance_cm: raw.max_distance_cm,
            jump_count: raw.jump_count,
            rep_count: raw.rep_count,
        }))
    }

    /// Returns the message kind.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Connected(_) => MessageKind::Connected,
            Self::Keepalive => MessageKind::Keepalive,
            Self::ServiceError(_) => MessageKind::Error,
            Self::Data(_) => MessageKind::Data,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connected() {
        let msg = InboundMessage::parse(r#"{"type":"connected","session_id":"s-1"}"#)
            .expect("valid message");
        assert_eq!(
            msg,
            InboundMessage::Connected(HandshakeAck {
                session_id: Some("s-1".into())
            })
        );
        assert_eq!(msg.kind(), MessageKind::Connected);
    }

    #[test]
    fn test_parse_keepalive() {
        let msg = InboundMessage::parse(r#"{"type":"keepalive"}"#).expect("valid message");
        assert_eq!(msg, InboundMessage::Keepalive);
    }

    #[test]
    fn test_parse_service_error() {
        let msg = InboundMessage::parse(r#"{"error":"Invalid frame"}"#).expect("valid message");
        assert_eq!(msg, InboundMessage::ServiceError("Invalid frame".into()));
    }

    #[test]
    fn test_empty_error_is_data() {
        let msg = InboundMessage::parse(r#"{"error":"","counter":2}"#).expect("valid message");
        assert_eq!(msg.kind(), MessageKind::Data);
    }

    #[test]
    fn test_type_takes_precedence_over_error() {
        let msg = InboundMessage::parse(r#"{"type":"keepalive","error":"ignored"}"#)
            .expect("valid message");
        assert_eq!(msg, InboundMessage::Keepalive);
    }

    #[test]
    fn test_parse_data_patch() {
        let msg = InboundMessage::parse(
            r#"{"counter":5,"stage":"down","calibration_progress":140.0,"max_height_cm":42.5}"#,
        )
        .expect("valid message");

        let InboundMessage::Data(patch) = msg else {
            panic!("expected data message");
        };
        assert_eq!(patch.counter, Some(5));
        assert_eq!(patch.stage.as_deref(), Some("down"));
        assert_eq!(patch.calibration_progress, Some(100.0));
        assert_eq!(patch.max_height_cm, Some(42.5));
        assert_eq!(patch.feedback, None);
        assert_eq!(patch.rep_count, None);
    }

    #[test]
    fn test_null_fields_are_absent() {
        let msg = InboundMessage::parse(r#"{"counter":null,"stage":null}"#).expect("valid");
        let InboundMessage::Data(patch) = msg else {
            panic!("expected data message");
        };
        assert!(patch.is_empty());
    }

    #[test]
    fn test_frame_is_base64_decoded() {
        let msg = InboundMessage::parse(r#"{"frame":"/9j/AA=="}"#).expect("valid message");
        let InboundMessage::Data(patch) = msg else {
            panic!("expected data message");
        };
        assert_eq!(patch.preview_frame, Some(vec![0xFF, 0xD8, 0xFF, 0x00]));
    }

    #[test]
    fn test_malformed_payloads_are_protocol_errors() {
        for text in [
            "{not json",
            "42",
            "\"text\"",
            r#"{"counter":"three"}"#,
            r#"{"counter":-1}"#,
            r#"{"frame":"***"}"#,
        ] {
            let err = InboundMessage::parse(text).expect_err(text);
            assert!(matches!(err, Error::Protocol { .. }), "{text}: {err}");
        }
    }
}
