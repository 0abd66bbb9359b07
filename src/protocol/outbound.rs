//! Outbound message types.
//!
//! The client sends two kinds of messages:
//!
//! | Message | WebSocket frame | When |
//! |---------|-----------------|------|
//! | [`OutboundFrame`] | Binary (JPEG bytes) | Every accepted capture sample |
//! | [`ControlMessage::Stop`] | Text `{"type":"stop"}` | Once, on teardown |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::to_string;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use crate::error::Result;

// ============================================================================
// ControlMessage
// ============================================================================

/// Control signal sent as a JSON text message.
///
/// # Format
///
/// ```json
/// { "type": "stop" }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// End of session; the service should finalize metrics.
    Stop,
}

impl ControlMessage {
    /// Serializes into a WebSocket text message.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_message(&self) -> Result<Message> {
        Ok(Message::Text(to_string(self)?.into()))
    }
}

// ============================================================================
// OutboundFrame
// ============================================================================

/// One encoded camera sample ready for delivery.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// JPEG bytes.
    pub data: Vec<u8>,
    /// Encoded width in pixels.
    pub width: u32,
    /// Encoded height in pixels.
    pub height: u32,
    /// When the source sample was accepted.
    pub captured_at: Instant,
}

impl OutboundFrame {
    /// Returns the payload size in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Converts into a WebSocket binary message.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message::Binary(self.data.into())
    }
}

// ============================================================================
// Tests
// ============================================================================
