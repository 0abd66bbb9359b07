//! WebSocket protocol message types.
//!
//! This module defines the message format exchanged with the remote
//! analysis service over the session connection.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Frame | Purpose |
//! |--------------|-----------|-------|---------|
//! | `OutboundFrame` | Client → Service | Binary | Encoded camera sample |
//! | `ControlMessage` | Client → Service | Text | Teardown signal |
//! | `InboundMessage` | Service → Client | Text | Ack, heartbeat, error, telemetry |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `inbound` | Inbound classification and telemetry patches |
//! | `outbound` | Frames and control messages |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound message types.
pub mod inbound;

/// Outbound message types.
pub mod outbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use inbound::{HandshakeAck, InboundMessage, MessageKind, TelemetryPatch};
pub use outbound::{ControlMessage, OutboundFrame};
