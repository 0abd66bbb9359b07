//! WebSocket transport layer.
//!
//! This module owns the streaming connection between the client (Rust)
//! and the analysis service.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐                              ┌──────────────────┐
//! │  Client (Rust)    │                              │  Analysis        │
//! │                   │    binary JPEG frames ──►    │  Service         │
//! │  ConnectionManager│◄────────────────────────────►│                  │
//! │                   │    ◄── JSON telemetry        │  /ws/{session}   │
//! └───────────────────┘                              └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ServiceEndpoint::websocket_url` - Derive `ws`/`wss` URL for the session
//! 2. `ConnectionManager::connect` - Spawn the event loop and handshake
//! 3. `ConnectionManager::send_frame` - Stream frames while `Open`
//! 4. `ConnectionManager::disconnect` - Send stop, close, end `Closed`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection state machine and event loop |
//! | `endpoint` | REST and socket URL derivation |

// ============================================================================
// Submodules
// ============================================================================

/// Connection state machine and event loop.
pub mod connection;

/// REST and socket URL derivation.
pub mod endpoint;

#[cfg(test)]
pub(crate) mod loopback;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{
    ConnectionFault, ConnectionManager, ConnectionState, LivenessPolicy, MessageHandler,
};
pub use endpoint::{API_URL_ENV, DEFAULT_API_URL, ORIGIN_SCHEME_ENV, ServiceEndpoint};
