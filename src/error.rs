//! Error types for the exercise session client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use exercise_session::{Result, SessionController};
//!
//! async fn run(controller: &SessionController) -> Result<()> {
//!     controller.start()?;
//!     // ...
//!     controller.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Policy |
//! |----------|----------|--------|
//! | Configuration | [`Error::Config`] | Returned to the caller |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::NotConnected`] | Surfaced, halts the connection |
//! | Device | [`Error::Device`] | Surfaced, halts capture |
//! | Protocol | [`Error::Protocol`] | Logged and discarded |
//! | Service | [`Error::Service`] | Surfaced, session continues |
//! | REST | [`Error::Api`] | Returned to the caller |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`], [`Error::Image`], [`Error::Url`] | Wrapped |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Constants
// ============================================================================

/// Hint attached to abnormal closures of the session connection.
pub(crate) const BACKEND_HINT: &str = "check if backend is running";

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session configuration is invalid or incomplete.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Session connection failed or closed abnormally.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// No inbound traffic within the configured liveness window.
    #[error("Connection stalled: no message for {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited without receiving anything.
        timeout_ms: u64,
    },

    /// Connection event loop is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation requires an open connection.
    #[error("Not connected")]
    NotConnected,

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// Capture device unavailable or access denied.
    #[error("Camera error: {message}")]
    Device {
        /// Description of the device failure.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed inbound payload.
    ///
    /// Never surfaced to the caller; the receive path logs and drops it.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Service Errors
    // ========================================================================
    /// Application-level error reported by the analysis service.
    #[error("{message}")]
    Service {
        /// Error text sent by the service.
        message: String,
    },

    // ========================================================================
    // REST Errors
    // ========================================================================
    /// Non-success response from the session REST API.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Detail message from the response body, or a fallback.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Image decode or encode error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection error for an abnormal closure, carrying the backend hint.
    #[inline]
    pub fn abnormal_closure(detail: impl std::fmt::Display) -> Self {
        Self::Connection {
            message: format!("{detail} - {BACKEND_HINT}"),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a device error.
    #[inline]
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a service error.
    #[inline]
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }

    /// Creates a REST API error.
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a capture device error.
    #[inline]
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::Device { .. })
    }

    /// Returns `true` if this error is reported by the analysis service.
    #[inline]
    #[must_use]
    pub fn is_service_error(&self) -> bool {
        matches!(self, Self::Service { .. })
    }

    /// Returns `true` if this error should reach the caller's error state.
    ///
    /// Protocol errors are absorbed on the receive path.
    #[inline]
    #[must_use]
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, Self::Protocol { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors leave the session usable, or usable after a restart.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. }
                | Self::Service { .. }
                | Self::ConnectionTimeout { .. }
                | Self::Connection { .. }
                | Self::NotConnected
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
