//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing session ids with arbitrary strings.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// SessionId
// ============================================================================

/// Opaque session identifier issued by the session REST API.
///
/// Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the identifier is empty or blank.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::config("Session ID must not be empty"));
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl TryFrom<&str> for SessionId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for SessionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new("abc-123").expect("valid id");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn test_empty_session_id_rejected() {
        assert!(matches!(SessionId::new(""), Err(Error::Config { .. })));
        assert!(matches!(SessionId::new("   "), Err(Error::Config { .. })));
    }

    #[test]
    fn test_session_id_serde_as_string() {
        let id: SessionId = serde_json::from_str("\"s-1\"").expect("deserialize");
        assert_eq!(id.as_str(), "s-1");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "\"s-1\"");

        assert!(serde_json::from_str::<SessionId>("\"  \"").is_err());
    }
}
