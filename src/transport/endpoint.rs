//! Service endpoint resolution.
//!
//! The session REST API and the streaming socket share one base URL.
//! The socket scheme mirrors the scheme of the hosting origin:
//!
//! | Origin | Socket |
//! |--------|--------|
//! | `http` | `ws://{host}/ws/{session_id}` |
//! | `https` | `wss://{host}/ws/{session_id}` |
//!
//! When no hosting origin is configured, the API base URL's own scheme is used.

// ============================================================================
// Imports
// ============================================================================

use std::env;

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

// ============================================================================
// Constants
// ============================================================================

/// API base URL used when nothing is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Environment variable holding the API base URL.
pub const API_URL_ENV: &str = "EXERCISE_API_URL";

/// Environment variable holding the hosting origin scheme (`http` or `https`).
pub const ORIGIN_SCHEME_ENV: &str = "EXERCISE_ORIGIN_SCHEME";

// ============================================================================
// ServiceEndpoint
// ============================================================================

/// Base address of the analysis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// REST base URL (`http` or `https`).
    api_base: Url,
    /// Whether the hosting origin is secure, if known.
    secure_origin: Option<bool>,
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            secure_origin: None,
        }
    }
}

impl ServiceEndpoint {
    /// Creates an endpoint from an API base URL.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the URL does not parse
    /// - [`Error::Config`] if the scheme is not `http`/`https` or the host is missing
    pub fn new(api_base: &str) -> Result<Self> {
        let api_base = Url::parse(api_base)?;

        if !matches!(api_base.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "API base URL must be http or https, got: {}",
                api_base.scheme()
            )));
        }
        if api_base.host_str().is_none() {
            return Err(Error::config("API base URL must include a host"));
        }

        Ok(Self {
            api_base,
            secure_origin: None,
        })
    }

    /// Creates an endpoint from `EXERCISE_API_URL` and `EXERCISE_ORIGIN_SCHEME`.
    ///
    /// Falls back to [`DEFAULT_API_URL`] when the URL variable is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        let endpoint = match env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim())?,
            _ => Self::default(),
        };

        match env::var(ORIGIN_SCHEME_ENV) {
            Ok(scheme) if !scheme.trim().is_empty() => endpoint.with_origin_scheme(scheme.trim()),
            _ => Ok(endpoint),
        }
    }

    /// Sets the hosting origin scheme the socket scheme should mirror.
    ///
    /// Accepts `http`/`https`, with or without a trailing colon.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for any other scheme.
    pub fn with_origin_scheme(mut self, scheme: &str) -> Result<Self> {
        self.secure_origin = match scheme.trim_end_matches(':').to_ascii_lowercase().as_str() {
            "http" => Some(false),
            "https" => Some(true),
            other => {
                return Err(Error::config(format!(
                    "Origin scheme must be http or https, got: {other}"
                )));
            }
        };
        Ok(self)
    }

    /// Returns the REST base URL.
    #[inline]
    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Returns `true` if the socket will use `wss`.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure_origin
            .unwrap_or(self.api_base.scheme() == "https")
    }

    /// Returns the streaming socket URL for a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL cannot carry a path.
    pub fn websocket_url(&self, session_id: &SessionId) -> Result<Url> {
        let mut url = self.join(&["ws", session_id.as_str()])?;
        let scheme = if self.is_secure() { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::config(format!("Cannot derive {scheme} URL from {url}")))?;
        Ok(url)
    }

    /// Returns a REST URL for the given path segments under the base URL.
    ///
    /// Segments are percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL cannot carry a path.
    pub fn rest_url(&self, segments: &[&str]) -> Result<Url> {
        self.join(segments)
    }

    fn join(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| Error::config(format!("API base URL cannot be a base: {}", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

// ============================================================================
// Tests
// ============================================================================
