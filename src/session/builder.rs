//! Builder pattern for session configuration.
//!
//! # Example
//!
//! ```no_run
//! use exercise_session::{ImageSequenceSource, SessionController, SessionId, SessionOptions};
//!
//! # fn example() -> exercise_session::Result<()> {
//! let session = SessionController::builder()
//!     .session_id(SessionId::new("abc123")?)
//!     .source(ImageSequenceSource::new("./frames"))
//!     .options(SessionOptions::new().with_jpeg_quality(60))
//!     .http_api()
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::api::{HttpSessionApi, SessionApi};
use crate::capture::{FrameSource, SharedSource};
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::transport::{ConnectionManager, ServiceEndpoint};

use super::controller::SessionController;
use super::options::SessionOptions;

// ============================================================================
// ApiChoice
// ============================================================================

/// REST client selection.
#[derive(Default)]
enum ApiChoice {
    #[default]
    None,
    /// [`HttpSessionApi`] on the session endpoint.
    Http,
    Custom(Arc<dyn SessionApi>),
}

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`SessionController`].
///
/// Use [`SessionController::builder()`] to create a new builder.
#[derive(Default)]
pub struct SessionBuilder {
    /// Session to stream to.
    session_id: Option<SessionId>,
    /// Service address; read from the environment when unset.
    endpoint: Option<ServiceEndpoint>,
    /// Local frame source.
    source: Option<Box<dyn FrameSource>>,
    /// Tuning options.
    options: SessionOptions,
    /// REST client.
    api: ApiChoice,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("session_id", &self.session_id)
            .field("endpoint", &self.endpoint)
            .field("source", &self.source.as_ref().map(|s| s.name().to_string()))
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session to stream to.
    #[inline]
    #[must_use]
    pub fn session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Sets the service endpoint.
    ///
    /// Defaults to [`ServiceEndpoint::from_env`].
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: ServiceEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets the frame source.
    #[inline]
    #[must_use]
    pub fn source(mut self, source: impl FrameSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Sets the frame source from a boxed trait object.
    #[inline]
    #[must_use]
    pub fn boxed_source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the tuning options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses the HTTP session API on the session endpoint.
    #[inline]
    #[must_use]
    pub fn http_api(mut self) -> Self {
        self.api = ApiChoice::Http;
        self
    }

    /// Uses a custom session API.
    #[inline]
    #[must_use]
    pub fn api(mut self, api: Arc<dyn SessionApi>) -> Self {
        self.api = ApiChoice::Custom(api);
        self
    }

    /// Builds the controller with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no frame source is set or the options are invalid
    /// - [`Error::Config`] / [`Error::Url`] if the endpoint is invalid
    /// - [`Error::Http`] if the HTTP client cannot be built
    pub fn build(mut self) -> Result<SessionController> {
        let source = self.validate_source()?;
        self.options.validate()?;

        let endpoint = match self.endpoint {
            Some(endpoint) => endpoint,
            None => ServiceEndpoint::from_env()?,
        };

        let ws_url = self
            .session_id
            .as_ref()
            .map(|id| endpoint.websocket_url(id))
            .transpose()?;

        let api: Option<Arc<dyn SessionApi>> = match self.api {
            ApiChoice::None => None,
            ApiChoice::Http => Some(Arc::new(HttpSessionApi::new(endpoint)?)),
            ApiChoice::Custom(api) => Some(api),
        };

        let connection = Arc::new(ConnectionManager::new(ws_url, self.options.liveness));
        let source: SharedSource = Arc::new(AsyncMutex::new(source));

        Ok(SessionController::from_parts(
            self.session_id,
            self.options,
            connection,
            source,
            api,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionBuilder {
    /// Takes the frame source, failing if none was set.
    fn validate_source(&mut self) -> Result<Box<dyn FrameSource>> {
        self.source.take().ok_or_else(|| {
            Error::config(
                "Frame source is required. Use .source() to set it.\n\
                 Example: SessionController::builder().source(ImageSequenceSource::new(\"./frames\"))",
            )
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::capture::{RawFrame, StaticSource};
    use crate::transport::ConnectionState;

    fn static_source() -> StaticSource {
        StaticSource::new(RawFrame::solid(4, 4, [0, 0, 0]).expect("frame"))
    }

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = SessionBuilder::new();
        assert!(builder.session_id.is_none());
        assert!(builder.endpoint.is_none());
        assert!(builder.source.is_none());
        assert!(matches!(builder.api, ApiChoice::None));
    }

    #[test]
    fn test_build_fails_without_source() {
        let err = SessionBuilder::new()
            .endpoint(ServiceEndpoint::default())
            .build()
            .expect_err("no source");
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("Frame source"));
    }

    #[test]
    fn test_build_validates_options() {
        let err = SessionBuilder::new()
            .endpoint(ServiceEndpoint::default())
            .source(static_source())
            .options(SessionOptions::new().with_jpeg_quality(0))
            .build()
            .expect_err("bad quality");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_with_session() {
        let session = SessionBuilder::new()
            .session_id(SessionId::new("abc").expect("id"))
            .endpoint(ServiceEndpoint::default())
            .source(static_source())
            .options(SessionOptions::new().with_keepalive_timeout(Duration::from_secs(5)))
            .http_api()
            .build()
            .expect("controller");

        assert_eq!(session.session_id().map(SessionId::as_str), Some("abc"));
        assert_eq!(session.state(), ConnectionState::Idle);
        assert_eq!(
            session.options().liveness.keepalive_timeout,
            Some(Duration::from_secs(5))
        );
        assert!(!session.is_streaming());
    }
}
