//! Session REST client.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `create_session` | `POST {base}/session/create?exercise={id}&height_cm={h}` |
//! | `session_info` | `GET {base}/session/{id}` |
//! | `session_metrics` | `GET {base}/session/{id}/metrics` |
//! | `delete_session` | `DELETE {base}/session/{id}` |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::transport::ServiceEndpoint;

use super::types::{CreatedSession, ErrorBody, ExerciseKind, FinalMetrics, SessionInfo};

// ============================================================================
// Constants
// ============================================================================

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// SessionApi
// ============================================================================

/// Session bookkeeping calls made around a streaming session.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Creates a session and returns its identifier.
    async fn create_session(&self, exercise: ExerciseKind, height_cm: u32) -> Result<CreatedSession>;

    /// Looks up a session.
    async fn session_info(&self, session_id: &SessionId) -> Result<SessionInfo>;

    /// Fetches the final record of a session.
    async fn session_metrics(&self, session_id: &SessionId) -> Result<FinalMetrics>;

    /// Ends a session on the service.
    async fn delete_session(&self, session_id: &SessionId) -> Result<()>;
}

// ============================================================================
// HttpSessionApi
// ============================================================================

/// [`SessionApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSessionApi {
    client: Client,
    endpoint: ServiceEndpoint,
}

impl HttpSessionApi {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, endpoint })
    }

    /// Returns the endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    async fn request(&self, method: Method, url: Url, failure: &str) -> Result<Response> {
        debug!(%method, %url, "Session API request");

        let response = self.client.request(method, url).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|body| body.detail().map(str::to_string))
            .unwrap_or_else(|| failure.to_string());

        warn!(status = status.as_u16(), error = %message, "Session API request failed");
        Err(Error::api(status.as_u16(), message))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn create_session(&self, exercise: ExerciseKind, height_cm: u32) -> Result<CreatedSession> {
        let mut url = self.endpoint.rest_url(&["session", "create"])?;
        url.query_pairs_mut()
            .append_pair("exercise", exercise.id())
            .append_pair("height_cm", &height_cm.to_string());

        let response = self
            .request(Method::POST, url, "Failed to create session")
            .await?;
        let created: CreatedSession = Self::json(response).await?;

        info!(session_id = %created.session_id, %exercise, height_cm, "Session created");
        Ok(created)
    }

    async fn session_info(&self, session_id: &SessionId) -> Result<SessionInfo> {
        let url = self.endpoint.rest_url(&["session", session_id.as_str()])?;
        let response = self.request(Method::GET, url, "Session not found").await?;
        Self::json(response).await
    }

    async fn session_metrics(&self, session_id: &SessionId) -> Result<FinalMetrics> {
        let url = self
            .endpoint
            .rest_url(&["session", session_id.as_str(), "metrics"])?;
        let response = self.request(Method::GET, url, "Failed to get metrics").await?;
        Self::json(response).await
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        let url = self.endpoint.rest_url(&["session", session_id.as_str()])?;
        let response = self
            .request(Method::DELETE, url, "Failed to delete session")
            .await?;

        // Body content is not used
        let _ = Self::json::<Value>(response).await;
        info!(%session_id, "Session deleted");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
