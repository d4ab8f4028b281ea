//! Cloud sync API client
//!
//! Typed HTTP client for the three sync endpoints. Handles base URL
//! construction, the bearer credential, per-endpoint timeouts and the
//! classification of failures into [`RemoteError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use possync_core::ports::RemoteEndpoint;
//! use possync_remote::client::SyncApiClient;
//!
//! # async fn example() -> Result<(), possync_core::ports::RemoteError> {
//! let client = SyncApiClient::new();
//! let endpoint = RemoteEndpoint {
//!     api_url: "https://erp.example.com".into(),
//!     empresa_id: 7,
//!     auth_token: Some("token".into()),
//! };
//! let status = client.get_status(&endpoint).await?;
//! println!("server time: {:?}", status.server_time);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use url::Url;

use possync_core::ports::remote_service::{
    PullResponse, PushAck, RecordChange, RemoteEndpoint, RemoteError, RemoteStatus,
};

/// Path segment every sync endpoint lives under
pub const SYNC_API_PREFIX: &str = "/api/sync";

/// Timeout for the connection probe
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for pull and push
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body quoted in an error message
const MAX_ERROR_BODY: usize = 200;

/// Builds the sync API base from a configured URL
///
/// Trailing slashes are trimmed and `/api/sync` is appended unless the URL
/// already ends with it.
///
/// # Errors
///
/// Returns `RemoteError::Unreachable` if the result is not an absolute URL.
pub fn sync_base_url(api_url: &str) -> Result<String, RemoteError> {
    let trimmed = api_url.trim().trim_end_matches('/');
    let base = if trimmed.ends_with(SYNC_API_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, SYNC_API_PREFIX)
    };

    Url::parse(&base)
        .map_err(|e| RemoteError::Unreachable(format!("Invalid API URL '{}': {}", api_url, e)))?;
    Ok(base)
}

/// Body of `POST push`
#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    empresa_id: i64,
    changes: &'a [RecordChange],
}

// ============================================================================
// SyncApiClient
// ============================================================================

/// HTTP client for the cloud sync API
///
/// Holds no endpoint state: the URL, tenant and token come with every call
/// so configuration changes take effect immediately.
#[derive(Debug, Clone)]
pub struct SyncApiClient {
    client: Client,
    status_timeout: Duration,
    request_timeout: Duration,
}

impl Default for SyncApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncApiClient {
    /// Creates a client with the default 5s / 30s timeouts
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_STATUS_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client with custom timeouts
    ///
    /// # Arguments
    /// * `status_timeout` - Timeout for `GET status`
    /// * `request_timeout` - Timeout for `GET pull` and each `POST push`
    pub fn with_timeouts(status_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            status_timeout,
            request_timeout,
        }
    }

    pub fn status_timeout(&self) -> Duration {
        self.status_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Creates an authenticated request builder for `{base}/{path}`
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `endpoint` - Target API and credential
    /// * `path` - Endpoint name relative to the sync base (e.g. "status")
    pub fn request(
        &self,
        method: Method,
        endpoint: &RemoteEndpoint,
        path: &str,
    ) -> Result<RequestBuilder, RemoteError> {
        let url = format!("{}/{}", sync_base_url(&endpoint.api_url)?, path);
        let builder = self.client.request(method, url);
        Ok(match endpoint.auth_token.as_deref() {
            Some(token) if !token.is_empty() => builder.bearer_auth(token),
            _ => builder,
        })
    }

    /// Probes the remote with `GET status`
    pub async fn get_status(&self, endpoint: &RemoteEndpoint) -> Result<RemoteStatus, RemoteError> {
        debug!("Probing sync API status");

        let response = self
            .request(Method::GET, endpoint, "status")?
            .timeout(self.status_timeout)
            .send()
            .await
            .map_err(classify_error)?;

        read_json(response).await
    }

    /// Fetches remote changes with `GET pull`
    ///
    /// # Arguments
    /// * `endpoint` - Target API and credential
    /// * `since` - Cursor from the previous pull; omitted on the first pull
    pub async fn pull_changes(
        &self,
        endpoint: &RemoteEndpoint,
        since: Option<&str>,
    ) -> Result<PullResponse, RemoteError> {
        debug!(since = ?since, "Fetching remote changes");

        let mut builder = self
            .request(Method::GET, endpoint, "pull")?
            .query(&[("empresa_id", endpoint.empresa_id.to_string())]);
        if let Some(since) = since {
            builder = builder.query(&[("since", since)]);
        }

        let response = builder
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(classify_error)?;

        let page: PullResponse = read_json(response).await?;
        debug!(changes = page.changes.len(), "Remote changes received");
        Ok(page)
    }

    /// Sends one batch of local changes with `POST push`
    pub async fn push_changes(
        &self,
        endpoint: &RemoteEndpoint,
        changes: &[RecordChange],
    ) -> Result<PushAck, RemoteError> {
        debug!(changes = changes.len(), "Sending local changes");

        let body = PushRequest {
            empresa_id: endpoint.empresa_id,
            changes,
        };
        let response = self
            .request(Method::POST, endpoint, "push")?
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(classify_error)?;

        read_json(response).await
    }
}

// ============================================================================
// Response handling
// ============================================================================

/// Maps a transport failure onto the remote error taxonomy
fn classify_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout(err.to_string())
    } else if err.is_decode() {
        RemoteError::InvalidResponse(err.to_string())
    } else {
        RemoteError::Unreachable(err.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", head)
    }
}

/// Checks the status code and decodes the JSON body
///
/// An empty 2xx body decodes to `T::default()`.
async fn read_json<T: DeserializeOwned + Default>(response: Response) -> Result<T, RemoteError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("no reason").to_string()
        } else {
            truncate_body(&body)
        };

        return Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(message),
            _ => RemoteError::Status {
                status: status.as_u16(),
                message,
            },
        });
    }

    let bytes = response.bytes().await.map_err(classify_error)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}
