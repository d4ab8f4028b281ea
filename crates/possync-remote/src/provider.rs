//! HttpRemoteService - IRemoteService implementation over HTTP
//!
//! Thin adapter from the [`IRemoteService`] port to [`SyncApiClient`].
//! Adds structured logging per call; the token is never part of a span.

use async_trait::async_trait;
use tracing::{debug, warn};

use possync_core::ports::remote_service::{
    IRemoteService, PullResponse, PushAck, RecordChange, RemoteEndpoint, RemoteError, RemoteStatus,
};

use crate::client::SyncApiClient;

/// Remote service backed by the cloud sync HTTP API
#[derive(Debug, Clone, Default)]
pub struct HttpRemoteService {
    client: SyncApiClient,
}

impl HttpRemoteService {
    pub fn new(client: SyncApiClient) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying API client
    pub fn client(&self) -> &SyncApiClient {
        &self.client
    }
}

#[async_trait]
impl IRemoteService for HttpRemoteService {
    #[tracing::instrument(skip(self, endpoint), fields(empresa_id = endpoint.empresa_id))]
    async fn status(&self, endpoint: &RemoteEndpoint) -> Result<RemoteStatus, RemoteError> {
        let result = self.client.get_status(endpoint).await;
        if let Err(ref e) = result {
            debug!(error = %e, "Status probe failed");
        }
        result
    }

    #[tracing::instrument(skip(self, endpoint), fields(empresa_id = endpoint.empresa_id))]
    async fn pull(
        &self,
        endpoint: &RemoteEndpoint,
        since: Option<&str>,
    ) -> Result<PullResponse, RemoteError> {
        let result = self.client.pull_changes(endpoint, since).await;
        if let Err(ref e) = result {
            warn!(error = %e, "Pull request failed");
        }
        result
    }

    #[tracing::instrument(
        skip(self, endpoint, changes),
        fields(empresa_id = endpoint.empresa_id, batch = changes.len())
    )]
    async fn push(
        &self,
        endpoint: &RemoteEndpoint,
        changes: &[RecordChange],
    ) -> Result<PushAck, RemoteError> {
        let result = self.client.push_changes(endpoint, changes).await;
        match result {
            Ok(ref ack) => debug!(accepted = ?ack.accepted, "Push batch acknowledged"),
            Err(ref e) => warn!(error = %e, "Push request failed"),
        }
        result
    }
}
