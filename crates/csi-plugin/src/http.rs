use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, instrument};

use crate::{
    ControllerClient, CreateVolumeRequest, CreateVolumeResponse, DeleteVolumeRequest,
    IdentityClient, PluginConnector, PluginError, PluginHandle, PluginMessage, PluginResult,
    ProbeResponse,
};

pub const DEFAULT_PLUGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts [`PluginMessage`] envelopes as JSON to `<address>/csi`.
#[derive(Debug, Clone)]
pub struct HttpPluginClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPluginClient {
    /// `address` is either `host:port` or a full `http(s)://` URL.
    pub fn new(address: &str, timeout: Duration) -> PluginResult<Self> {
        let address = address.trim_end_matches('/');
        let base = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PluginError::transport)?;

        Ok(Self {
            client,
            endpoint: format!("{}/csi", base),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one request and wait for the reply. An `Error` reply is returned
    /// as `Err`.
    #[instrument(skip(self), fields(msg = %msg, endpoint = %self.endpoint))]
    pub async fn request(&self, msg: &PluginMessage) -> PluginResult<PluginMessage> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(msg)
            .send()
            .await
            .map_err(PluginError::transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(PluginError::transport)?;
        let reply: PluginMessage = serde_json::from_slice(&body).map_err(|e| {
            PluginError::Transport(format!("undecodable reply (HTTP {}): {}", status, e))
        })?;

        debug!(%reply, "plugin reply received");
        match reply {
            PluginMessage::Error(err) => Err(err),
            other => Ok(other),
        }
    }
}

impl IdentityClient for HttpPluginClient {
    fn probe(&self) -> BoxFuture<'_, PluginResult<ProbeResponse>> {
        Box::pin(async move {
            match self.request(&PluginMessage::Probe).await? {
                PluginMessage::ProbeResult(resp) => Ok(resp),
                other => Err(PluginError::UnexpectedResponse(other.to_string())),
            }
        })
    }
}

impl ControllerClient for HttpPluginClient {
    fn create_volume(
        &self,
        request: CreateVolumeRequest,
    ) -> BoxFuture<'_, PluginResult<CreateVolumeResponse>> {
        Box::pin(async move {
            match self.request(&PluginMessage::CreateVolume(request)).await? {
                PluginMessage::VolumeCreated(resp) => Ok(resp),
                other => Err(PluginError::UnexpectedResponse(other.to_string())),
            }
        })
    }

    fn delete_volume(&self, request: DeleteVolumeRequest) -> BoxFuture<'_, PluginResult<()>> {
        Box::pin(async move {
            match self.request(&PluginMessage::DeleteVolume(request)).await? {
                PluginMessage::Ok => Ok(()),
                other => Err(PluginError::UnexpectedResponse(other.to_string())),
            }
        })
    }
}

/// Builds [`HttpPluginClient`]s with a shared request timeout.
#[derive(Debug, Clone, Copy)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_PLUGIN_TIMEOUT)
    }
}

impl PluginConnector for HttpConnector {
    fn connect(&self, address: &str) -> PluginResult<PluginHandle> {
        let client = HttpPluginClient::new(address, self.timeout)?;
        Ok(PluginHandle::from_shared(Arc::new(client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_address_gets_http_scheme() {
        let client = HttpPluginClient::new("127.0.0.1:9000", DEFAULT_PLUGIN_TIMEOUT).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9000/csi");
    }

    #[test]
    fn url_address_is_kept() {
        let client =
            HttpPluginClient::new("https://plugin.local:443/", DEFAULT_PLUGIN_TIMEOUT).unwrap();
        assert_eq!(client.endpoint(), "https://plugin.local:443/csi");
    }
}
