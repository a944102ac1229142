//! Peer Client
//!
//! Issues `GET <base-url><group>/<key>` against one remote node. Never retries.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use super::PeerGetter;
use crate::error::{Error, Result};

/// HTTP client bound to a single peer
#[derive(Debug, Clone)]
pub struct HttpGetter {
    /// Peer URL joined with the base path, e.g. `http://10.0.0.2:8001/mycache/`
    base_url: String,
    client: Client,
}

impl HttpGetter {
    /// Create a getter sharing an existing client
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request URL for a group/key pair, both percent-encoded
    pub fn url_for(&self, group: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(group),
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl PeerGetter for HttpGetter {
    #[instrument(skip(self), fields(peer = %self.base_url))]
    async fn get(&self, group: &str, key: &str) -> Result<Bytes> {
        let url = self.url_for(group, key);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Error::PeerConnection)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::PeerStatus { status });
        }

        let body = response.bytes().await.map_err(Error::PeerBody)?;
        debug!(bytes = body.len(), "fetched value from peer");
        Ok(body)
    }
}
