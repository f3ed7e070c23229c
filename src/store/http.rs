//! HTTP client for the content-addressed store.
//!
//! Speaks the store's IPFS-style API: multipart upload to `add`,
//! parameterized fetch from `cat`, pin management under `pin/`, and a
//! `version` probe for availability.

use std::time::Duration;

use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::types::{CustodyError, Result};

use super::{ContentRef, ContentStore};

/// Response from the store's `add` endpoint
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
    /// The store reports size as a decimal string
    #[serde(rename = "Size")]
    size: String,
}

/// Content store client over HTTP.
pub struct HttpContentStore {
    base_url: String,
    client: Client,
}

impl HttpContentStore {
    /// Create a client against the given API base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v0/{}", self.base_url, path)
    }

    fn arg_url(&self, path: &str, content_id: &str) -> String {
        format!(
            "{}?arg={}",
            self.api_url(path),
            urlencoding::encode(content_id)
        )
    }
}

#[async_trait::async_trait]
impl ContentStore for HttpContentStore {
    async fn put(&self, package: &[u8]) -> Result<ContentRef> {
        let part = multipart::Part::bytes(package.to_vec()).file_name("package");
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.api_url("add?pin=true"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CustodyError::BackendUnavailable(format!(
                "Store add failed with status {status}: {body}"
            )));
        }

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| CustodyError::BackendUnavailable(format!("Malformed add response: {e}")))?;

        let size = added.size.parse::<u64>().unwrap_or(package.len() as u64);
        debug!(content_id = %added.hash, size, "Stored package");

        Ok(ContentRef {
            content_id: added.hash,
            size,
        })
    }

    async fn get(&self, content_id: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.arg_url("cat", content_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CustodyError::NotFound(content_id.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CustodyError::BackendUnavailable(format!(
                "Store cat failed with status {status}: {body}"
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn pin(&self, content_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.arg_url("pin/add", content_id))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(CustodyError::NotFound(content_id.to_string())),
            s => Err(CustodyError::BackendUnavailable(format!(
                "Store pin failed with status {s}"
            ))),
        }
    }

    async fn unpin(&self, content_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.arg_url("pin/rm", content_id))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(CustodyError::NotFound(content_id.to_string())),
            s => Err(CustodyError::BackendUnavailable(format!(
                "Store unpin failed with status {s}"
            ))),
        }
    }

    async fn is_available(&self) -> bool {
        match self.client.post(self.api_url("version")).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
