//! Surface metadata served over plain HTTP next to the WebSocket.
//!
//! - `GET /surfaces.json` lists the surfaces Ardour offers
//! - `GET /<surface>/manifest.xml` describes one of them

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::warn;

/// Errors fetching surface metadata.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// HTTP transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any status other than 200
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Manifest is not well-formed XML
    #[error("Invalid manifest: {0}")]
    Xml(String),
}

impl MetadataError {
    /// HTTP status carried by the error, if it came from the server.
    pub fn status(&self) -> Option<u16> {
        match self {
            MetadataError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: Client,
    base_url: String,
    surface: String,
}

impl MetadataClient {
    /// `authority` is `host:port`; `surface` is the path the manifest lives
    /// under, e.g. `builtin/mixer`.
    pub fn new(authority: &str, surface: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("HTTP client with {:?} timeout unavailable, using defaults: {}", timeout, e);
                Client::new()
            });
        Self {
            client,
            base_url: format!("http://{authority}"),
            surface: surface.trim_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn manifest_url(&self) -> String {
        format!("{}/{}/manifest.xml", self.base_url, self.surface)
    }

    #[tracing::instrument(skip(self), fields(url = %self.base_url))]
    pub async fn available_surfaces(&self) -> Result<Value, MetadataError> {
        let body = self.get(&format!("{}/surfaces.json", self.base_url)).await?;
        serde_json::from_str(&body)
            .map_err(|e| MetadataError::Transport(format!("Failed to parse surfaces: {}", e)))
    }

    #[tracing::instrument(skip(self), fields(surface = %self.surface))]
    pub async fn surface_manifest(&self) -> Result<BTreeMap<String, String>, MetadataError> {
        let body = self.get(&self.manifest_url()).await?;
        parse_manifest(&body)
    }

    async fn get(&self, url: &str) -> Result<String, MetadataError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .text()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))
    }
}

/// Flatten the root element's children into `tag (lowercased) -> value attribute`.
pub fn parse_manifest(text: &str) -> Result<BTreeMap<String, String>, MetadataError> {
    let document = roxmltree::Document::parse(text).map_err(|e| MetadataError::Xml(e.to_string()))?;
    let entries = document
        .root_element()
        .children()
        .filter(|node| node.is_element())
        .map(|node| {
            let key = node.tag_name().name().to_lowercase();
            let value = node.attribute("value").unwrap_or_default().to_string();
            (key, value)
        })
        .collect();
    Ok(entries)
}
