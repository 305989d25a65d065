//! Photo hosting for confirmed records.
//!
//! Before a record is persisted its photos may be uploaded to an image
//! host so the collection holds shareable URLs. When hosting is disabled
//! or an upload fails, the photo's local `file://` URL is kept instead;
//! the export pipeline can read either.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::HostingConfig;
use crate::error::HostingError;
use crate::images::ImageInput;

/// Uploads one photo and returns its public URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    fn name(&self) -> &str;

    async fn upload(&self, image: &ImageInput) -> Result<String, HostingError>;
}

/// ImgBB upload API (`POST /1/upload?key=...`, base64 `image` field).
pub struct ImgBbHost {
    client: reqwest::Client,
    upload_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ImgBbResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ImgBbData>,
    #[serde(default)]
    error: Option<ImgBbError>,
}

#[derive(Deserialize)]
struct ImgBbData {
    display_url: String,
}

#[derive(Deserialize)]
struct ImgBbError {
    #[serde(default)]
    message: String,
}

impl ImgBbHost {
    pub fn new(config: &HostingConfig, api_key: &str) -> Result<Self, HostingError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(HostingError::MissingKey(config.api_key_env.clone()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            upload_url: config.upload_url.clone(),
            api_key: api_key.to_string(),
        })
    }

    /// Build the host from the key in `hosting.api_key_env`.
    pub fn from_config(config: &HostingConfig) -> Result<Self, HostingError> {
        let key = std::env::var(&config.api_key_env)
            .map_err(|_| HostingError::MissingKey(config.api_key_env.clone()))?;
        Self::new(config, &key)
    }
}

#[async_trait]
impl ImageHost for ImgBbHost {
    fn name(&self) -> &str {
        "imgbb"
    }

    async fn upload(&self, image: &ImageInput) -> Result<String, HostingError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        let form = reqwest::multipart::Form::new().text("image", encoded);

        let response = self
            .client
            .post(&self.upload_url)
            .query(&[("key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let parsed: ImgBbResponse = serde_json::from_str(&text).map_err(|_| {
            HostingError::Upload(format!("HTTP {}: {}", status.as_u16(), text.trim()))
        })?;

        match parsed.data {
            Some(data) if parsed.success && status.is_success() => Ok(data.display_url),
            _ => {
                let message = parsed
                    .error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                Err(HostingError::Upload(message))
            }
        }
    }
}

/// Build the configured host, or `None` when hosting is disabled.
pub fn host_from_config(config: &HostingConfig) -> Result<Option<Box<dyn ImageHost>>, HostingError> {
    if !config.is_enabled() {
        return Ok(None);
    }
    Ok(Some(Box::new(ImgBbHost::from_config(config)?)))
}

/// Final URLs for a record's photos, in input order.
///
/// Each photo is uploaded when a host is given; failed uploads and
/// unhosted photos fall back to their `file://` URL. Photos with neither
/// are dropped.
pub async fn resolve_image_urls(host: Option<&dyn ImageHost>, images: &[ImageInput]) -> Vec<String> {
    let mut urls = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        if let Some(host) = host {
            match host.upload(image).await {
                Ok(url) => {
                    info!(host = host.name(), index = i, %url, "uploaded photo");
                    urls.push(url);
                    continue;
                }
                Err(e) => warn!(host = host.name(), index = i, error = %e, "upload failed, keeping local photo"),
            }
        }
        if let Some(url) = image.file_url() {
            urls.push(url);
        }
    }
    urls
}
