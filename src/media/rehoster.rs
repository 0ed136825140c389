//! Managed media store uploads (Cloudinary upload API).
//!
//! Uploads are signed: every parameter except `file`, `api_key` and the
//! resource type is sorted, joined as `k=v&k=v`, suffixed with the API
//! secret and hashed with SHA-1.

use crate::config::MediaStoreConfig;
use crate::error::{MigrationError, PipelineResult};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use reqwest::StatusCode;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::time::Duration;
use tracing::{debug, info};

/// What to upload.
#[derive(Debug, Clone)]
pub enum RehostSource {
    /// The store downloads the URL itself.
    RemoteUrl(String),
    /// Bytes already fetched by us.
    Bytes {
        data: Bytes,
        content_type: Option<String>,
    },
}

impl RehostSource {
    /// Value of the upload `file` parameter.
    fn file_param(&self) -> String {
        match self {
            Self::RemoteUrl(url) => url.clone(),
            Self::Bytes { data, content_type } => format!(
                "data:{};base64,{}",
                content_type.as_deref().unwrap_or("application/octet-stream"),
                STANDARD.encode(data)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehostOptions {
    pub folder: String,
    pub overwrite: bool,
    /// Incoming transformation chain, e.g. `w_1200,h_800,c_fill,q_auto/f_auto`.
    pub transformation: Option<String>,
}

impl RehostOptions {
    /// Options for migrated project images: fixed folder, overwrite by id,
    /// normalized output.
    pub fn for_migration(config: &MediaStoreConfig) -> Self {
        Self {
            folder: config.upload_folder.clone(),
            overwrite: true,
            transformation: Some(config.transformation.clone()),
        }
    }

    /// Options for admin uploads: stored as sent.
    pub fn plain(config: &MediaStoreConfig) -> Self {
        Self {
            folder: config.upload_folder.clone(),
            overwrite: false,
            transformation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RehostedAsset {
    pub secure_url: String,
    pub public_id: String,
}

/// Persists images into the managed media store.
#[async_trait::async_trait]
pub trait Rehoster: Send + Sync {
    async fn rehost(
        &self,
        source: RehostSource,
        public_id: Option<&str>,
        options: &RehostOptions,
    ) -> PipelineResult<RehostedAsset>;
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    error: UploadErrorDetail,
}

#[derive(Debug, Deserialize)]
struct UploadErrorDetail {
    message: String,
}

pub struct CloudinaryRehoster {
    client: reqwest::Client,
    config: MediaStoreConfig,
}

impl CloudinaryRehoster {
    pub fn new(config: MediaStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("failed to build media store client")?;
        Ok(Self { client, config })
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/auto/upload",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    /// Parameters covered by the signature, sorted by key.
    fn signed_params(
        public_id: Option<&str>,
        options: &RehostOptions,
        timestamp: i64,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![("folder", options.folder.clone())];
        if options.overwrite {
            params.push(("overwrite", "true".to_string()));
        }
        if let Some(id) = public_id {
            params.push(("public_id", id.to_string()));
        }
        params.push(("timestamp", timestamp.to_string()));
        if let Some(t) = &options.transformation {
            params.push(("transformation", t.clone()));
        }
        params.retain(|(_, v)| !v.is_empty());
        params.sort_by(|a, b| a.0.cmp(b.0));
        params
    }

    fn string_to_sign(params: &[(&'static str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn sign(params: &[(&'static str, String)], api_secret: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(Self::string_to_sign(params).as_bytes());
        hasher.update(api_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait::async_trait]
impl Rehoster for CloudinaryRehoster {
    async fn rehost(
        &self,
        source: RehostSource,
        public_id: Option<&str>,
        options: &RehostOptions,
    ) -> PipelineResult<RehostedAsset> {
        let timestamp = chrono::Utc::now().timestamp();
        let params = Self::signed_params(public_id, options, timestamp);
        let signature = Self::sign(&params, &self.config.api_secret);

        let mut form: Vec<(&str, String)> = params;
        form.push(("api_key", self.config.api_key.clone()));
        form.push(("signature", signature));
        form.push(("file", source.file_param()));

        debug!(public_id = ?public_id, folder = %options.folder, "uploading to media store");
        let resp = self
            .client
            .post(self.upload_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| MigrationError::RehostFailed(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| MigrationError::RehostFailed(e.to_string()))?;
        let asset = parse_upload_response(status, &body)?;
        info!(public_id = %asset.public_id, url = %asset.secure_url, "media store upload ok");
        Ok(asset)
    }
}

/// Interpret an upload API reply. Error replies keep the store's own message,
/// or the raw body when it is not the usual `{"error":{"message":..}}` shape.
fn parse_upload_response(status: StatusCode, body: &str) -> PipelineResult<RehostedAsset> {
    if !status.is_success() {
        let message = serde_json::from_str::<UploadErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body.trim().to_string());
        return Err(MigrationError::RehostFailed(format!(
            "{} {}",
            status.as_u16(),
            message
        )));
    }
    serde_json::from_str(body)
        .map_err(|e| MigrationError::RehostFailed(format!("unexpected upload response: {e}")))
}
