use crate::config::FetchConfig;
use crate::error::{MigrationError, PipelineResult};
use crate::media::headers::browser_headers;
use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use std::time::Duration;
use tracing::debug;

/// Largest image body the pipeline will buffer.
pub const MAX_IMAGE_BYTES: usize = 25 * 1024 * 1024;

fn too_large(len: u64) -> MigrationError {
    MigrationError::FetchFailed {
        status: None,
        reason: format!("image exceeds {MAX_IMAGE_BYTES} bytes ({len} bytes)"),
    }
}

/// A successful upstream response whose body has not been read yet.
pub struct FetchedImage {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, PipelineResult<Bytes>>,
}

impl FetchedImage {
    /// Wrap an in-memory body; used by fakes and by callers that already hold bytes.
    pub fn from_bytes(content_type: Option<&str>, data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        Self {
            content_type: content_type.map(str::to_string),
            content_length: Some(data.len() as u64),
            body: futures::stream::once(async move { Ok(data) }).boxed(),
        }
    }

    /// Drain the body into memory, failing once it passes [`MAX_IMAGE_BYTES`].
    /// The declared length only sizes the initial buffer, capped at the limit.
    pub async fn into_bytes(self) -> PipelineResult<Bytes> {
        let hint = self
            .content_length
            .map_or(8192, |len| len.min(MAX_IMAGE_BYTES as u64) as usize);
        let mut buf = BytesMut::with_capacity(hint);
        let mut body = self.body;
        while let Some(chunk) = body.try_next().await? {
            if buf.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(too_large((buf.len() + chunk.len()) as u64));
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

/// Retrieves remote images. One attempt per call; callers own retry policy.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> PipelineResult<FetchedImage>;
}

/// reqwest-backed fetcher presenting a desktop browser signature.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(browser_headers(config)?)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build image fetch client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> PipelineResult<FetchedImage> {
        let parsed =
            url::Url::parse(url).map_err(|e| MigrationError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MigrationError::InvalidUrl(url.to_string()));
        }

        let resp = self.client.get(parsed).send().await?;
        let status = resp.status();
        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "upstream rejected image fetch");
            return Err(MigrationError::fetch_status(status));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = resp.content_length();
        if let Some(len) = content_length.filter(|len| *len > MAX_IMAGE_BYTES as u64) {
            debug!(%url, len, "upstream image too large");
            return Err(too_large(len));
        }
        debug!(%url, content_type = ?content_type, "image fetch ok");

        Ok(FetchedImage {
            content_type,
            content_length,
            body: resp.bytes_stream().map_err(MigrationError::from).boxed(),
        })
    }
}
