//! HTTP capability used by every fetcher.
//!
//! Fetchers only see the [`HttpClient`] trait so tests can substitute a fake;
//! [`ReqwestHttpClient`] is the production implementation.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid header {0}")]
    InvalidHeader(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Result of streaming a response body to disk.
///
/// Nothing is written when `status` is not a success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub status: u16,
    pub bytes_written: u64,
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `url` and buffer the whole body.
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, HttpError>;

    /// GET `url` and stream the body into `dest` chunk by chunk, replacing
    /// any existing file.
    async fn download(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        dest: &Path,
    ) -> Result<DownloadOutcome, HttpError>;
}

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Option<Duration>) -> Result<Self, HttpError> {
        install_rustls_provider();

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn header_map(headers: &[(&str, &str)]) -> Result<HeaderMap, HttpError> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HttpError::InvalidHeader(name.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| HttpError::InvalidHeader(format!("{name}: {value}")))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, HttpError> {
        let response = self
            .client
            .get(url)
            .headers(Self::header_map(headers)?)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        debug!(url, status, len = body.len(), "GET");
        Ok(HttpResponse { status, body })
    }

    async fn download(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        dest: &Path,
    ) -> Result<DownloadOutcome, HttpError> {
        let response = self
            .client
            .get(url)
            .headers(Self::header_map(headers)?)
            .send()
            .await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            debug!(url, status, "download rejected");
            return Ok(DownloadOutcome {
                status,
                bytes_written: 0,
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut bytes_written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, status, bytes_written, dest = %dest.display(), "download finished");
        Ok(DownloadOutcome {
            status,
            bytes_written,
        })
    }
}
