//! Image download under a hard timeout.
//!
//! The fetcher never panics and never returns a fatal error: every failure is
//! a [`FetchError`] that the orchestrator turns into an external link.
//!
//! ## Cancellation
//!
//! The whole transfer (headers and body) is raced against the timeout with
//! [`tokio::time::timeout`]. When the timer wins, the request future is
//! dropped, which aborts the in-flight transfer and returns the connection to
//! reqwest rather than leaving it half-read.

use crate::config::MAX_FETCH_BYTES;
use crate::error::{EmbedError, FetchError};
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use url::{ParseError, Url};

const USER_AGENT: &str = concat!("webclip-images/", env!("CARGO_PKG_VERSION"));

/// Raw bytes of one fetched image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// `Content-Type` without parameters, lower-cased, when the server sent one.
    pub content_type: Option<String>,
}

/// Retrieves raw image bytes.
///
/// Implementations must resolve within roughly `timeout` and must report
/// every failure as an `Err` instead of panicking. [`HttpFetcher`] is the
/// production implementation; tests substitute in-memory fakes.
pub trait ImageFetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<FetchedImage, FetchError>> + Send;
}

/// reqwest-backed [`ImageFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    /// Build a fetcher with its own connection pool.
    pub fn new() -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| EmbedError::HttpClient(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Reuse an existing client (and its pool, proxy and TLS settings).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: MAX_FETCH_BYTES,
        }
    }

    /// Override the download cap. Mostly useful in tests.
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn download(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "image/avif,image/webp,image/apng,image/*,*/*;q=0.8")
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());

        let expected = response.content_length().unwrap_or(0);
        if expected > self.max_bytes as u64 {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let mut bytes = Vec::with_capacity(expected as usize);
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport)?;
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedImage, FetchError> {
        let result = match tokio::time::timeout(timeout, self.download(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                ms: timeout.as_millis() as u64,
            }),
        };

        match &result {
            Ok(image) => debug!("Fetched {} ({} bytes)", url, image.bytes.len()),
            Err(e @ FetchError::Timeout { .. }) => warn!("Image fetch timed out: {} ({})", url, e),
            Err(e @ FetchError::Status { .. }) => warn!("Image fetch rejected: {} ({})", url, e),
            Err(e) => warn!("Image fetch failed: {} ({})", url, e),
        }
        result
    }
}

fn transport(e: reqwest::Error) -> FetchError {
    FetchError::Transport {
        detail: e.to_string(),
    }
}

/// Turn an `<img src>` value into an absolute http(s) URL.
///
/// Protocol-relative sources (`//cdn/x.png`) use https; relative sources are
/// joined onto `base` when one is known.
pub fn resolve_url(src: &str, base: Option<&Url>) -> Result<Url, FetchError> {
    let parsed = if let Some(rest) = src.strip_prefix("//") {
        Url::parse(&format!("https://{rest}"))
    } else {
        match (Url::parse(src), base) {
            (Err(ParseError::RelativeUrlWithoutBase), Some(base)) => base.join(src),
            (parsed, _) => parsed,
        }
    };

    let url = parsed.map_err(|e| FetchError::Transport {
        detail: format!("invalid image URL '{src}': {e}"),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(FetchError::Transport {
            detail: format!("unsupported URL scheme '{scheme}' for '{src}'"),
        }),
    }
}
