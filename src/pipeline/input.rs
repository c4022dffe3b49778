//! Input resolution: load article HTML from a local file or an http(s) URL.
//!
//! When the HTML comes from a URL, that URL also becomes the base for
//! resolving relative `<img src>` values.

use crate::error::EmbedError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Article HTML plus the URL it was loaded from, if any.
#[derive(Debug, Clone)]
pub struct LoadedHtml {
    pub html: String,
    pub base_url: Option<Url>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load HTML from `input`, downloading it when it is a URL.
pub async fn load_html(input: &str, timeout_secs: u64) -> Result<LoadedHtml, EmbedError> {
    if is_url(input) {
        download_html(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<LoadedHtml, EmbedError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(EmbedError::PermissionDenied { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EmbedError::FileNotFound { path });
        }
        Err(_) => {
            return Err(EmbedError::InvalidInput {
                input: path_str.to_string(),
            });
        }
    };

    debug!("Read local HTML: {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedHtml {
        html: String::from_utf8_lossy(&bytes).into_owned(),
        base_url: None,
    })
}

async fn download_html(url: &str, timeout_secs: u64) -> Result<LoadedHtml, EmbedError> {
    info!("Downloading HTML from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EmbedError::HttpClient(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            EmbedError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            EmbedError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(EmbedError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    // After redirects, the final URL is the base for relative image paths.
    let base_url = Some(response.url().clone());

    let html = response.text().await.map_err(|e| EmbedError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    info!("Downloaded {} bytes of HTML", html.len());
    Ok(LoadedHtml { html, base_url })
}
