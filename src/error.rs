//! Error types for the webclip-images library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`EmbedError`]: **Fatal**: the run cannot start at all (invalid
//!   settings, HTTP client could not be built, HTML input unreadable).
//!   Returned as `Err(EmbedError)` before any image is touched.
//!
//! * [`ImageError`]: **Non-fatal**: a single image failed (network error,
//!   encode failure, oversized data URL). Stored inside
//!   [`crate::output::ProcessedImage`]; the image falls back to its external
//!   URL and every other image is processed normally.
//!
//! Once the image loop has started nothing is propagated upward: the capture
//! never fails because of image handling.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the webclip-images library.
///
/// Per-image failures use [`ImageError`] and are stored in
/// [`crate::output::ProcessedImage`] rather than propagated here.
#[derive(Debug, Error)]
pub enum EmbedError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Settings validation failed.
    #[error("Invalid image settings: {0}")]
    InvalidConfig(String),

    /// The HTTP client used for image fetches could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("HTML file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single image fetch failed.
///
/// The pipeline treats every variant identically (fall back to the external
/// URL); the distinction exists for diagnostics and logging.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// The transfer did not complete within the fetch timeout.
    #[error("fetch timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Connection, TLS, DNS, URL or body-read failure.
    #[error("transport error: {detail}")]
    Transport { detail: String },

    /// The server answered with a non-2xx status.
    #[error("server returned HTTP {status}")]
    Status { status: u16 },

    /// The body exceeded the hard download cap.
    #[error("response body too large (limit {limit} bytes)")]
    TooLarge { limit: usize },
}

/// A non-fatal error for a single image.
///
/// Stored alongside [`crate::output::ProcessedImage`] when an image could not
/// be embedded. The image is emitted as `External` and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageError {
    /// Fetching the image bytes failed.
    #[error("fetch failed: {source}")]
    Fetch {
        #[source]
        source: FetchError,
    },

    /// The response body is neither labelled nor recognisable as an image.
    #[error("response is not an image (content type: {content_type})")]
    NotAnImage { content_type: String },

    /// Base64 assembly produced no data URL.
    #[error("base64 encoding failed for {bytes} bytes")]
    EncodeFailed { bytes: usize },

    /// The assembled data URL exceeded the hard character ceiling.
    #[error("image too large to embed: data URL is {chars} chars (limit {limit})")]
    OutputOverflow { chars: usize, limit: usize },
}

impl From<FetchError> for ImageError {
    fn from(source: FetchError) -> Self {
        ImageError::Fetch { source }
    }
}
