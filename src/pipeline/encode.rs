//! Data-URL encoding: raw bytes → `data:<mime>;base64,<payload>`.
//!
//! Input is encoded in fixed-size chunks so a multi-megabyte photo never
//! needs a second full-size temporary buffer. Chunks are a multiple of three
//! bytes long, so each chunk's base64 output is padding-free and the pieces
//! concatenate into one valid payload.

use crate::output::OutputFormat;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Bytes encoded per chunk (96 KiB, divisible by 3).
pub const ENCODE_CHUNK_BYTES: usize = 3 * 32 * 1024;

/// Encode `bytes` as a data URL with the given MIME type.
///
/// Returns an empty string on failure (empty input, empty MIME type, or a
/// payload whose length would overflow `usize`). Callers must treat an empty
/// string as "encoding failed", never as a zero-length image.
pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    let mime = mime.trim();
    if bytes.is_empty() || mime.is_empty() {
        return String::new();
    }

    let Some(payload_len) = base64::encoded_len(bytes.len(), true) else {
        debug!("Base64 length overflow for {} bytes", bytes.len());
        return String::new();
    };
    let prefix_len = "data:".len() + mime.len() + ";base64,".len();
    let Some(capacity) = payload_len.checked_add(prefix_len) else {
        return String::new();
    };

    let mut out = String::with_capacity(capacity);
    out.push_str("data:");
    out.push_str(mime);
    out.push_str(";base64,");
    for chunk in bytes.chunks(ENCODE_CHUNK_BYTES) {
        STANDARD.encode_string(chunk, &mut out);
    }
    out.retain(|c| c != '\n' && c != '\r');
    out
}

/// Pick the MIME type for the data URL.
///
/// Re-encoded bytes are always JPEG. Original bytes use the server's
/// `Content-Type` when it names an image, else the type sniffed from the
/// magic bytes. `None` means the body is not recognisably an image (a login
/// wall or soft-404 page, say) and must not be inlined.
pub fn mime_for(format: OutputFormat, bytes: &[u8], content_type: Option<&str>) -> Option<String> {
    if format == OutputFormat::Lossy {
        return Some(OutputFormat::LOSSY_MIME.to_string());
    }
    if let Some(ct) = content_type.filter(|ct| ct.starts_with("image/")) {
        return Some(ct.to_string());
    }
    image::guess_format(bytes)
        .ok()
        .map(|f| f.to_mime_type().to_string())
}
