//! Lossy re-encode under a bounded wall-clock deadline.
//!
//! ## Why spawn_blocking?
//!
//! Decoding and JPEG encoding are CPU-bound and can take hundreds of
//! milliseconds on large photos. Running them on the blocking pool keeps the
//! Tokio worker threads free for other captures' network I/O.
//!
//! ## Soft deadline
//!
//! The codec task is raced against a timer. If the timer wins we stop
//! waiting and hand back the original bytes; the blocking task is not
//! interrupted and its result is simply discarded when it finishes. That
//! costs some CPU in the worst case but never delays the caller past the
//! deadline and never touches the original buffer.

use crate::config::TRANSCODE_DEADLINE_MS;
use crate::output::OutputFormat;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default deadline for one transcode.
pub const TRANSCODE_DEADLINE: Duration = Duration::from_millis(TRANSCODE_DEADLINE_MS);

/// Result of a transcode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoded {
    pub bytes: Vec<u8>,
    /// `Lossy` when re-encoded, `Original` when `bytes` is the untouched input.
    pub format: OutputFormat,
}

impl Transcoded {
    fn original(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            format: OutputFormat::Original,
        }
    }
}

/// Re-encode `bytes` to JPEG at `quality`, falling back to the input.
///
/// GIFs are passed through untouched: JPEG would keep only the first frame.
pub async fn transcode(bytes: Vec<u8>, quality: u8, deadline: Duration) -> Transcoded {
    if matches!(image::guess_format(&bytes), Ok(ImageFormat::Gif)) {
        debug!("Keeping GIF as-is ({} bytes)", bytes.len());
        return Transcoded::original(bytes);
    }
    transcode_with(bytes, deadline, move |input| reencode_jpeg(input, quality)).await
}

/// Run `codec` over `bytes` on the blocking pool, racing `deadline`.
///
/// Returns the codec output tagged [`OutputFormat::Lossy`] if it finishes in
/// time, otherwise the input bytes unchanged tagged
/// [`OutputFormat::Original`]. A codec error or panic also yields the input.
pub async fn transcode_with<F>(bytes: Vec<u8>, deadline: Duration, codec: F) -> Transcoded
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>, image::ImageError> + Send + 'static,
{
    let input = Arc::new(bytes);
    let task_input = Arc::clone(&input);
    let task = tokio::task::spawn_blocking(move || codec(&task_input));

    let outcome = tokio::time::timeout(deadline, task).await;
    // The abandoned task may still hold a reference; copy out in that case.
    let original = Arc::try_unwrap(input).unwrap_or_else(|shared| shared.as_ref().clone());

    match outcome {
        Ok(Ok(Ok(encoded))) => {
            debug!(
                "Transcoded {} → {} bytes",
                original.len(),
                encoded.len()
            );
            Transcoded {
                bytes: encoded,
                format: OutputFormat::Lossy,
            }
        }
        Ok(Ok(Err(e))) => {
            debug!("Transcode failed, keeping original bytes: {}", e);
            Transcoded::original(original)
        }
        Ok(Err(join_err)) => {
            warn!("Transcode task panicked, keeping original bytes: {}", join_err);
            Transcoded::original(original)
        }
        Err(_) => {
            warn!(
                "Transcode exceeded {}ms deadline, keeping original bytes",
                deadline.as_millis()
            );
            Transcoded::original(original)
        }
    }
}

/// Decode any supported raster format and encode it as JPEG.
///
/// JPEG has no alpha channel, so translucent pixels are composited onto
/// white. Quality is clamped to 1–100 (the encoder rejects 0).
pub fn reencode_jpeg(input: &[u8], quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let decoded = image::load_from_memory(input)?;
    let rgb = if decoded.color().has_alpha() {
        flatten_onto_white(&decoded)
    } else {
        decoded.to_rgb8()
    };

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(buf)
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}
