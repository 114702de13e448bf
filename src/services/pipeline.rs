use image::imageops::FilterType;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::wardrobe_queries;
use crate::models::image::{ImagePurpose, ImageRef};
use crate::services::compose;
use crate::services::storage::MediaStore;

/// Longest output dimension after optimization. Images are never upscaled.
const MAX_DIMENSION: u32 = 1024;

/// The three source formats the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedFormat {
    Jpeg,
    Png,
    Webp,
}

impl SniffedFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            SniffedFormat::Jpeg => "image/jpeg",
            SniffedFormat::Png => "image/png",
            SniffedFormat::Webp => "image/webp",
        }
    }
}

/// Identify the format from magic bytes. Stored mime types are advisory;
/// the sniffed format always wins.
pub fn sniff_format(bytes: &[u8]) -> Option<SniffedFormat> {
    if bytes.len() >= 3 && bytes[..3] == [0xFF, 0xD8, 0xFF] {
        return Some(SniffedFormat::Jpeg);
    }
    if bytes.len() >= 8 && bytes[..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
        return Some(SniffedFormat::Png);
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(SniffedFormat::Webp);
    }
    None
}

/// A source image fetched from the media store, with its detected format.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub bytes: Vec<u8>,
    pub format: SniffedFormat,
}

impl DownloadedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Resolve an image id to bytes: record lookup, 60-second signed URL,
/// direct fetch from the bucket, magic-byte sniff.
pub async fn download_image(
    pool: &PgPool,
    store: &MediaStore,
    http: &reqwest::Client,
    image_id: Uuid,
    owner_user_id: Uuid,
) -> Result<DownloadedImage, PipelineError> {
    let record = wardrobe_queries::get_image(pool, image_id, owner_user_id)
        .await?
        .ok_or(PipelineError::ImageNotFound(image_id))?;

    let url = store
        .signed_url(&record.storage_key)
        .await
        .map_err(|e| PipelineError::DownloadFailed(e.to_string()))?;

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| PipelineError::DownloadFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(PipelineError::DownloadFailed(format!(
            "fetch of {} returned {}",
            record.storage_key,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PipelineError::DownloadFailed(e.to_string()))?
        .to_vec();

    let format = sniff_format(&bytes).ok_or(PipelineError::InvalidImage)?;

    if format.mime_type() != record.mime_type {
        tracing::warn!(
            image_id = %image_id,
            stored = %record.mime_type,
            detected = format.mime_type(),
            "stored mime type disagrees with magic bytes; using detected format"
        );
    }

    Ok(DownloadedImage { bytes, format })
}

/// Downscale so the longest side is at most 1024 px and re-encode as JPEG.
/// Best-effort: any failure falls back to the original bytes untouched.
pub fn optimize(bytes: Vec<u8>, source_mime: &str) -> (Vec<u8>, String) {
    match try_optimize(&bytes) {
        Ok(optimized) => (optimized, "image/jpeg".to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "image optimization failed, keeping original bytes");
            (bytes, source_mime.to_string())
        }
    }
}

fn try_optimize(bytes: &[u8]) -> Result<Vec<u8>, compose::ComposeError> {
    let img = image::load_from_memory(bytes)?;

    let resized = if img.width().max(img.height()) > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    compose::encode_jpeg(&resized)
}

/// Write generated bytes under `<owner>/ai/<purpose>/<uuid>.jpg` and create
/// the image record. Storage and database failures are reported as distinct
/// kinds so operators can tell the layers apart.
pub async fn upload_generated(
    pool: &PgPool,
    store: &MediaStore,
    owner_user_id: Uuid,
    purpose: ImagePurpose,
    bytes: &[u8],
    mime_type: &str,
) -> Result<ImageRef, PipelineError> {
    let key = format!("{owner_user_id}/ai/{purpose}/{}.jpg", Uuid::new_v4());

    store
        .upload(&key, bytes, mime_type)
        .await
        .map_err(|e| PipelineError::UploadFailed(e.to_string()))?;

    let record = wardrobe_queries::create_image_record(pool, owner_user_id, &key, mime_type, purpose)
        .await
        .map_err(|e| PipelineError::RecordCreateFailed(e.to_string()))?;

    Ok(ImageRef {
        image_id: record.id,
        mime_type: record.mime_type,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("image {0} not found")]
    ImageNotFound(Uuid),

    #[error("image download failed: {0}")]
    DownloadFailed(String),

    #[error("image bytes are not JPEG, PNG, or WebP")]
    InvalidImage,

    #[error("image upload failed: {0}")]
    UploadFailed(String),

    #[error("image record creation failed: {0}")]
    RecordCreateFailed(String),

    #[error("image lookup failed: {0}")]
    Db(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 40, 200])));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn sniffs_the_three_supported_formats() {
        assert_eq!(sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(SniffedFormat::Jpeg));
        assert_eq!(sniff_format(&png_bytes(4, 4)), Some(SniffedFormat::Png));

        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&[0x10, 0x00, 0x00, 0x00]);
        webp.extend_from_slice(b"WEBPVP8 ");
        assert_eq!(sniff_format(&webp), Some(SniffedFormat::Webp));

        assert_eq!(sniff_format(b"GIF89a"), None);
        assert_eq!(sniff_format(b""), None);
    }

    #[test]
    fn optimize_downscales_longest_side_to_1024() {
        let (out, mime) = optimize(png_bytes(2048, 1024), "image/png");
        assert_eq!(mime, "image/jpeg");
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width().max(decoded.height()), 1024);
    }

    #[test]
    fn optimize_never_upscales() {
        let (out, _) = optimize(png_bytes(100, 80), "image/png");
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 80));
    }

    #[test]
    fn optimize_failure_returns_original_bytes_unchanged() {
        let garbage = b"definitely not an image".to_vec();
        let (out, mime) = optimize(garbage.clone(), "image/webp");
        assert_eq!(out, garbage);
        assert_eq!(mime, "image/webp");
    }
}
