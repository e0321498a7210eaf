//! Image encoding: raw asset bytes → base64 `ImageData` for the vision API.
//!
//! The extractor already wrote each figure to disk, so the bytes are sent as
//! they are: no decode, no re-compression. Only the MIME type is sniffed
//! from the magic bytes so a JPEG is not mislabelled as PNG.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::ImageFormat;
use tracing::debug;

/// MIME type used when the format cannot be recognised.
const FALLBACK_MIME: &str = "image/png";

/// Encode an image file's bytes with the `"high"` detail hint.
pub fn encode_image(bytes: &[u8]) -> ImageData {
    let mime = sniff_mime(bytes);
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} image → {} bytes base64", mime, b64.len());

    ImageData::new(b64, mime).with_detail("high")
}

/// Best-effort MIME type from the leading bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        _ => FALLBACK_MIME,
    }
}
