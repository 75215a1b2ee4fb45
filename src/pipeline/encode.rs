//! Image encoding: decoded bitmap → PNG bytes → base64 `ImageData`.
//!
//! Backends hand back whatever pixel layout the PDF used. PNG can store
//! 8-bit gray, RGB and RGBA directly; everything else (16-bit, float, gray
//! with alpha) is flattened to RGBA8 first so the encoder never sees a layout
//! the captioning service might choke on.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

/// Normalise the pixel layout and encode as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let normalised: Cow<'_, DynamicImage> = match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
            Cow::Borrowed(img)
        }
        other => Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8())),
    };

    let mut buf = Vec::new();
    normalised.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} PNG bytes",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Wrap PNG bytes for a multimodal chat request.
///
/// `detail: "high"` lets GPT-4-class models tile the image instead of
/// looking at a single downscaled overview.
pub fn image_data(png: &[u8]) -> ImageData {
    ImageData::new(STANDARD.encode(png), "image/png").with_detail("high")
}
