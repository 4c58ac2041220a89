//! Image preparation for the page-level extractors.
//!
//! Vision models get a JPEG that fits inside the raster profile, wrapped as a
//! base64 `ImageData`. The OCR engine gets a cleaned-up grayscale PNG:
//! Tesseract reads high-contrast, sharp, single-channel input far better than
//! a colour scan with a grey background.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Decode raw image bytes of any supported format.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
    image::load_from_memory(bytes)
}

/// Shrink `img` to fit inside `max_width`×`max_height`, keeping the aspect
/// ratio. Images already inside the box are returned unchanged.
pub fn fit_inside(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if img.width() <= max_width && img.height() <= max_height {
        return img;
    }
    img.resize(max_width, max_height, FilterType::Lanczos3)
}

/// Encode a page image as a base64 JPEG ready for a vision model.
pub fn encode_for_vision(
    bytes: &[u8],
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> Result<ImageData, image::ImageError> {
    let img = fit_inside(decode(bytes)?, max_width, max_height);

    let mut buf = Vec::new();
    img.to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/jpeg").with_detail("high"))
}

/// Prepare a page image for Tesseract and return it as PNG bytes.
///
/// Steps: grayscale, contrast stretch, fit inside the OCR size cap, unsharp
/// mask.
pub fn prepare_for_ocr(
    bytes: &[u8],
    max_width: u32,
    max_height: u32,
) -> Result<Vec<u8>, image::ImageError> {
    let gray = stretch_contrast(decode(bytes)?.to_luma8());
    let img = fit_inside(DynamicImage::ImageLuma8(gray), max_width, max_height);
    let img = img.unsharpen(1.5, 2);

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Linearly remap luminance so the darkest pixel becomes 0 and the
/// brightest 255.
fn stretch_contrast(mut img: GrayImage) -> GrayImage {
    let (min, max) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if max <= min {
        return img;
    }
    let span = (max - min) as u32;
    for p in img.pixels_mut() {
        p[0] = ((p[0] - min) as u32 * 255 / span) as u8;
    }
    img
}
