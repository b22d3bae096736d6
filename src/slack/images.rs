//! Image preparation for multimodal prompts.
//!
//! Attachments are downsized so the longest side is at most 512 px, flattened
//! onto white and re-encoded as base64 JPEG.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};

use crate::types::{AppError, EncodedImage, Result};

pub const MAX_IMAGE_DIMENSION: u32 = 512;
const JPEG_QUALITY: u8 = 85;

pub fn prepare_image(bytes: &[u8]) -> Result<EncodedImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| AppError::InvalidInput(format!("Unsupported image: {}", e)))?;

    let (width, height) = img.dimensions();
    let img = if width.max(height) > MAX_IMAGE_DIMENSION {
        img.resize(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    let rgb = flatten_on_white(&img);
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| AppError::Internal(format!("Failed to encode JPEG: {}", e)))?;

    Ok(EncodedImage::jpeg(STANDARD.encode(&jpeg)))
}

fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}
