//! Panorama decoding and JPEG encoding.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::types::{Panorama, StreetResult};

/// JPEG quality used when persisting panoramas.
pub const DEFAULT_JPEG_QUALITY: u8 = 100;

/// Decode an image of any supported format from raw bytes.
pub fn decode(bytes: &[u8]) -> StreetResult<Panorama> {
    let img = image::load_from_memory(bytes)?;
    Ok(Arc::new(img))
}

/// Encode an image as JPEG at the given quality (1-100).
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> StreetResult<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    let encoder = JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}
