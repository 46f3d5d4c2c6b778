//! Image format sniffing and re-encoding helpers.

use crate::error::{ExtractError, ExtractResult};

/// MIME types accepted as page images.
pub const IMAGE_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Detect the image MIME type from magic bytes.
pub fn sniff_mime(content: &[u8]) -> ExtractResult<&'static str> {
    if content.len() < 8 {
        return Err(ExtractError::Image("Content too short".to_string()));
    }

    if content.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Ok("image/png")
    } else if content.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Ok("image/jpeg")
    } else if content.starts_with(b"GIF87a") || content.starts_with(b"GIF89a") {
        Ok("image/gif")
    } else if content.starts_with(b"RIFF") && content.len() > 12 && &content[8..12] == b"WEBP" {
        Ok("image/webp")
    } else {
        Err(ExtractError::Image("Unknown image format".to_string()))
    }
}

/// Whether the MIME type is an accepted page image.
pub fn is_image_mime(mime_type: &str) -> bool {
    IMAGE_MIME_TYPES.contains(&mime_type)
}

/// Encode raw 8-bit gray or RGB samples as PNG.
#[cfg(feature = "image")]
pub fn encode_raw_png(width: u32, height: u32, channels: u8, samples: Vec<u8>) -> ExtractResult<Vec<u8>> {
    use ::image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

    let image = match channels {
        1 => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        n => {
            return Err(ExtractError::Image(format!(
                "Unsupported channel count: {}",
                n
            )))
        }
    }
    .ok_or_else(|| ExtractError::Image("Sample buffer does not match dimensions".to_string()))?;

    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| ExtractError::Image(e.to_string()))?;
    Ok(out.into_inner())
}
