use std::io::Cursor;

use anyhow::{Result, anyhow};
use image::{ImageFormat, ImageReader};

/// MIME types accepted as image-to-image sources.
pub const SUPPORTED_SOURCE_MIMES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

pub fn is_supported_source_mime(mime_type: &str) -> bool {
    let normalized = mime_type.trim().to_ascii_lowercase();
    SUPPORTED_SOURCE_MIMES.contains(&normalized.as_str())
}

/// Reads width and height from the image header without decoding pixels.
pub fn get_dimensions(bytes: &[u8], mime_type: &str) -> Result<(u32, u32)> {
    let reader = match mime_to_format(mime_type) {
        Ok(format) => ImageReader::with_format(Cursor::new(bytes), format),
        Err(_) => ImageReader::new(Cursor::new(bytes)).with_guessed_format()?,
    };
    reader
        .into_dimensions()
        .map_err(|err| anyhow!("read image dimensions failed: {err}"))
}

pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"BM") {
        return Some("image/bmp");
    }
    None
}

pub fn mime_to_format(mime_type: &str) -> Result<ImageFormat> {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => Ok(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Ok(ImageFormat::Jpeg),
        "image/gif" => Ok(ImageFormat::Gif),
        "image/webp" => Ok(ImageFormat::WebP),
        "image/bmp" => Ok(ImageFormat::Bmp),
        _ => Err(anyhow!("unsupported mime type: {mime_type}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 180, 160, 255]));
        let mut output = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
            .expect("encode png");
        output
    }

    #[test]
    fn png_dimensions_are_measured() {
        let png = tiny_png(3, 2);
        assert_eq!(detect_mime_type(&png), Some("image/png"));
        assert_eq!(get_dimensions(&png, "image/png").unwrap(), (3, 2));
        assert_eq!(get_dimensions(&png, "application/octet-stream").unwrap(), (3, 2));
    }

    #[test]
    fn garbage_has_no_dimensions() {
        assert!(get_dimensions(b"not an image", "image/png").is_err());
        assert_eq!(detect_mime_type(b"not an image"), None);
    }

    #[test]
    fn source_mimes() {
        assert!(is_supported_source_mime("image/jpeg"));
        assert!(is_supported_source_mime("IMAGE/WEBP"));
        assert!(!is_supported_source_mime("image/gif"));
        assert!(!is_supported_source_mime("image/heic"));
    }
}
