//! PNG data URLs
//!
//! The studio server exchanges images as `data:image/png;base64,...`
//! strings. Decoding also accepts bare base64 and any image format the
//! `image` crate can sniff.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataUrlError {
    #[error("Not a base64 data URL")]
    NotBase64,

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, DataUrlError>;

/// Encode an image as PNG bytes
pub fn png_bytes(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Encode an image as a PNG data URL
pub fn encode_png(image: &RgbaImage) -> Result<String> {
    let png = png_bytes(image)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Raw payload bytes of a data URL (or bare base64)
pub fn decode_bytes(data_url: &str) -> Result<Vec<u8>> {
    let payload = match data_url.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest.split_once(',').ok_or(DataUrlError::NotBase64)?;
            if !meta.ends_with(";base64") {
                return Err(DataUrlError::NotBase64);
            }
            data
        }
        None => data_url,
    };
    Ok(STANDARD.decode(payload.trim())?)
}

/// Decode a data URL into an RGBA image
pub fn decode(data_url: &str) -> Result<RgbaImage> {
    let bytes = decode_bytes(data_url)?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_png_data_url_prefix() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let url = encode_png(&image).unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBOR"));
        assert_eq!(decode(&url).unwrap(), image);
    }

    #[test]
    fn test_rejects_percent_encoded_data_url() {
        let err = decode_bytes("data:text/plain,hello").unwrap_err();
        assert!(matches!(err, DataUrlError::NotBase64));
    }

    #[test]
    fn test_bare_base64_is_accepted() {
        assert_eq!(decode_bytes("aGVsbG8=").unwrap(), b"hello");
    }
}
