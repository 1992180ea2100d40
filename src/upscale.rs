//! 4K enhancement
//!
//! [`Upscaler`] is the seam the slide session enhances through. The studio
//! server implements it remotely; [`LocalUpscaler`] runs the same
//! resample-and-sharpen pipeline in process.

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use thiserror::Error;
use tracing::debug;

/// Long edge the enhanced image is resampled to
pub const TARGET_LONG_EDGE: u32 = 3840;

#[derive(Error, Debug)]
pub enum UpscaleError {
    #[error("Upscale request failed: {0}")]
    Remote(String),

    #[error("Invalid upscale result: {0}")]
    Decode(#[from] crate::dataurl::DataUrlError),

    #[error("Upscale task failed: {0}")]
    Task(String),
}

/// Something that can enhance an image to 4K
#[async_trait]
pub trait Upscaler: Send + Sync {
    async fn upscale(&self, image: &RgbaImage) -> Result<RgbaImage, UpscaleError>;
}

/// Unsharp mask with threshold, in 8-bit channel units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnsharpMask {
    /// Gaussian standard deviation
    pub radius: f32,
    /// Strength in percent of the high-pass difference
    pub percent: f32,
    /// Minimum channel difference that gets sharpened
    pub threshold: u8,
}

impl UnsharpMask {
    pub const COARSE: Self = Self {
        radius: 2.4,
        percent: 160.0,
        threshold: 3,
    };

    pub const FINE: Self = Self {
        radius: 0.8,
        percent: 80.0,
        threshold: 0,
    };

    /// Sharpened copy; alpha is left untouched
    #[must_use]
    pub fn apply(&self, image: &RgbaImage) -> RgbaImage {
        let blurred = imageops::blur(image, self.radius);
        let gain = self.percent / 100.0;
        let threshold = i32::from(self.threshold);

        let mut out = image.clone();
        for (dst, low) in out.pixels_mut().zip(blurred.pixels()) {
            for c in 0..3 {
                let diff = i32::from(dst[c]) - i32::from(low[c]);
                if diff.abs() >= threshold {
                    let v = f32::from(dst[c]) + diff as f32 * gain;
                    dst[c] = v.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
        out
    }
}

/// Size an image's long edge is brought up to, keeping aspect ratio
#[must_use]
pub fn target_size(width: u32, height: u32, long_edge: u32) -> (u32, u32) {
    let current = width.max(height);
    if current == 0 || current >= long_edge {
        return (width, height);
    }
    let scale = f64::from(long_edge) / f64::from(current);
    (
        (f64::from(width) * scale).round() as u32,
        (f64::from(height) * scale).round() as u32,
    )
}

/// Drop alpha: every pixel keeps its color and becomes opaque
fn flatten(image: &RgbaImage) -> RgbaImage {
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    DynamicImage::ImageRgb8(rgb).to_rgba8()
}

/// Flatten to opaque RGB, Lanczos resample to `long_edge` (never down),
/// then two sharpening passes
#[must_use]
pub fn enhance(image: &RgbaImage, long_edge: u32) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (tw, th) = target_size(w, h, long_edge);
    debug!(from = ?(w, h), to = ?(tw, th), "Enhancing image");

    let opaque = flatten(image);
    let resized = if (tw, th) == (w, h) {
        opaque
    } else {
        imageops::resize(&opaque, tw, th, FilterType::Lanczos3)
    };
    let sharpened = UnsharpMask::COARSE.apply(&resized);
    UnsharpMask::FINE.apply(&sharpened)
}

/// In-process upscaler
#[derive(Debug, Clone, Copy)]
pub struct LocalUpscaler {
    pub long_edge: u32,
}

impl Default for LocalUpscaler {
    fn default() -> Self {
        Self {
            long_edge: TARGET_LONG_EDGE,
        }
    }
}

#[async_trait]
impl Upscaler for LocalUpscaler {
    async fn upscale(&self, image: &RgbaImage) -> Result<RgbaImage, UpscaleError> {
        let image = image.clone();
        let long_edge = self.long_edge;
        tokio::task::spawn_blocking(move || enhance(&image, long_edge))
            .await
            .map_err(|e| UpscaleError::Task(e.to_string()))
    }
}
