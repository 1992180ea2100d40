//! Named filter presets
//!
//! Each preset maps to a chain of CSS-style filter functions
//! (`brightness`, `contrast`, `saturate`, `grayscale`, `sepia`, `blur`).
//! The chain is applied in order with clamping after every step, the same
//! way a canvas `filter` string is evaluated.

use std::fmt;

use image::{imageops, ImageBuffer, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// A single filter function
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    /// Multiply each channel (1.0 = unchanged)
    Brightness(f32),
    /// Scale distance from mid-gray (1.0 = unchanged)
    Contrast(f32),
    /// Saturation (1.0 = unchanged, 0.0 = gray)
    Saturate(f32),
    /// Grayscale amount (0.0 = none, 1.0 = full)
    Grayscale(f32),
    /// Sepia amount (0.0 = none, 1.0 = full)
    Sepia(f32),
    /// Gaussian blur standard deviation in pixels
    Blur(f32),
}

impl FilterOp {
    fn is_color(&self) -> bool {
        !matches!(self, Self::Blur(_))
    }

    /// Apply a color operation to straight RGB in `0.0..=1.0`
    fn apply_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        let out = match *self {
            Self::Brightness(b) => rgb.map(|c| c * b),
            Self::Contrast(c) => rgb.map(|v| (v - 0.5) * c + 0.5),
            Self::Saturate(s) => mat3(
                [
                    [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
                    [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
                    [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
                ],
                rgb,
            ),
            Self::Grayscale(g) => {
                let a = 1.0 - g.clamp(0.0, 1.0);
                mat3(
                    [
                        [0.2126 + 0.7874 * a, 0.7152 - 0.7152 * a, 0.0722 - 0.0722 * a],
                        [0.2126 - 0.2126 * a, 0.7152 + 0.2848 * a, 0.0722 - 0.0722 * a],
                        [0.2126 - 0.2126 * a, 0.7152 - 0.7152 * a, 0.0722 + 0.9278 * a],
                    ],
                    rgb,
                )
            }
            Self::Sepia(s) => {
                let a = 1.0 - s.clamp(0.0, 1.0);
                mat3(
                    [
                        [0.393 + 0.607 * a, 0.769 - 0.769 * a, 0.189 - 0.189 * a],
                        [0.349 - 0.349 * a, 0.686 + 0.314 * a, 0.168 - 0.168 * a],
                        [0.272 - 0.272 * a, 0.534 - 0.534 * a, 0.131 + 0.869 * a],
                    ],
                    rgb,
                )
            }
            Self::Blur(_) => rgb,
        };
        out.map(|c| c.clamp(0.0, 1.0))
    }
}

fn mat3(m: [[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Brightness(v) => write!(f, "brightness({v})"),
            Self::Contrast(v) => write!(f, "contrast({v})"),
            Self::Saturate(v) => write!(f, "saturate({v})"),
            Self::Grayscale(v) => write!(f, "grayscale({v})"),
            Self::Sepia(v) => write!(f, "sepia({v})"),
            Self::Blur(v) => write!(f, "blur({v}px)"),
        }
    }
}

/// Named filter preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterPreset {
    #[default]
    None,
    Clarity,
    Bw,
    Epic,
    Lofi,
    Vivid,
    Cinematic,
    WarmGlow,
    Moody,
    Dreamy,
    Matte,
    Hdr,
}

use FilterOp::{Blur, Brightness, Contrast, Grayscale, Saturate, Sepia};

impl FilterPreset {
    /// Every preset except `None`, in menu order
    pub const ALL: [Self; 11] = [
        Self::Clarity,
        Self::Bw,
        Self::Epic,
        Self::Lofi,
        Self::Vivid,
        Self::Cinematic,
        Self::WarmGlow,
        Self::Moody,
        Self::Dreamy,
        Self::Matte,
        Self::Hdr,
    ];

    /// Resolve a preset by name. Unknown names resolve to `None`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "clarity" => Self::Clarity,
            "bw" => Self::Bw,
            "epic" => Self::Epic,
            "lofi" => Self::Lofi,
            "vivid" => Self::Vivid,
            "cinematic" => Self::Cinematic,
            "warmGlow" => Self::WarmGlow,
            "moody" => Self::Moody,
            "dreamy" => Self::Dreamy,
            "matte" => Self::Matte,
            "hdr" => Self::Hdr,
            _ => Self::None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Clarity => "clarity",
            Self::Bw => "bw",
            Self::Epic => "epic",
            Self::Lofi => "lofi",
            Self::Vivid => "vivid",
            Self::Cinematic => "cinematic",
            Self::WarmGlow => "warmGlow",
            Self::Moody => "moody",
            Self::Dreamy => "dreamy",
            Self::Matte => "matte",
            Self::Hdr => "hdr",
        }
    }

    /// Filter chain for this preset
    #[must_use]
    pub fn ops(&self) -> &'static [FilterOp] {
        match self {
            Self::None => &[],
            Self::Clarity => &[Saturate(1.6), Contrast(1.3), Brightness(1.05)],
            Self::Bw => &[Grayscale(1.0), Contrast(1.2), Brightness(1.05)],
            Self::Epic => &[Contrast(1.5), Brightness(0.8), Sepia(0.2), Saturate(1.3)],
            Self::Lofi => &[Contrast(0.9), Saturate(1.2), Brightness(0.9)],
            Self::Vivid => &[Saturate(1.6), Contrast(1.2)],
            Self::Cinematic => &[Contrast(1.4), Brightness(0.9), Sepia(0.1), Saturate(1.2)],
            Self::WarmGlow => &[Brightness(1.1), Sepia(0.2), Saturate(1.2)],
            Self::Moody => &[Contrast(1.3), Brightness(0.8), Saturate(0.8)],
            Self::Dreamy => &[Blur(1.0), Brightness(1.1), Saturate(1.3)],
            Self::Matte => &[Contrast(0.9), Brightness(1.0), Sepia(0.05)],
            Self::Hdr => &[Contrast(1.5), Brightness(1.2), Saturate(1.5)],
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        *self == Self::None
    }

    /// CSS `filter` string (`"none"` for the empty chain)
    #[must_use]
    pub fn css(&self) -> String {
        let ops = self.ops();
        if ops.is_empty() {
            return "none".to_string();
        }
        ops.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
    }

    /// Apply the preset in place
    pub fn apply(&self, image: &mut RgbaImage) {
        apply_ops(self.ops(), image);
    }
}

impl From<String> for FilterPreset {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<FilterPreset> for String {
    fn from(preset: FilterPreset) -> Self {
        preset.name().to_string()
    }
}

impl fmt::Display for FilterPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which layers a filter preset is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterTarget {
    /// Image layer only (caption stays unfiltered)
    #[default]
    Image,
    /// Caption layer only
    Text,
    /// Image and caption
    Both,
}

impl FilterTarget {
    /// Map the "filter text too" toggle
    #[must_use]
    pub fn from_text_toggle(filter_text: bool) -> Self {
        if filter_text {
            Self::Both
        } else {
            Self::Image
        }
    }

    #[must_use]
    pub fn includes_image(&self) -> bool {
        matches!(self, Self::Image | Self::Both)
    }

    #[must_use]
    pub fn includes_text(&self) -> bool {
        matches!(self, Self::Text | Self::Both)
    }
}

/// Apply a filter chain in place
pub fn apply_ops(ops: &[FilterOp], image: &mut RgbaImage) {
    let mut i = 0;
    while i < ops.len() {
        if let Blur(sigma) = ops[i] {
            blur_rgba(image, sigma);
            i += 1;
            continue;
        }

        // Fuse consecutive color ops into one pixel pass
        let run_end = ops[i..]
            .iter()
            .position(|op| !op.is_color())
            .map_or(ops.len(), |p| i + p);
        let run = &ops[i..run_end];
        for pixel in image.pixels_mut() {
            if pixel[3] == 0 {
                continue;
            }
            let mut rgb = [
                f32::from(pixel[0]) / 255.0,
                f32::from(pixel[1]) / 255.0,
                f32::from(pixel[2]) / 255.0,
            ];
            for op in run {
                rgb = op.apply_rgb(rgb);
            }
            pixel[0] = to_u8(rgb[0]);
            pixel[1] = to_u8(rgb[1]);
            pixel[2] = to_u8(rgb[2]);
        }
        i = run_end;
    }
}

/// Gaussian blur on premultiplied color so transparent edges don't bleed black
fn blur_rgba(image: &mut RgbaImage, sigma: f32) {
    if sigma <= 0.0 {
        return;
    }
    let (width, height) = image.dimensions();
    let premultiplied: ImageBuffer<Rgba<f32>, Vec<f32>> = ImageBuffer::from_fn(width, height, |x, y| {
        let p = image.get_pixel(x, y);
        let a = f32::from(p[3]) / 255.0;
        Rgba([
            f32::from(p[0]) / 255.0 * a,
            f32::from(p[1]) / 255.0 * a,
            f32::from(p[2]) / 255.0 * a,
            a,
        ])
    });

    let blurred = imageops::blur(&premultiplied, sigma);

    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let p = blurred.get_pixel(x, y);
        let a = p[3].clamp(0.0, 1.0);
        if a <= f32::EPSILON {
            *pixel = Rgba([0, 0, 0, 0]);
            continue;
        }
        *pixel = Rgba([to_u8(p[0] / a), to_u8(p[1] / a), to_u8(p[2] / a), to_u8(a)]);
    }
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swatch() -> RgbaImage {
        RgbaImage::from_fn(8, 8, |x, y| Rgba([(x * 30) as u8, (y * 30) as u8, 120, 255]))
    }

    #[test]
    fn test_css_strings() {
        assert_eq!(FilterPreset::None.css(), "none");
        assert_eq!(FilterPreset::Vivid.css(), "saturate(1.6) contrast(1.2)");
        assert_eq!(FilterPreset::Dreamy.css(), "blur(1px) brightness(1.1) saturate(1.3)");
        assert_eq!(FilterPreset::Bw.css(), "grayscale(1) contrast(1.2) brightness(1.05)");
    }

    #[test]
    fn test_names_round_trip() {
        for preset in FilterPreset::ALL {
            assert_eq!(FilterPreset::from_name(preset.name()), preset);
        }
        assert_eq!(FilterPreset::from_name("enhance4k"), FilterPreset::None);
        assert_eq!(FilterPreset::from_name(""), FilterPreset::None);
    }

    #[test]
    fn test_none_leaves_pixels_untouched() {
        let original = swatch();
        let mut image = original.clone();
        FilterPreset::None.apply(&mut image);
        assert_eq!(image, original);
    }

    #[test]
    fn test_bw_produces_gray_pixels() {
        let mut image = swatch();
        FilterPreset::Bw.apply(&mut image);
        for pixel in image.pixels() {
            let spread = i32::from(pixel[0].max(pixel[1]).max(pixel[2]))
                - i32::from(pixel[0].min(pixel[1]).min(pixel[2]));
            assert!(spread <= 1, "pixel {pixel:?} is not gray");
        }
    }

    #[test]
    fn test_brightness_and_contrast() {
        let mid = Brightness(2.0).apply_rgb([0.25, 0.5, 0.75]);
        assert_eq!(mid, [0.5, 1.0, 1.0]);

        let flat = Contrast(0.0).apply_rgb([0.1, 0.9, 0.3]);
        assert_eq!(flat, [0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_saturate_zero_is_luma() {
        let out = Saturate(0.0).apply_rgb([1.0, 0.0, 0.0]);
        assert!((out[0] - 0.213).abs() < 1e-4);
        assert!((out[1] - 0.213).abs() < 1e-4);
        assert!((out[2] - 0.213).abs() < 1e-4);
    }

    #[test]
    fn test_blur_keeps_transparent_regions_clean() {
        let mut image = RgbaImage::from_pixel(9, 9, Rgba([0, 0, 0, 0]));
        image.put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        FilterPreset::Dreamy.apply(&mut image);

        let center = image.get_pixel(4, 4);
        let neighbor = image.get_pixel(5, 4);
        assert!(center[3] < 255, "blur should spread alpha");
        assert!(neighbor[3] > 0);
        // color stays white where there is coverage
        assert!(neighbor[0] > 200);
    }

    #[test]
    fn test_filter_target_toggle() {
        assert_eq!(FilterTarget::from_text_toggle(true), FilterTarget::Both);
        assert_eq!(FilterTarget::from_text_toggle(false), FilterTarget::Image);
        assert!(FilterTarget::Text.includes_text());
        assert!(!FilterTarget::Text.includes_image());
    }
}
