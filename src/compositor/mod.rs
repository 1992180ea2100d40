//! Slide compositor
//!
//! Renders an image with a styled caption at any scale factor, so the live
//! preview, thumbnails and full-resolution exports share one code path.
//!
//! # Example
//!
//! ```rust,no_run
//! use slidekit::compositor::Compositor;
//! use slidekit::{FilterTarget, StyleConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let image = image::open("slide.jpg")?.to_rgba8();
//! let style = StyleConfig::default().with_text("WHEN THE BUILD PASSES");
//! let compositor = Compositor::with_system_fonts();
//! let out = compositor.compose(&image, 2.0, &style, FilterTarget::Image)?;
//! out.save("slide_1@2x.png")?;
//! # Ok(())
//! # }
//! ```

pub mod font;
pub mod layout;
pub mod raster;

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use thiserror::Error;
use tracing::debug;

use crate::filter::FilterTarget;
use crate::style::{Color, StyleConfig};

pub use font::{FontFace, FontLibrary, FontProvider, TtfFace, VerticalMetrics};
pub use layout::{layout_arc, layout_straight, measure, ArcLayout, LineLayout};
use raster::{draw_path, Brush, Shadow};
use tiny_skia::{Path, PathBuilder, Pixmap, Rect, Transform};

/// Compositor errors
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Font not found: {family} (weight {weight})")]
    FontNotFound { family: String, weight: u16 },

    #[error("Font load error: {0}")]
    FontLoad(String),

    #[error("Invalid scale factor: {0}")]
    InvalidScale(f32),

    #[error("Cannot allocate a {0}x{1} surface")]
    Surface(u32, u32),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, CompositorError>;

/// Minimum outline width in device pixels
const MIN_LINE_WIDTH: f32 = 3.0;
/// Outline passes per glyph
const STROKE_PASSES: usize = 3;
/// Background box opacity relative to the text opacity
const BOX_OPACITY: f32 = 0.7;

fn shadow_from_style(style: &StyleConfig, scale: f32) -> Option<Shadow> {
    let blur = style.shadow_blur * scale;
    let dx = style.shadow_offset_x * scale;
    let dy = style.shadow_offset_y * scale;
    if style.shadow_color.is_transparent() || (blur == 0.0 && dx == 0.0 && dy == 0.0) {
        return None;
    }
    Some(Shadow {
        color: style.shadow_color,
        sigma: blur / 2.0,
        dx,
        dy,
    })
}

/// Caption paint parameters resolved for one scale
#[derive(Debug, Clone, Copy)]
struct TextPaint {
    fill: Color,
    stroke: Color,
    line_width: f32,
    opacity: f32,
    shadow: Option<Shadow>,
}

impl TextPaint {
    fn from_style(style: &StyleConfig, scale: f32) -> Self {
        Self {
            fill: style.fill_color,
            stroke: style.stroke_color,
            line_width: (style.stroke_width * scale).max(MIN_LINE_WIDTH),
            opacity: style.text_opacity,
            shadow: shadow_from_style(style, scale),
        }
    }

    /// Outline passes then the fill, each casting the shadow
    fn paint(&self, canvas: &mut Pixmap, path: &Path, transform: Transform) {
        if !self.stroke.is_transparent() {
            let brush = Brush::Stroke(self.line_width);
            for _ in 0..STROKE_PASSES {
                draw_path(canvas, path, &brush, transform, self.stroke, self.opacity, self.shadow.as_ref());
            }
        }
        draw_path(canvas, path, &Brush::Fill, transform, self.fill, self.opacity, self.shadow.as_ref());
    }
}

/// Slide compositor
pub struct Compositor {
    fonts: Arc<dyn FontProvider>,
}

impl Compositor {
    /// Create a compositor backed by a font provider
    #[must_use]
    pub fn new(fonts: Arc<dyn FontProvider>) -> Self {
        Self { fonts }
    }

    /// Create a compositor that resolves fonts from the system
    #[must_use]
    pub fn with_system_fonts() -> Self {
        Self::new(Arc::new(FontLibrary::system()))
    }

    /// Output size for an image at `scale`
    #[must_use]
    pub fn surface_size(image: &RgbaImage, scale: f32) -> (u32, u32) {
        let w = (image.width() as f32 * scale).floor().max(1.0) as u32;
        let h = (image.height() as f32 * scale).floor().max(1.0) as u32;
        (w, h)
    }

    /// Render `image` and its caption onto a new transparent surface
    pub fn compose(&self, image: &RgbaImage, scale: f32, style: &StyleConfig, target: FilterTarget) -> Result<RgbaImage> {
        check_scale(scale)?;
        let (w, h) = Self::surface_size(image, scale);
        let mut surface = RgbaImage::new(w, h);
        self.compose_into(&mut surface, (0, 0), image, scale, style, target)?;
        Ok(surface)
    }

    /// Render onto an existing surface with the slide's top-left at `at`
    pub fn compose_into(
        &self,
        surface: &mut RgbaImage,
        at: (i64, i64),
        image: &RgbaImage,
        scale: f32,
        style: &StyleConfig,
        target: FilterTarget,
    ) -> Result<()> {
        check_scale(scale)?;
        let style = style.clone().clamped();
        let (w, h) = Self::surface_size(image, scale);
        debug!(w, h, scale, filter = %style.filter, "Composing slide");

        let mut layer = image_layer(image, (w, h), style.rotation_angle)?;
        let text = self.text_layer((w, h), image, scale, &style)?;

        match (text, target) {
            (Some(text), FilterTarget::Both) => {
                imageops::overlay(&mut layer, &text, 0, 0);
                style.filter.apply(&mut layer);
                imageops::overlay(surface, &layer, at.0, at.1);
            }
            (Some(mut text), _) => {
                if target.includes_image() {
                    style.filter.apply(&mut layer);
                }
                if target.includes_text() {
                    style.filter.apply(&mut text);
                }
                imageops::overlay(surface, &layer, at.0, at.1);
                imageops::overlay(surface, &text, at.0, at.1);
            }
            (None, _) => {
                if target.includes_image() {
                    style.filter.apply(&mut layer);
                }
                imageops::overlay(surface, &layer, at.0, at.1);
            }
        }
        Ok(())
    }

    /// Caption layer on a transparent canvas, `None` when there is no text
    fn text_layer(&self, size: (u32, u32), image: &RgbaImage, scale: f32, style: &StyleConfig) -> Result<Option<RgbaImage>> {
        if style.text.is_empty() {
            return Ok(None);
        }
        let face = self.fonts.face(&style.font_family, style.font_weight.0)?;
        let face = face.as_ref();

        let px = style.font_size * scale;
        let spacing = style.letter_spacing * scale;
        let center = (
            image.width() as f32 * scale / 2.0 + style.text_offset.x * scale,
            image.height() as f32 * scale / 2.0 + style.text_offset.y * scale,
        );
        let paint = TextPaint::from_style(style, scale);
        let mut canvas = Pixmap::new(size.0, size.1).ok_or(CompositorError::Surface(size.0, size.1))?;

        if style.is_curved() {
            let arc = layout_arc(face, &style.text, px, spacing, style.curve_radius * scale, center);
            for glyph in &arc.glyphs {
                if let Some(path) = face.outline(glyph.ch, px) {
                    paint.paint(&mut canvas, &path, arc.transform(glyph));
                }
            }
            return Ok(Some(raster::to_image(&canvas)));
        }

        let line = layout_straight(face, &style.text, px, spacing, center);
        if style.bg_padding > 0.0 {
            draw_box(&mut canvas, face, &line, &style.text, px, style, scale, &paint);
        }

        if spacing == 0.0 {
            // the whole line is one shape, so outlines never cover earlier fills
            let mut builder = PathBuilder::new();
            for glyph in &line.glyphs {
                let placed = face
                    .outline(glyph.ch, px)
                    .and_then(|path| path.transform(Transform::from_translate(glyph.x, line.baseline)));
                if let Some(path) = placed {
                    builder.push_path(&path);
                }
            }
            if let Some(path) = builder.finish() {
                paint.paint(&mut canvas, &path, Transform::identity());
            }
        } else {
            for glyph in &line.glyphs {
                if let Some(path) = face.outline(glyph.ch, px) {
                    paint.paint(&mut canvas, &path, Transform::from_translate(glyph.x, line.baseline));
                }
            }
        }
        Ok(Some(raster::to_image(&canvas)))
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_box(
    canvas: &mut Pixmap,
    face: &dyn FontFace,
    line: &LineLayout,
    text: &str,
    px: f32,
    style: &StyleConfig,
    scale: f32,
    paint: &TextPaint,
) {
    let (above, below) = layout::ink_height(face, text, px);
    let pad = style.bg_padding * scale;
    let ink = above + below;
    let center_y = line.baseline - face.vertical_metrics(px).middle_to_baseline();
    let Some(rect) = Rect::from_xywh(line.left - pad, center_y - ink / 2.0 - pad, line.width + 2.0 * pad, ink + 2.0 * pad)
    else {
        return;
    };
    draw_path(
        canvas,
        &PathBuilder::from_rect(rect),
        &Brush::Fill,
        Transform::identity(),
        style.bg_color,
        BOX_OPACITY * paint.opacity,
        paint.shadow.as_ref(),
    );
}

fn check_scale(scale: f32) -> Result<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(CompositorError::InvalidScale(scale))
    }
}

/// Scaled (and rotated) copy of the source image
fn image_layer(image: &RgbaImage, size: (u32, u32), rotation: f32) -> Result<RgbaImage> {
    let layer = if size == image.dimensions() {
        image.clone()
    } else {
        let filter = if size.0 < image.width() {
            FilterType::Triangle
        } else {
            FilterType::CatmullRom
        };
        imageops::resize(image, size.0, size.1, filter)
    };
    if raster::is_full_turn(rotation) {
        Ok(layer)
    } else {
        raster::rotate_about_center(&layer, rotation).ok_or(CompositorError::Surface(size.0, size.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterPreset;
    use font::BlockFonts;
    use image::Rgba;

    const GRAY: Rgba<u8> = Rgba([128, 128, 128, 255]);

    fn compositor() -> Compositor {
        Compositor::new(Arc::new(BlockFonts))
    }

    fn gray(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, GRAY)
    }

    /// Column span `[min, max]` of pixels that differ from the background
    fn ink_columns(surface: &RgbaImage, background: Rgba<u8>) -> Option<(u32, u32)> {
        surface
            .enumerate_pixels()
            .filter(|(_, _, p)| **p != background)
            .fold(None, |acc, (x, _, _)| match acc {
                None => Some((x, x)),
                Some((l, r)) => Some((l.min(x), r.max(x))),
            })
    }

    #[test]
    fn test_surface_size_floors_and_never_collapses() {
        let image = gray(333, 100);
        assert_eq!(Compositor::surface_size(&image, 0.5), (166, 50));
        assert_eq!(Compositor::surface_size(&image, 0.001), (1, 1));
    }

    #[test]
    fn test_invalid_scale_is_rejected() {
        let err = compositor()
            .compose(&gray(10, 10), 0.0, &StyleConfig::default(), FilterTarget::Image)
            .unwrap_err();
        assert!(matches!(err, CompositorError::InvalidScale(_)));
    }

    #[test]
    fn test_empty_text_draws_image_only() {
        struct NoFonts;
        impl FontProvider for NoFonts {
            fn face(&self, family: &str, weight: u16) -> Result<Arc<dyn FontFace>> {
                Err(CompositorError::FontNotFound {
                    family: family.to_string(),
                    weight,
                })
            }
        }

        let image = gray(40, 30);
        let out = Compositor::new(Arc::new(NoFonts))
            .compose(&image, 1.0, &StyleConfig::default(), FilterTarget::Image)
            .unwrap();
        assert_eq!(out, image);
    }

    #[test]
    fn test_straight_caption_is_centered_with_offset() {
        let mut style = StyleConfig::default().with_text("HELLO");
        style.font_size = 20.0;
        style.stroke_width = 0.0;
        style.text_offset.x = 10.0;

        for scale in [1.0f32, 2.0] {
            let out = compositor().compose(&gray(200, 100), scale, &style, FilterTarget::Image).unwrap();
            let (l, r) = ink_columns(&out, GRAY).unwrap();
            let center = (l + r + 1) as f32 / 2.0;
            let expected = (100.0 + 10.0) * scale;
            assert!((center - expected).abs() <= 1.0, "scale {scale}: center {center}, expected {expected}");
        }
    }

    #[test]
    fn test_curved_caption_sits_above_center() {
        let mut style = StyleConfig::default().with_text("ARC");
        style.font_size = 16.0;
        style.curve_radius = 60.0;

        let out = compositor().compose(&gray(200, 200), 1.0, &style, FilterTarget::Image).unwrap();
        let rows: Vec<u32> = out
            .enumerate_pixels()
            .filter(|(_, _, p)| **p != GRAY)
            .map(|(_, y, _)| y)
            .collect();
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|&y| y < 100));
    }

    #[test]
    fn test_background_box_is_wider_than_text() {
        let mut style = StyleConfig::default().with_text("HI");
        style.font_size = 20.0;
        style.stroke_width = 0.0;
        style.bg_padding = 10.0;
        style.bg_color = Color::rgb(255, 0, 0);

        let out = compositor().compose(&gray(200, 100), 1.0, &style, FilterTarget::Image).unwrap();
        let (l, r) = ink_columns(&out, GRAY).unwrap();
        // 24px of text, 10px padding each side
        assert!(r + 1 - l >= 44);
        let left_edge = out.get_pixel(l + 1, 50);
        assert!(left_edge[0] > left_edge[1]);
    }

    #[test]
    fn test_outline_is_stroke_colored_around_fill() {
        let mut style = StyleConfig::default().with_text("I");
        style.font_size = 20.0;
        style.stroke_width = 6.0;
        style.stroke_color = Color::rgb(0, 0, 255);
        style.fill_color = Color::rgb(255, 255, 0);

        // glyph box is x 94..106, y 42..56 on a 200x100 slide
        let out = compositor().compose(&gray(200, 100), 1.0, &style, FilterTarget::Image).unwrap();
        assert_eq!(*out.get_pixel(100, 49), Rgba([255, 255, 0, 255]));
        for (x, y) in [(92, 49), (107, 49), (100, 40), (100, 57)] {
            assert_eq!(*out.get_pixel(x, y), Rgba([0, 0, 255, 255]), "outline pixel ({x}, {y})");
        }
        assert_eq!(*out.get_pixel(88, 49), GRAY);
    }

    #[test]
    fn test_letter_spacing_widens_ink() {
        let mut style = StyleConfig::default().with_text("ABC");
        style.font_size = 10.0;
        style.stroke_color = Color::TRANSPARENT;

        let tight = compositor().compose(&gray(200, 60), 1.0, &style, FilterTarget::Image).unwrap();
        style.letter_spacing = 8.0;
        let loose = compositor().compose(&gray(200, 60), 1.0, &style, FilterTarget::Image).unwrap();

        let (tl, tr) = ink_columns(&tight, GRAY).unwrap();
        let (ll, lr) = ink_columns(&loose, GRAY).unwrap();
        let grown = (lr - ll) as f32 - (tr - tl) as f32;
        assert!((grown - 16.0).abs() <= 1.0, "ink grew by {grown}");
    }

    #[test]
    fn test_shadow_is_offset_by_scaled_distance() {
        let mut style = StyleConfig::default().with_text("I");
        style.font_size = 20.0;
        style.stroke_color = Color::TRANSPARENT;
        style.fill_color = Color::rgb(255, 255, 255);
        style.shadow_color = Color::rgb(0, 0, 255);
        style.shadow_offset_x = 10.0;
        style.shadow_offset_y = 8.0;

        // at 2x the glyph covers x 188..212, y 84..112; its shadow moves by (20, 16)
        let out = compositor().compose(&gray(200, 100), 2.0, &style, FilterTarget::Image).unwrap();
        assert_eq!(*out.get_pixel(200, 95), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(225, 120), Rgba([0, 0, 255, 255]));
        assert_eq!(*out.get_pixel(205, 105), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(225, 95), GRAY);
        assert_eq!(*out.get_pixel(235, 120), GRAY);
    }

    #[test]
    fn test_filter_target_selects_layers() {
        let red = RgbaImage::from_pixel(100, 60, Rgba([200, 30, 30, 255]));
        let style = StyleConfig::default().with_text("X").with_filter(FilterPreset::Bw);

        let text_only = compositor().compose(&red, 1.0, &style, FilterTarget::Text).unwrap();
        assert_eq!(*text_only.get_pixel(2, 2), Rgba([200, 30, 30, 255]));

        let image_too = compositor().compose(&red, 1.0, &style, FilterTarget::Image).unwrap();
        let p = image_too.get_pixel(2, 2);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
    }

    #[test]
    fn test_quarter_turn_rotates_image() {
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        image.put_pixel(3, 0, Rgba([255, 0, 0, 255]));
        let mut style = StyleConfig::default();
        style.rotate_quarter(1);

        let out = compositor().compose(&image, 1.0, &style, FilterTarget::Image).unwrap();
        assert_eq!(out.get_pixel(3, 3)[0], 255);
        assert_eq!(out.get_pixel(3, 0)[2], 255);
    }
}
