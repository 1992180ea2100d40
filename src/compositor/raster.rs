//! Drawing on tiny-skia pixmaps
//!
//! Shapes are painted the way a 2D canvas paints them: anti-aliased, with an
//! optional blurred shadow cast before the shape itself. Pixmaps hold
//! premultiplied RGBA, so conversions to and from [`RgbaImage`] go through
//! premultiply/demultiply.

use std::f32::consts::{FRAC_PI_2, TAU};

use image::{ImageBuffer, Rgba, RgbaImage};
use tiny_skia::{
    ColorU8, FillRule, FilterQuality, IntSize, LineJoin, Paint, Path, Pixmap, PixmapPaint, Stroke, Transform,
};

use crate::style::Color;

/// Canvas-style drop shadow in device pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Color,
    /// Gaussian sigma (half the CSS blur radius)
    pub sigma: f32,
    pub dx: f32,
    pub dy: f32,
}

/// How a path is painted
#[derive(Debug, Clone)]
pub enum Brush {
    Fill,
    /// Outline of the given width with round joins
    Stroke(f32),
}

impl Brush {
    fn stroke(width: f32) -> Stroke {
        Stroke {
            width,
            line_join: LineJoin::Round,
            ..Stroke::default()
        }
    }

    fn draw(&self, pixmap: &mut Pixmap, path: &Path, paint: &Paint<'_>, transform: Transform) {
        match *self {
            Self::Fill => pixmap.fill_path(path, paint, FillRule::Winding, transform, None),
            Self::Stroke(width) => pixmap.stroke_path(path, paint, &Self::stroke(width), transform, None),
        }
    }

    /// How far paint can reach outside the path's bounds
    fn reach(&self) -> f32 {
        match *self {
            Self::Fill => 0.0,
            Self::Stroke(width) => width / 2.0,
        }
    }
}

/// Solid anti-aliased paint with `alpha` applied on top of the color's own
#[must_use]
pub fn solid(color: Color, alpha: f32) -> Paint<'static> {
    let a = (f32::from(color.a) * alpha.clamp(0.0, 1.0)).round() as u8;
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, a);
    paint.anti_alias = true;
    paint
}

/// Paint `path` onto `pixmap`, casting `shadow` first when present
pub fn draw_path(
    pixmap: &mut Pixmap,
    path: &Path,
    brush: &Brush,
    transform: Transform,
    color: Color,
    alpha: f32,
    shadow: Option<&Shadow>,
) {
    if let Some(shadow) = shadow {
        cast_shadow(pixmap, path, brush, transform, shadow, alpha * color.alpha());
    }
    brush.draw(pixmap, path, &solid(color, alpha), transform);
}

/// Draw the shape in the shadow color on a scratch pixmap around its bounds,
/// blur it and composite it at the shadow offset.
fn cast_shadow(pixmap: &mut Pixmap, path: &Path, brush: &Brush, transform: Transform, shadow: &Shadow, alpha: f32) {
    let Some(device) = path.clone().transform(transform) else {
        return;
    };
    let bounds = device.bounds();
    let pad = brush.reach() + shadow.sigma * 3.0 + 2.0;
    let x0 = (bounds.left() - pad).floor();
    let y0 = (bounds.top() - pad).floor();
    let w = (bounds.right() + pad).ceil() - x0;
    let h = (bounds.bottom() + pad).ceil() - y0;
    let Some(mut scratch) = Pixmap::new(w as u32, h as u32) else {
        return;
    };

    brush.draw(
        &mut scratch,
        path,
        &solid(shadow.color, alpha),
        transform.post_translate(-x0, -y0),
    );
    let Some(blurred) = blur(scratch, shadow.sigma) else {
        return;
    };
    pixmap.draw_pixmap(
        (x0 + shadow.dx).round() as i32,
        (y0 + shadow.dy).round() as i32,
        blurred.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

/// Gaussian blur of premultiplied pixels
fn blur(pixmap: Pixmap, sigma: f32) -> Option<Pixmap> {
    if sigma <= 0.0 {
        return Some(pixmap);
    }
    let size = IntSize::from_wh(pixmap.width(), pixmap.height())?;
    let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_raw(size.width(), size.height(), pixmap.take())?;
    let mut blurred = image::imageops::blur(&buffer, sigma);
    // channels rounded independently may overshoot alpha by one
    for p in blurred.pixels_mut() {
        let a = p[3];
        for c in &mut p.0[..3] {
            *c = (*c).min(a);
        }
    }
    Pixmap::from_vec(blurred.into_raw(), size)
}

/// Premultiplied pixmap holding `image`
#[must_use]
pub fn to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Some(pixmap)
}

/// Straight-alpha copy of `pixmap`
#[must_use]
pub fn to_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    image
}

/// True when `angle` (radians) is a whole number of turns
#[must_use]
pub fn is_full_turn(angle: f32) -> bool {
    let r = angle.rem_euclid(TAU);
    r < 1e-4 || TAU - r < 1e-4
}

fn is_quarter_turn(angle: f32) -> bool {
    let r = angle.rem_euclid(FRAC_PI_2);
    r < 1e-4 || FRAC_PI_2 - r < 1e-4
}

/// Rotate `image` clockwise about its center onto a same-sized transparent canvas
#[must_use]
pub fn rotate_about_center(image: &RgbaImage, angle: f32) -> Option<RgbaImage> {
    let source = to_pixmap(image)?;
    let mut canvas = Pixmap::new(image.width(), image.height())?;
    // quarter turns land pixel centers on pixel centers
    let quality = if is_quarter_turn(angle) {
        FilterQuality::Nearest
    } else {
        FilterQuality::Bilinear
    };
    let paint = PixmapPaint {
        quality,
        ..PixmapPaint::default()
    };
    let transform = Transform::from_rotate_at(
        angle.to_degrees(),
        image.width() as f32 / 2.0,
        image.height() as f32 / 2.0,
    );
    canvas.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
    Some(to_image(&canvas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::{PathBuilder, Rect};

    fn square(x: f32, y: f32, side: f32) -> Path {
        PathBuilder::from_rect(Rect::from_xywh(x, y, side, side).unwrap())
    }

    #[test]
    fn test_pixmap_conversion_keeps_straight_alpha() {
        let image = RgbaImage::from_pixel(3, 2, Rgba([200, 100, 50, 128]));
        let back = to_image(&to_pixmap(&image).unwrap());
        for p in back.pixels() {
            assert_eq!(p[3], 128);
            assert!((i16::from(p[0]) - 200).abs() <= 2);
            assert!((i16::from(p[2]) - 50).abs() <= 2);
        }
    }

    #[test]
    fn test_fill_covers_rect_interior_only() {
        let mut pixmap = Pixmap::new(20, 20).unwrap();
        draw_path(
            &mut pixmap,
            &square(5.0, 5.0, 10.0),
            &Brush::Fill,
            Transform::identity(),
            Color::rgb(255, 0, 0),
            1.0,
            None,
        );
        let image = to_image(&pixmap);
        assert_eq!(*image.get_pixel(10, 10), Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn test_stroke_reaches_half_width_outside() {
        let mut pixmap = Pixmap::new(30, 30).unwrap();
        draw_path(
            &mut pixmap,
            &square(10.0, 10.0, 10.0),
            &Brush::Stroke(6.0),
            Transform::identity(),
            Color::rgb(0, 0, 0),
            1.0,
            None,
        );
        let image = to_image(&pixmap);
        // 3px outside the left edge is inked, the center is not
        assert_eq!(image.get_pixel(8, 15)[3], 255);
        assert_eq!(image.get_pixel(15, 15)[3], 0);
        assert_eq!(image.get_pixel(5, 15)[3], 0);
    }

    #[test]
    fn test_low_coverage_shapes_still_stroke() {
        // a hairline sliver has well under half coverage but must get an outline
        let sliver = PathBuilder::from_rect(Rect::from_xywh(10.0, 5.0, 0.2, 20.0).unwrap());
        let mut pixmap = Pixmap::new(30, 30).unwrap();
        draw_path(
            &mut pixmap,
            &sliver,
            &Brush::Stroke(4.0),
            Transform::identity(),
            Color::rgb(0, 0, 0),
            1.0,
            None,
        );
        let image = to_image(&pixmap);
        assert!(image.get_pixel(9, 15)[3] > 200);
    }

    #[test]
    fn test_shadow_lands_at_offset() {
        let mut pixmap = Pixmap::new(40, 40).unwrap();
        let shadow = Shadow {
            color: Color::rgb(0, 0, 255),
            sigma: 0.0,
            dx: 15.0,
            dy: 10.0,
        };
        draw_path(
            &mut pixmap,
            &square(5.0, 5.0, 10.0),
            &Brush::Fill,
            Transform::identity(),
            Color::rgb(255, 0, 0),
            1.0,
            Some(&shadow),
        );
        let image = to_image(&pixmap);
        assert_eq!(*image.get_pixel(10, 10), Rgba([255, 0, 0, 255]));
        assert_eq!(*image.get_pixel(27, 22), Rgba([0, 0, 255, 255]));
        assert_eq!(image.get_pixel(35, 35)[3], 0);
    }

    #[test]
    fn test_blurred_shadow_spreads_past_shape() {
        let mut pixmap = Pixmap::new(60, 60).unwrap();
        let shadow = Shadow {
            color: Color::rgb(0, 0, 0),
            sigma: 3.0,
            dx: 0.0,
            dy: 0.0,
        };
        draw_path(
            &mut pixmap,
            &square(20.0, 20.0, 20.0),
            &Brush::Fill,
            Transform::identity(),
            Color::rgb(255, 255, 255),
            1.0,
            Some(&shadow),
        );
        let image = to_image(&pixmap);
        assert!(image.get_pixel(17, 30)[3] > 0);
        assert_eq!(image.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn test_turn_detection() {
        assert!(is_full_turn(0.0));
        assert!(is_full_turn(TAU));
        assert!(is_full_turn(-TAU));
        assert!(!is_full_turn(FRAC_PI_2));
        assert!(is_quarter_turn(3.0 * FRAC_PI_2));
        assert!(!is_quarter_turn(0.3));
    }

    #[test]
    fn test_half_turn_flips_corners() {
        let mut image = RgbaImage::from_pixel(4, 2, Rgba([0, 0, 255, 255]));
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let out = rotate_about_center(&image, std::f32::consts::PI).unwrap();
        assert_eq!(*out.get_pixel(3, 1), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
    }
}
