//! Caption layout
//!
//! Pure placement math for straight and arc captions. Nothing here touches
//! pixels; the compositor turns placements into glyph transforms.

use tiny_skia::Transform;

use super::font::FontFace;

/// Width of `text` on a single line, kerning included
#[must_use]
pub fn measure(face: &dyn FontFace, text: &str, px: f32) -> f32 {
    let mut width = 0.0;
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        if let Some(p) = prev {
            width += face.kerning(p, ch, px);
        }
        width += face.advance(ch, px);
        prev = Some(ch);
    }
    width
}

/// Highest ink above and deepest ink below the baseline over all glyphs
#[must_use]
pub fn ink_height(face: &dyn FontFace, text: &str, px: f32) -> (f32, f32) {
    text.chars().fold((0.0f32, 0.0f32), |(above, below), ch| {
        let ink = face.ink_extent(ch, px);
        (above.max(ink.above), below.max(ink.below))
    })
}

/// A glyph on a straight baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedGlyph {
    pub ch: char,
    /// Pen position (left edge of the advance box)
    pub x: f32,
    pub advance: f32,
}

/// A caption laid out on one horizontal baseline, centered on a point
#[derive(Debug, Clone, PartialEq)]
pub struct LineLayout {
    pub left: f32,
    /// Measured width plus spacing between characters
    pub width: f32,
    pub baseline: f32,
    pub glyphs: Vec<PlacedGlyph>,
}

impl LineLayout {
    #[must_use]
    pub fn center_x(&self) -> f32 {
        self.left + self.width / 2.0
    }
}

/// Lay `text` out horizontally centered on `center`, vertically on the em box.
///
/// With zero spacing glyphs follow kerned advances. Any other spacing places
/// each character by its own advance plus `spacing`.
#[must_use]
pub fn layout_straight(face: &dyn FontFace, text: &str, px: f32, spacing: f32, center: (f32, f32)) -> LineLayout {
    let chars: Vec<char> = text.chars().collect();
    let gaps = chars.len().saturating_sub(1) as f32;
    let width = measure(face, text, px) + spacing * gaps;
    let left = center.0 - width / 2.0;
    let baseline = center.1 + face.vertical_metrics(px).middle_to_baseline();

    let mut glyphs = Vec::with_capacity(chars.len());
    let mut x = left;
    for (i, &ch) in chars.iter().enumerate() {
        let advance = face.advance(ch, px);
        glyphs.push(PlacedGlyph { ch, x, advance });
        x += advance;
        if spacing == 0.0 {
            if let Some(&next) = chars.get(i + 1) {
                x += face.kerning(ch, next, px);
            }
        } else {
            x += spacing;
        }
    }

    LineLayout {
        left,
        width,
        baseline,
        glyphs,
    }
}

/// A glyph on a circular arc
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcGlyph {
    pub ch: char,
    /// Glyph advance without spacing (used to center it on its slot)
    pub advance: f32,
    /// Angle this glyph's slot covers (`slot_width / radius`)
    pub sweep: f32,
    /// Rotation of the glyph's center line, radians clockwise from up
    pub angle: f32,
}

/// A caption laid out along a circle around `center`
#[derive(Debug, Clone, PartialEq)]
pub struct ArcLayout {
    pub center: (f32, f32),
    pub radius: f32,
    pub total_angle: f32,
    pub start_angle: f32,
    /// Distance from the em-box middle down to the baseline
    pub baseline_shift: f32,
    pub glyphs: Vec<ArcGlyph>,
}

impl ArcLayout {
    /// Map glyph-local coordinates (pen at origin, baseline at y = 0) to the surface
    #[must_use]
    pub fn transform(&self, glyph: &ArcGlyph) -> Transform {
        Transform::from_translate(self.center.0, self.center.1)
            .pre_concat(Transform::from_rotate(glyph.angle.to_degrees()))
            .pre_concat(Transform::from_translate(
                -glyph.advance / 2.0,
                -self.radius + self.baseline_shift,
            ))
    }
}

/// Distribute `text` along an arc of `radius` centered on `center`.
///
/// Every slot but the last is the glyph advance plus `spacing`. The caption
/// is centered on the top of the circle (bottom for negative radii).
#[must_use]
pub fn layout_arc(face: &dyn FontFace, text: &str, px: f32, spacing: f32, radius: f32, center: (f32, f32)) -> ArcLayout {
    let chars: Vec<char> = text.chars().collect();
    let baseline_shift = face.vertical_metrics(px).middle_to_baseline();

    if radius == 0.0 || chars.is_empty() {
        return ArcLayout {
            center,
            radius,
            total_angle: 0.0,
            start_angle: 0.0,
            baseline_shift,
            glyphs: Vec::new(),
        };
    }

    let slots: Vec<(char, f32, f32)> = chars
        .iter()
        .enumerate()
        .map(|(i, &ch)| {
            let advance = face.advance(ch, px);
            let slot = if i + 1 < chars.len() { advance + spacing } else { advance };
            (ch, advance, slot)
        })
        .collect();
    let total: f32 = slots.iter().map(|s| s.2).sum();
    let total_angle = total / radius;
    let start_angle = -total_angle / 2.0;

    let mut angle = start_angle;
    let glyphs = slots
        .into_iter()
        .map(|(ch, advance, slot)| {
            let sweep = slot / radius;
            let glyph = ArcGlyph {
                ch,
                advance,
                sweep,
                angle: angle + sweep / 2.0,
            };
            angle += sweep;
            glyph
        })
        .collect();

    ArcLayout {
        center,
        radius,
        total_angle,
        start_angle,
        baseline_shift,
        glyphs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::font::BlockFace;

    #[test]
    fn test_measure_sums_advances() {
        assert!((measure(&BlockFace, "abcd", 10.0) - 24.0).abs() < 1e-4);
        assert!(measure(&BlockFace, "", 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_straight_layout_is_centered() {
        let line = layout_straight(&BlockFace, "HELLO", 20.0, 0.0, (150.0, 40.0));
        assert!((line.center_x() - 150.0).abs() < 1e-4);
        assert!((line.width - 60.0).abs() < 1e-4);
        // middle baseline: (0.8 - 0.2) / 2 * 20
        assert!((line.baseline - 46.0).abs() < 1e-4);
        assert_eq!(line.glyphs.len(), 5);
        assert!((line.glyphs[0].x - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_letter_spacing_widens_line() {
        let line = layout_straight(&BlockFace, "abc", 10.0, 5.0, (0.0, 0.0));
        assert!((line.width - 28.0).abs() < 1e-4);
        assert!((line.left + 14.0).abs() < 1e-4);
        let xs: Vec<f32> = line.glyphs.iter().map(|g| g.x).collect();
        assert!((xs[1] - xs[0] - 11.0).abs() < 1e-4);
        assert!((xs[2] - xs[1] - 11.0).abs() < 1e-4);
    }

    #[test]
    fn test_arc_angles_sum_to_total() {
        let arc = layout_arc(&BlockFace, "CURVED", 30.0, 4.0, 200.0, (100.0, 100.0));
        let total_advance = 6.0 * 18.0 + 5.0 * 4.0;
        assert!((arc.total_angle - total_advance / 200.0).abs() < 1e-5);

        let swept: f32 = arc.glyphs.iter().map(|g| g.sweep).sum();
        assert!((swept - arc.total_angle).abs() < 1e-5);
        assert!((arc.start_angle + arc.total_angle / 2.0).abs() < 1e-6);

        let first = arc.glyphs[0];
        assert!((first.angle - (arc.start_angle + first.sweep / 2.0)).abs() < 1e-6);
    }

    #[test]
    fn test_arc_is_symmetric_about_center() {
        let arc = layout_arc(&BlockFace, "ABC", 20.0, 0.0, 120.0, (0.0, 0.0));
        let first = arc.glyphs[0].angle;
        let last = arc.glyphs[2].angle;
        assert!((first + last).abs() < 1e-6);
        assert!(arc.glyphs[1].angle.abs() < 1e-6);
    }

    fn map(ts: Transform, x: f32, y: f32) -> (f32, f32) {
        let mut p = tiny_skia::Point::from_xy(x, y);
        ts.map_point(&mut p);
        (p.x, p.y)
    }

    #[test]
    fn test_negative_radius_flips_below_center() {
        let arc = layout_arc(&BlockFace, "A", 20.0, 0.0, -100.0, (50.0, 50.0));
        let glyph = arc.glyphs[0];
        let (_, y) = map(arc.transform(&glyph), glyph.advance / 2.0, 0.0);
        assert!(y > 50.0);

        let up = layout_arc(&BlockFace, "A", 20.0, 0.0, 100.0, (50.0, 50.0));
        let glyph = up.glyphs[0];
        let (x, y) = map(up.transform(&glyph), glyph.advance / 2.0, 0.0);
        assert!((x - 50.0).abs() < 1e-3);
        assert!(y < 50.0);
    }

    #[test]
    fn test_empty_arc_has_no_glyphs() {
        let arc = layout_arc(&BlockFace, "", 20.0, 0.0, 100.0, (0.0, 0.0));
        assert!(arc.glyphs.is_empty());
        assert!(arc.total_angle.abs() < f32::EPSILON);
    }
}
