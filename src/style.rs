//! Caption and image style configuration
//!
//! A [`StyleConfig`] is the flat bundle of presentation parameters the
//! compositor reads: font, fill/stroke, shadow, background box, spacing,
//! opacity, curve, offset, rotation and the active filter preset.
//!
//! Values are stored unscaled (in source-image pixels); the compositor
//! multiplies them by the render scale.

use std::fmt;
use std::str::FromStr;

use image::Rgba;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::FilterPreset;

/// Smallest font size reachable through the UI (pinch/zoom clamp).
pub const MIN_FONT_SIZE: f32 = 16.0;
/// Largest font size reachable through the UI.
pub const MAX_FONT_SIZE: f32 = 400.0;
/// Font size used when nothing else is configured.
pub const BASE_FONT_SIZE: f32 = 80.0;
/// Upper bound of the stroke width slider.
pub const MAX_STROKE_WIDTH: f32 = 50.0;
/// Curved captions never bend tighter than this radius.
pub const MIN_CURVE_RADIUS: f32 = 60.0;

/// Style parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StyleError {
    #[error("invalid color '{0}': expected #RGB, #RRGGBB or #RRGGBBAA")]
    InvalidColor(String),

    #[error("invalid font weight '{0}'")]
    InvalidWeight(String),
}

/// An sRGB color with straight alpha, written as a CSS hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const TRANSPARENT: Self = Self { r: 0, g: 0, b: 0, a: 0 };

    /// Opaque color from components
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    /// Alpha as a fraction in `0.0..=1.0`
    #[must_use]
    pub fn alpha(&self) -> f32 {
        f32::from(self.a) / 255.0
    }

    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Color channels as fractions in `0.0..=1.0`
    #[must_use]
    pub fn channels(&self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }

    #[must_use]
    pub fn to_rgba(&self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }
}

impl FromStr for Color {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StyleError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);

        let color = match hex.len() {
            3 => Self::rgb(nibble(0).map_err(|_| invalid())?, nibble(1).map_err(|_| invalid())?, nibble(2).map_err(|_| invalid())?),
            6 | 8 => {
                let mut color = Self::rgb(
                    byte(0).map_err(|_| invalid())?,
                    byte(2).map_err(|_| invalid())?,
                    byte(4).map_err(|_| invalid())?,
                );
                if hex.len() == 8 {
                    color.a = byte(6).map_err(|_| invalid())?;
                }
                color
            }
            _ => return Err(invalid()),
        };

        Ok(color)
    }
}

impl TryFrom<String> for Color {
    type Error = StyleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)?;
        if self.a != 0xFF {
            write!(f, "{:02X}", self.a)?;
        }
        Ok(())
    }
}

/// Two-dimensional caption offset from the image center
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: f32,
    pub y: f32,
}

/// Font weight as CSS would name it (`bold`, `normal`, `600`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const NORMAL: Self = Self(400);
    pub const BOLD: Self = Self(700);
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::BOLD
    }
}

impl FromStr for FontWeight {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "regular" => Ok(Self::NORMAL),
            "bold" => Ok(Self::BOLD),
            "lighter" | "light" => Ok(Self(300)),
            "bolder" => Ok(Self(900)),
            other => other
                .parse::<u16>()
                .ok()
                .filter(|w| (1..=1000).contains(w))
                .map(Self)
                .ok_or_else(|| StyleError::InvalidWeight(s.to_string())),
        }
    }
}

impl TryFrom<String> for FontWeight {
    type Error = StyleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FontWeight> for String {
    fn from(weight: FontWeight) -> Self {
        match weight {
            FontWeight::NORMAL => "normal".to_string(),
            FontWeight::BOLD => "bold".to_string(),
            FontWeight(w) => w.to_string(),
        }
    }
}

/// Style configuration for a caption and its image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleConfig {
    /// Caption text (empty draws the image only)
    pub text: String,
    /// Font family name, resolved against system fonts
    pub font_family: String,
    /// Font size in pixels
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub fill_color: Color,
    pub stroke_color: Color,
    /// Outline width in pixels
    pub stroke_width: f32,
    pub shadow_color: Color,
    pub shadow_blur: f32,
    pub shadow_offset_x: f32,
    pub shadow_offset_y: f32,
    /// Background box color (box is drawn only when padding > 0)
    pub bg_color: Color,
    pub bg_padding: f32,
    /// Extra space between characters in pixels
    pub letter_spacing: f32,
    /// Caption opacity (0.0 - 1.0)
    pub text_opacity: f32,
    /// Signed arc radius; 0 draws straight text
    pub curve_radius: f32,
    pub text_offset: Offset,
    /// Image rotation about its center, in radians
    pub rotation_angle: f32,
    /// Active filter preset
    pub filter: FilterPreset,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: "Inter".to_string(),
            font_size: BASE_FONT_SIZE,
            font_weight: FontWeight::BOLD,
            fill_color: Color::WHITE,
            stroke_color: Color::BLACK,
            stroke_width: 6.0,
            shadow_color: Color::BLACK,
            shadow_blur: 0.0,
            shadow_offset_x: 0.0,
            shadow_offset_y: 0.0,
            bg_color: Color::BLACK,
            bg_padding: 0.0,
            letter_spacing: 0.0,
            text_opacity: 1.0,
            curve_radius: 0.0,
            text_offset: Offset::default(),
            rotation_angle: 0.0,
            filter: FilterPreset::None,
        }
    }
}

impl StyleConfig {
    /// Set caption text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the active filter preset
    #[must_use]
    pub fn with_filter(mut self, filter: FilterPreset) -> Self {
        self.filter = filter;
        self
    }

    /// Bring every field into its valid range
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.font_size = finite_or(self.font_size, BASE_FONT_SIZE).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        self.stroke_width = finite_or(self.stroke_width, 0.0).clamp(0.0, MAX_STROKE_WIDTH);
        self.shadow_blur = finite_or(self.shadow_blur, 0.0).max(0.0);
        self.shadow_offset_x = finite_or(self.shadow_offset_x, 0.0);
        self.shadow_offset_y = finite_or(self.shadow_offset_y, 0.0);
        self.bg_padding = finite_or(self.bg_padding, 0.0).max(0.0);
        self.letter_spacing = finite_or(self.letter_spacing, 0.0);
        self.text_opacity = finite_or(self.text_opacity, 1.0).clamp(0.0, 1.0);
        self.curve_radius = clamp_curve_radius(finite_or(self.curve_radius, 0.0));
        self.text_offset.x = finite_or(self.text_offset.x, 0.0);
        self.text_offset.y = finite_or(self.text_offset.y, 0.0);
        self.rotation_angle = finite_or(self.rotation_angle, 0.0);
        self
    }

    /// True when captions follow an arc instead of a straight baseline
    #[must_use]
    pub fn is_curved(&self) -> bool {
        self.curve_radius != 0.0
    }

    /// Rotate the image by a quarter turn (clockwise for positive `turns`)
    pub fn rotate_quarter(&mut self, turns: i32) {
        self.rotation_angle += turns as f32 * std::f32::consts::FRAC_PI_2;
    }

    /// Move the caption by a delta expressed in image pixels
    pub fn nudge(&mut self, dx: f32, dy: f32) {
        self.text_offset.x += dx;
        self.text_offset.y += dy;
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Snap a radius to 0 or push it out to at least [`MIN_CURVE_RADIUS`]
#[must_use]
pub fn clamp_curve_radius(radius: f32) -> f32 {
    if radius == 0.0 {
        0.0
    } else if radius > 0.0 {
        radius.max(MIN_CURVE_RADIUS)
    } else {
        radius.min(-MIN_CURVE_RADIUS)
    }
}

/// Map the curve slider value to an arc radius.
///
/// The slider is non-linear (`|raw|^1.5 / 5`) so small movements near the
/// center still produce gentle arcs.
#[must_use]
pub fn curve_radius_from_slider(raw: f32) -> f32 {
    let sign = if raw >= 0.0 { 1.0 } else { -1.0 };
    clamp_curve_radius(sign * raw.abs().powf(1.5) / 5.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!("#FFFFFF".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!("#000".parse::<Color>().unwrap(), Color::BLACK);
        assert_eq!("#f80".parse::<Color>().unwrap(), Color::rgb(0xFF, 0x88, 0x00));

        let translucent: Color = "#11223380".parse().unwrap();
        assert_eq!(translucent.a, 0x80);
        assert_eq!(translucent.to_string(), "#11223380");
    }

    #[test]
    fn test_parse_invalid_colors() {
        assert!("FFFFFF".parse::<Color>().is_err());
        assert!("#GGGGGG".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
    }

    #[test]
    fn test_font_weight_names() {
        assert_eq!("bold".parse::<FontWeight>().unwrap(), FontWeight::BOLD);
        assert_eq!("Normal".parse::<FontWeight>().unwrap(), FontWeight::NORMAL);
        assert_eq!("600".parse::<FontWeight>().unwrap(), FontWeight(600));
        assert!("heavy-ish".parse::<FontWeight>().is_err());
    }

    #[test]
    fn test_default_style_matches_editor() {
        let style = StyleConfig::default();
        assert_eq!(style.font_family, "Inter");
        assert!((style.font_size - 80.0).abs() < f32::EPSILON);
        assert!((style.stroke_width - 6.0).abs() < f32::EPSILON);
        assert_eq!(style.filter, FilterPreset::None);
        assert!(!style.is_curved());
    }

    #[test]
    fn test_clamped_ranges() {
        let style = StyleConfig {
            font_size: 2.0,
            stroke_width: -4.0,
            text_opacity: 3.0,
            curve_radius: 12.0,
            bg_padding: -1.0,
            ..StyleConfig::default()
        }
        .clamped();

        assert!((style.font_size - MIN_FONT_SIZE).abs() < f32::EPSILON);
        assert!(style.stroke_width.abs() < f32::EPSILON);
        assert!((style.text_opacity - 1.0).abs() < f32::EPSILON);
        assert!((style.curve_radius - MIN_CURVE_RADIUS).abs() < f32::EPSILON);
        assert!(style.bg_padding.abs() < f32::EPSILON);
    }

    #[test]
    fn test_curve_radius_stays_zero_or_above_minimum() {
        assert!(clamp_curve_radius(0.0).abs() < f32::EPSILON);
        assert!((clamp_curve_radius(-5.0) + MIN_CURVE_RADIUS).abs() < f32::EPSILON);
        assert!((clamp_curve_radius(300.0) - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_curve_slider_mapping() {
        assert!(curve_radius_from_slider(0.0).abs() < f32::EPSILON);
        // 100^1.5 / 5 = 200
        assert!((curve_radius_from_slider(100.0) - 200.0).abs() < 1e-3);
        assert!((curve_radius_from_slider(-100.0) + 200.0).abs() < 1e-3);
        // 4^1.5 / 5 = 1.6, pushed out to the minimum radius
        assert!((curve_radius_from_slider(4.0) - MIN_CURVE_RADIUS).abs() < f32::EPSILON);
    }

    #[test]
    fn test_style_json_round_trip_uses_camel_case() {
        let style = StyleConfig::default().with_text("hello");
        let json = serde_json::to_value(&style).unwrap();
        assert_eq!(json["fontFamily"], "Inter");
        assert_eq!(json["fillColor"], "#FFFFFF");
        assert_eq!(json["fontWeight"], "bold");
        assert_eq!(json["filter"], "none");

        let parsed: StyleConfig = serde_json::from_str(r##"{"text":"hi","curveRadius":-120,"filter":"vivid","strokeColor":"#f00"}"##).unwrap();
        assert_eq!(parsed.text, "hi");
        assert!((parsed.curve_radius + 120.0).abs() < f32::EPSILON);
        assert_eq!(parsed.filter, FilterPreset::Vivid);
        assert_eq!(parsed.stroke_color, Color::rgb(0xFF, 0, 0));
        // unspecified fields keep their defaults
        assert_eq!(parsed.font_family, "Inter");
    }

    #[test]
    fn test_rotate_quarter_turns() {
        let mut style = StyleConfig::default();
        style.rotate_quarter(1);
        style.rotate_quarter(1);
        assert!((style.rotation_angle - std::f32::consts::PI).abs() < 1e-6);
        style.rotate_quarter(-2);
        assert!(style.rotation_angle.abs() < 1e-6);
    }
}
