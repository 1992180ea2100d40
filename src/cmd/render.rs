use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use slidekit::style::{curve_radius_from_slider, Offset};
use slidekit::{Color, Compositor, Config, FilterPreset, FilterTarget, LocalUpscaler, SlideSession, StyleConfig};

/// Layers the filter applies to
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TargetArg {
    Image,
    Text,
    Both,
}

impl From<TargetArg> for FilterTarget {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Image => Self::Image,
            TargetArg::Text => Self::Text,
            TargetArg::Both => Self::Both,
        }
    }
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Source image (PNG, JPEG or WebP)
    pub image: PathBuf,

    /// Caption text
    #[arg(short, long)]
    pub text: Option<String>,

    /// Style file (TOML or JSON)
    #[arg(short, long)]
    pub style: Option<PathBuf>,

    /// Export scale factor
    #[arg(long, default_value = "2")]
    pub scale: u32,

    /// Output file (default: slide_1@{scale}x.png)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Filter preset name
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Which layers the filter applies to
    #[arg(long, value_enum, default_value = "image")]
    pub filter_target: TargetArg,

    #[arg(long)]
    pub font: Option<String>,

    #[arg(long)]
    pub font_size: Option<f32>,

    #[arg(long)]
    pub fill: Option<Color>,

    #[arg(long)]
    pub stroke: Option<Color>,

    #[arg(long)]
    pub stroke_width: Option<f32>,

    #[arg(long)]
    pub letter_spacing: Option<f32>,

    /// Curve slider value (maps to an arc radius, 0 for straight text)
    #[arg(long, allow_hyphen_values = true)]
    pub curve: Option<f32>,

    /// Caption offset from center, in image pixels
    #[arg(long, allow_hyphen_values = true)]
    pub offset_x: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    pub offset_y: Option<f32>,

    /// Quarter turns of the image (negative turns left)
    #[arg(long, allow_hyphen_values = true, default_value = "0")]
    pub rotate: i32,

    /// Upscale to 4K before rendering
    #[arg(long)]
    pub enhance: bool,
}

impl RenderArgs {
    /// Style from the style file with command-line overrides applied
    fn style(&self) -> Result<StyleConfig> {
        let mut style = match &self.style {
            Some(path) => load_style(path)?,
            None => StyleConfig::default(),
        };

        if let Some(font) = &self.font {
            style.font_family.clone_from(font);
        }
        if let Some(size) = self.font_size {
            style.font_size = size;
        }
        if let Some(fill) = self.fill {
            style.fill_color = fill;
        }
        if let Some(stroke) = self.stroke {
            style.stroke_color = stroke;
        }
        if let Some(width) = self.stroke_width {
            style.stroke_width = width;
        }
        if let Some(spacing) = self.letter_spacing {
            style.letter_spacing = spacing;
        }
        if let Some(raw) = self.curve {
            style.curve_radius = curve_radius_from_slider(raw);
        }
        if self.offset_x.is_some() || self.offset_y.is_some() {
            style.text_offset = Offset {
                x: self.offset_x.unwrap_or(style.text_offset.x),
                y: self.offset_y.unwrap_or(style.text_offset.y),
            };
        }
        if let Some(name) = &self.filter {
            style.filter = FilterPreset::from_name(name);
        }
        style.rotate_quarter(self.rotate);

        Ok(style.clamped())
    }
}

/// Load a style file; `.json` is parsed as JSON, anything else as TOML
pub fn load_style(path: &Path) -> Result<StyleConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
    } else {
        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }
}

pub async fn cmd_render(args: &RenderArgs, config: &Config) -> Result<()> {
    let style = args.style()?;
    let image = image::open(&args.image)
        .with_context(|| format!("failed to open {}", args.image.display()))?
        .to_rgba8();

    let fonts = config.fonts.library()?;
    let mut session = SlideSession::new(Arc::new(Compositor::new(Arc::new(fonts))));
    let caption = args.text.clone().unwrap_or_else(|| style.text.clone());
    let slide = session.push_slide(caption);
    session.set_image(slide, image)?;
    *session.style_mut() = style;
    session.set_filter_target(args.filter_target.into());

    if args.enhance {
        session.enhance_4k(slide, &LocalUpscaler::default()).await?;
    }

    let exported = session
        .export(args.scale)?
        .context("slide has no image")?;
    let out = args.out.clone().unwrap_or_else(|| PathBuf::from(&exported.file_name));
    std::fs::write(&out, &exported.png).with_context(|| format!("failed to write {}", out.display()))?;

    println!("🖼️  Wrote {} ({} bytes)", out.display(), exported.png.len());
    Ok(())
}
