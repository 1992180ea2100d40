//! Slide editing session
//!
//! Holds the slides being edited, the shared caption style, the active
//! filter and the 4K undo slots, and renders previews and exports through
//! the [`Compositor`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compositor::{Compositor, CompositorError};
use crate::dataurl::{self, DataUrlError};
use crate::filter::{FilterPreset, FilterTarget};
use crate::style::StyleConfig;
use crate::upscale::{UpscaleError, Upscaler};

/// Widest the live preview is ever drawn
pub const MAX_PREVIEW_WIDTH: f32 = 650.0;
/// Share of the viewport the preview may use
const VIEWPORT_SHARE: f32 = 0.9;
/// Scale used for cloud saves
const CLOUD_EXPORT_SCALE: u32 = 2;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No slide at index {0}")]
    NoSlide(usize),

    #[error("Compositor error: {0}")]
    Compositor(#[from] CompositorError),

    #[error("Encode error: {0}")]
    Encode(#[from] DataUrlError),

    #[error("Enhance failed: {0}")]
    Upscale(#[from] UpscaleError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// One slide: its image (once loaded) and caption
#[derive(Debug, Clone, Default)]
pub struct Slide {
    pub image: Option<Arc<RgbaImage>>,
    pub caption: String,
}

/// A rendered PNG ready to be written or uploaded
#[derive(Debug, Clone)]
pub struct Exported {
    pub file_name: String,
    pub png: Vec<u8>,
}

/// Body of a gallery save request
#[derive(Debug, Clone, Serialize)]
pub struct GalleryUpload {
    pub gallery_id: String,
    pub filename: String,
    #[serde(rename = "dataUrl")]
    pub data_url: String,
}

/// Body of a cloud (Dropbox) save request
#[derive(Debug, Clone, Serialize)]
pub struct CloudUpload {
    pub filename: String,
    #[serde(rename = "dataUrl")]
    pub data_url: String,
}

/// Preview scale for an image `width` pixels wide in a `viewport`-wide window
#[must_use]
pub fn display_scale(width: u32, viewport: f32) -> f32 {
    if width == 0 {
        return 1.0;
    }
    let w = width as f32;
    w.min(MAX_PREVIEW_WIDTH).min(viewport * VIEWPORT_SHARE) / w
}

/// Slide editing session
pub struct SlideSession {
    compositor: Arc<Compositor>,
    slides: Vec<Slide>,
    current: usize,
    style: StyleConfig,
    filter_target: FilterTarget,
    originals: HashMap<usize, Arc<RgbaImage>>,
    gallery_id: String,
}

impl SlideSession {
    #[must_use]
    pub fn new(compositor: Arc<Compositor>) -> Self {
        Self {
            compositor,
            slides: Vec::new(),
            current: 0,
            style: StyleConfig::default(),
            filter_target: FilterTarget::default(),
            originals: HashMap::new(),
            gallery_id: new_gallery_id(),
        }
    }

    /// Append a slide whose image is still loading; returns its index
    pub fn push_slide(&mut self, caption: impl Into<String>) -> usize {
        self.slides.push(Slide {
            image: None,
            caption: caption.into(),
        });
        self.slides.len() - 1
    }

    /// Attach a loaded image to a slide
    pub fn set_image(&mut self, index: usize, image: RgbaImage) -> Result<()> {
        self.slide_mut(index)?.image = Some(Arc::new(image));
        Ok(())
    }

    pub fn set_caption(&mut self, index: usize, caption: impl Into<String>) -> Result<()> {
        self.slide_mut(index)?.caption = caption.into();
        Ok(())
    }

    #[must_use]
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slide(&self, index: usize) -> Result<&Slide> {
        self.slides.get(index).ok_or(SessionError::NoSlide(index))
    }

    fn slide_mut(&mut self, index: usize) -> Result<&mut Slide> {
        self.slides.get_mut(index).ok_or(SessionError::NoSlide(index))
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Make another slide current
    pub fn select(&mut self, index: usize) -> Result<()> {
        self.slide(index)?;
        self.current = index;
        Ok(())
    }

    #[must_use]
    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut StyleConfig {
        &mut self.style
    }

    #[must_use]
    pub fn gallery_id(&self) -> &str {
        &self.gallery_id
    }

    #[must_use]
    pub fn active_filter(&self) -> FilterPreset {
        self.style.filter
    }

    /// Select a preset; selecting the active one again clears it
    pub fn toggle_filter(&mut self, preset: FilterPreset) {
        self.style.filter = if self.style.filter == preset {
            FilterPreset::None
        } else {
            preset
        };
        debug!(filter = %self.style.filter, "Filter toggled");
    }

    pub fn set_filter(&mut self, preset: FilterPreset) {
        self.style.filter = preset;
    }

    #[must_use]
    pub fn filter_target(&self) -> FilterTarget {
        self.filter_target
    }

    pub fn set_filter_target(&mut self, target: FilterTarget) {
        self.filter_target = target;
    }

    /// Replace a slide's image with an upscaled copy, keeping the image it
    /// replaced for undo.
    ///
    /// Returns `false` when the slide has no image yet. On error the slide
    /// is left untouched.
    pub async fn enhance_4k(&mut self, index: usize, upscaler: &dyn Upscaler) -> Result<bool> {
        let Some(base) = self.slide(index)?.image.clone() else {
            return Ok(false);
        };

        let enhanced = match upscaler.upscale(&base).await {
            Ok(image) => image,
            Err(e) => {
                warn!(index, error = %e, "4K enhance failed");
                return Err(e.into());
            }
        };
        info!(index, from = ?base.dimensions(), to = ?enhanced.dimensions(), "Enhanced slide");

        self.originals.insert(index, Arc::clone(&base));
        self.slide_mut(index)?.image = Some(Arc::new(enhanced));
        Ok(true)
    }

    /// True when a slide has a pre-enhancement image to go back to
    #[must_use]
    pub fn can_undo(&self, index: usize) -> bool {
        self.originals.contains_key(&index)
    }

    /// Restore the pre-enhancement image (if any) and clear the active filter
    pub fn undo_filter(&mut self, index: usize) -> Result<()> {
        if let Some(original) = self.originals.remove(&index) {
            self.slide_mut(index)?.image = Some(original);
        }
        self.style.filter = FilterPreset::None;
        Ok(())
    }

    /// Style for rendering a slide (its caption as the text)
    fn style_for(&self, slide: &Slide) -> StyleConfig {
        let mut style = self.style.clone();
        style.text.clone_from(&slide.caption);
        style
    }

    fn ready(&self) -> Option<(&Slide, &Arc<RgbaImage>)> {
        let slide = self.slides.get(self.current)?;
        slide.image.as_ref().map(|image| (slide, image))
    }

    fn render(&self, scale: f32) -> Result<Option<RgbaImage>> {
        let Some((slide, image)) = self.ready() else {
            return Ok(None);
        };
        let style = self.style_for(slide);
        Ok(Some(self.compositor.compose(image, scale, &style, self.filter_target)?))
    }

    /// Current slide at display scale for a `viewport`-wide window
    pub fn render_preview(&self, viewport: f32) -> Result<Option<RgbaImage>> {
        let Some((_, image)) = self.ready() else {
            return Ok(None);
        };
        self.render(display_scale(image.width(), viewport))
    }

    /// Current slide fitted and centered in a `box_w` x `box_h` thumbnail
    pub fn render_thumbnail(&self, box_w: u32, box_h: u32) -> Result<Option<RgbaImage>> {
        let Some((slide, image)) = self.ready() else {
            return Ok(None);
        };
        let scale = (box_w as f32 / image.width() as f32).min(box_h as f32 / image.height() as f32);
        let (w, h) = Compositor::surface_size(image, scale);
        let at = (
            (i64::from(box_w) - i64::from(w)) / 2,
            (i64::from(box_h) - i64::from(h)) / 2,
        );

        let mut surface = RgbaImage::new(box_w, box_h);
        let style = self.style_for(slide);
        self.compositor
            .compose_into(&mut surface, at, image, scale, &style, self.filter_target)?;
        Ok(Some(surface))
    }

    /// Current slide as PNG at an integer scale
    pub fn export(&self, scale: u32) -> Result<Option<Exported>> {
        let Some(surface) = self.render(scale as f32)? else {
            return Ok(None);
        };
        let file_name = format!("slide_{}@{}x.png", self.current + 1, scale);
        info!(file = %file_name, w = surface.width(), h = surface.height(), "Exported slide");
        Ok(Some(Exported {
            file_name,
            png: dataurl::png_bytes(&surface)?,
        }))
    }

    /// Current slide at full resolution, addressed to this session's gallery
    pub fn export_gallery(&self) -> Result<Option<GalleryUpload>> {
        let Some(surface) = self.render(1.0)? else {
            return Ok(None);
        };
        let millis = chrono::Utc::now().timestamp_millis();
        Ok(Some(GalleryUpload {
            gallery_id: self.gallery_id.clone(),
            filename: format!("slide_{}_{millis}.png", self.current + 1),
            data_url: dataurl::encode_png(&surface)?,
        }))
    }

    /// Current slide at 2x for cloud storage
    pub fn export_cloud(&self) -> Result<Option<CloudUpload>> {
        let Some(surface) = self.render(CLOUD_EXPORT_SCALE as f32)? else {
            return Ok(None);
        };
        Ok(Some(CloudUpload {
            filename: format!("slide_{}.png", self.current + 1),
            data_url: dataurl::encode_png(&surface)?,
        }))
    }

    /// Start over: no slides, default style, no filter or undo state
    pub fn reset(&mut self) {
        self.slides.clear();
        self.current = 0;
        self.style = StyleConfig::default();
        self.filter_target = FilterTarget::default();
        self.originals.clear();
        debug!("Session reset");
    }
}

fn new_gallery_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("g{}", &id[..8])
}

/// Coalesces redraw requests to at most one per frame
#[derive(Debug, Clone)]
pub struct RedrawThrottle {
    interval: Duration,
    last: Option<Instant>,
    pending: bool,
}

impl Default for RedrawThrottle {
    fn default() -> Self {
        Self::new(Duration::from_micros(16_667))
    }
}

impl RedrawThrottle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            pending: false,
        }
    }

    /// Ask for a redraw; repeated requests before the next frame collapse
    pub fn request(&mut self) {
        self.pending = true;
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// True when a pending redraw should run now
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.pending {
            return false;
        }
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.pending = false;
        self.last = Some(now);
        true
    }
}
