//! `SlideKit` - Caption compositor for image slides
//!
//! # Features
//!
//! - **Compositor**: Straight or arc-curved captions with stroke, shadow and background box
//! - **Filters**: Named CSS-style presets applied to the image, the text or both
//! - **Session**: Slide list, filter toggle, 4K enhance with undo, PNG export
//! - **Studio client**: Typed access to the caption studio HTTP API
//! - **Orders**: PayPal order creation and capture with edition limits
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use slidekit::{Compositor, SlideSession};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut session = SlideSession::new(Arc::new(Compositor::with_system_fonts()));
//!     let slide = session.push_slide("ME EXPLAINING THE BUG");
//!     session.set_image(slide, image::open("cat.jpg")?.to_rgba8())?;
//!     if let Some(exported) = session.export(2)? {
//!         std::fs::write(&exported.file_name, &exported.png)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod compositor;
pub mod config;
pub mod dataurl;
pub mod filter;
pub mod orders;
pub mod session;
pub mod studio;
pub mod style;
pub mod upscale;

pub use compositor::{Compositor, CompositorError, FontLibrary};
pub use config::Config;
pub use filter::{FilterPreset, FilterTarget};
pub use orders::{OrderError, OrderService, Reply};
pub use session::{display_scale, RedrawThrottle, SessionError, SlideSession};
pub use studio::{StudioClient, StudioError};
pub use style::{Color, StyleConfig, StyleError};
pub use upscale::{LocalUpscaler, Upscaler};

/// Version of slidekit
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
