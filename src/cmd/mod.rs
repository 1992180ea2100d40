mod filters;
mod order;
mod render;
mod studio;
mod upscale;

pub use filters::cmd_filters;
pub use order::{cmd_order_capture, cmd_order_create};
pub use render::{cmd_render, RenderArgs};
pub use studio::{cmd_caption, cmd_corpora, cmd_images};
pub use upscale::cmd_upscale;
