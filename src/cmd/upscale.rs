use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use slidekit::upscale::TARGET_LONG_EDGE;
use slidekit::{LocalUpscaler, StudioClient, Upscaler};

/// Upscale an image locally, or on the studio server when `remote` is given
pub async fn cmd_upscale(input: &Path, out: &Path, remote: Option<&StudioClient>, long_edge: Option<u32>) -> Result<()> {
    let image = image::open(input)
        .with_context(|| format!("failed to open {}", input.display()))?
        .to_rgba8();

    let start = Instant::now();
    let upscaled = match remote {
        Some(client) => client.upscale(&image).await?,
        None => {
            LocalUpscaler {
                long_edge: long_edge.unwrap_or(TARGET_LONG_EDGE),
            }
            .upscale(&image)
            .await?
        }
    };
    let elapsed = start.elapsed();

    upscaled
        .save(out)
        .with_context(|| format!("failed to write {}", out.display()))?;

    println!(
        "🔍 {}x{} -> {}x{} in {:.2}s",
        image.width(),
        image.height(),
        upscaled.width(),
        upscaled.height(),
        elapsed.as_secs_f64()
    );
    println!("   Saved {}", out.display());
    Ok(())
}
