use std::path::Path;

use anyhow::{Context, Result};

use slidekit::studio::SecondMode;
use slidekit::StudioClient;

pub async fn cmd_images(client: &StudioClient, upload: Option<&Path>) -> Result<()> {
    if let Some(path) = upload {
        let name = client
            .upload_image(path)
            .await
            .with_context(|| format!("failed to upload {}", path.display()))?;
        println!("📤 Uploaded as {name}");
    }

    let images = client.list_images().await?;
    println!("🖼️  {} images on {}", images.len(), client.base_url());
    for name in images {
        println!("   {name}");
    }
    Ok(())
}

pub async fn cmd_corpora(client: &StudioClient) -> Result<()> {
    let corpora = client.list_corpora().await?;
    println!("📚 {} caption styles", corpora.len());
    for name in corpora {
        println!("   {name}");
    }
    Ok(())
}

pub async fn cmd_caption(
    client: &StudioClient,
    artist: &str,
    style: &str,
    second: Option<SecondMode>,
    batch: bool,
) -> Result<()> {
    if batch {
        let runs = client.mega_generate(artist).await?;
        println!("🎲 {} slide pairs", runs.len());
        for run in runs {
            println!("\n   [{}] {} / {}", run.style, run.image1, run.image2);
            println!("   1: {}", run.caption1);
            println!("   2: {}", run.caption2);
        }
        return Ok(());
    }

    let captions = client.generate(artist, style).await?;
    println!("1: {}", captions.caption1);
    match second {
        Some(mode) => println!("2: {}", client.second_line(mode, artist).await?),
        None => println!("2: {}", captions.caption2),
    }
    Ok(())
}
