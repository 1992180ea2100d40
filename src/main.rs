//! `SlideKit` CLI - Render captioned slides and talk to the studio and order backends

mod cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use slidekit::studio::SecondMode;
use slidekit::{Config, StudioClient};

use cmd::{
    cmd_caption, cmd_corpora, cmd_filters, cmd_images, cmd_order_capture, cmd_order_create, cmd_render, cmd_upscale,
    RenderArgs,
};

#[derive(Parser)]
#[command(name = "slidekit")]
#[command(about = "Captioned slide renderer with studio and order tooling")]
#[command(version)]
struct Cli {
    /// Studio base URL (overrides config and SLIDEKIT_STUDIO_URL)
    #[arg(long, global = true)]
    studio: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an image with a caption to PNG
    Render(RenderArgs),

    /// List filter presets
    Filters {
        /// Show the CSS filter chain of each preset
        #[arg(long)]
        css: bool,
    },

    /// List images on the studio server
    Images {
        /// Upload this file first
        #[arg(short, long)]
        upload: Option<PathBuf>,
    },

    /// List caption corpus styles
    Corpora,

    /// Generate captions on the studio server
    Caption {
        /// Artist name woven into the captions
        #[arg(short, long)]
        artist: String,

        /// Corpus style
        #[arg(short, long, default_value = "provocation")]
        style: String,

        /// Regenerate the second line (classic or custom)
        #[arg(long, value_parser = parse_second_mode)]
        second: Option<SecondMode>,

        /// Random slide pairs across all styles
        #[arg(long)]
        batch: bool,
    },

    /// Upscale an image to 4K
    Upscale {
        input: PathBuf,

        /// Output file
        #[arg(short, long, default_value = "upscaled.png")]
        out: PathBuf,

        /// Use the studio server instead of the local upscaler
        #[arg(long)]
        remote: bool,

        /// Target long edge for the local upscaler
        #[arg(long)]
        long_edge: Option<u32>,
    },

    /// Create or capture a PayPal order
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Open an order for a submission
    Create {
        item_id: String,
    },
    /// Capture an approved order and record the sale
    Capture {
        order_id: String,

        #[arg(long)]
        item_id: Option<String>,
    },
}

fn parse_second_mode(s: &str) -> std::result::Result<SecondMode, String> {
    match s {
        "classic" => Ok(SecondMode::Classic),
        "custom" => Ok(SecondMode::Custom),
        other => Err(format!("unknown mode '{other}' (expected classic or custom)")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(url) = cli.studio {
        config.studio.base_url = url;
    }

    match cli.command {
        Commands::Render(args) => {
            cmd_render(&args, &config).await?;
        }
        Commands::Filters { css } => {
            cmd_filters(css);
        }
        Commands::Images { upload } => {
            cmd_images(&studio_client(&config)?, upload.as_deref()).await?;
        }
        Commands::Corpora => {
            cmd_corpora(&studio_client(&config)?).await?;
        }
        Commands::Caption { artist, style, second, batch } => {
            cmd_caption(&studio_client(&config)?, &artist, &style, second, batch).await?;
        }
        Commands::Upscale { input, out, remote, long_edge } => {
            let client = if remote { Some(studio_client(&config)?) } else { None };
            cmd_upscale(&input, &out, client.as_ref(), long_edge).await?;
        }
        Commands::Order { action } => match action {
            OrderAction::Create { item_id } => cmd_order_create(&config, &item_id).await?,
            OrderAction::Capture { order_id, item_id } => {
                cmd_order_capture(&config, &order_id, item_id.as_deref()).await?;
            }
        },
    }

    Ok(())
}

fn studio_client(config: &Config) -> Result<StudioClient> {
    StudioClient::new(&config.studio.base_url)
        .with_context(|| format!("invalid studio URL {}", config.studio.base_url))
}
