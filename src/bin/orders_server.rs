//! Order endpoints server
//!
//! Serves `POST /orders-create` and `POST /orders-capture` with CORS,
//! configured from `~/.config/slidekit/config.toml` and the environment.
//!
//! ```bash
//! PAYPAL_CLIENT_ID=... PAYPAL_CLIENT_SECRET=... \
//! SB_URL=https://project.supabase.co SB_SERVICE_ROLE_KEY=... \
//! slidekit-orders
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use slidekit::orders::http::serve;
use slidekit::Config;

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::load()?;
    let service = Arc::new(config.order_service()?);
    let bind = config.server.bind.clone();
    info!(version = slidekit::VERSION, paypal = %config.paypal.api_base, "Starting order server");

    let runtime = tokio::runtime::Handle::current();
    tokio::task::spawn_blocking(move || serve(&bind, service, &runtime))
        .await
        .context("server thread panicked")?
}
