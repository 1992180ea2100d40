//! Configuration loaded from `~/.config/slidekit/config.toml`.
//!
//! Every section is optional. Environment variables override the file so
//! the order server can run from deployment secrets alone.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::compositor::FontLibrary;
use crate::orders::paypal::DEFAULT_API_BASE;
use crate::orders::{MemoryStore, OrderService, PayPalClient, SalesStore, SupabaseStore};

/// Studio server used when nothing else is configured
pub const DEFAULT_STUDIO_URL: &str = "http://localhost:5000";

/// Order server bind address used when nothing else is configured
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Studio API location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub base_url: String,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STUDIO_URL.to_string(),
        }
    }
}

/// PayPal REST credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PayPalConfig {
    pub api_base: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            client_id: None,
            client_secret: None,
        }
    }
}

impl PayPalConfig {
    /// Client id and secret when both are set
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        }
    }
}

/// Supabase project access.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub service_role_key: Option<String>,
}

impl SupabaseConfig {
    /// Project URL and key when both are set
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.url.as_deref(), self.service_role_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }
}

/// Extra fonts on top of the system ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FontsConfig {
    pub dirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

impl FontsConfig {
    /// System fonts plus everything configured here.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured font file cannot be loaded.
    pub fn library(&self) -> Result<FontLibrary> {
        let library = FontLibrary::system();
        for dir in &self.dirs {
            library
                .load_fonts_dir(dir)
                .with_context(|| format!("failed to load fonts from {}", dir.display()))?;
        }
        for file in &self.files {
            library
                .load_font_file(file)
                .with_context(|| format!("failed to load font {}", file.display()))?;
        }
        Ok(library)
    }
}

/// Order server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub studio: StudioConfig,
    pub paypal: PayPalConfig,
    pub supabase: SupabaseConfig,
    pub fonts: FontsConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load the default config file, then apply environment overrides.
    ///
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file(&config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a config file without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    /// Override settings from environment variables, read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |slot: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = value;
            }
        };
        set(&mut self.studio.base_url, "SLIDEKIT_STUDIO_URL");
        set(&mut self.server.bind, "SLIDEKIT_BIND");
        set(&mut self.paypal.api_base, "PAYPAL_API_BASE");

        let set_opt = |slot: &mut Option<String>, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        };
        set_opt(&mut self.paypal.client_id, "PAYPAL_CLIENT_ID");
        set_opt(&mut self.paypal.client_secret, "PAYPAL_CLIENT_SECRET");
        set_opt(&mut self.supabase.url, "SB_URL");
        set_opt(&mut self.supabase.service_role_key, "SB_SERVICE_ROLE_KEY");
    }

    /// Order service over PayPal and Supabase.
    ///
    /// Without Supabase credentials the service runs on an empty
    /// in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if PayPal credentials are missing or a URL is invalid.
    pub fn order_service(&self) -> Result<OrderService> {
        let (client_id, secret) = self
            .paypal
            .credentials()
            .context("PayPal credentials missing (PAYPAL_CLIENT_ID / PAYPAL_CLIENT_SECRET)")?;
        let gateway = PayPalClient::new(&self.paypal.api_base, client_id, secret)
            .context("invalid PayPal API base")?;

        let store: Arc<dyn SalesStore> = match self.supabase.credentials() {
            Some((url, key)) => Arc::new(SupabaseStore::new(url, key).context("invalid Supabase URL")?),
            None => {
                warn!("Supabase not configured, using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(OrderService::new(Arc::new(gateway), store))
    }
}

/// Return the path to the config file.
#[must_use]
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slidekit")
        .join("config.toml")
}
