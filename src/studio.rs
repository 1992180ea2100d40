//! Studio server client
//!
//! Async client for the caption studio HTTP API: image library, caption
//! generation, 4K upscaling and the various save targets. Every failure
//! carries the server's `error` message when it sent one.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::dataurl::{self, DataUrlError};
use crate::session::{CloudUpload, GalleryUpload};
use crate::upscale::{UpscaleError, Upscaler};

#[derive(Error, Debug)]
pub enum StudioError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Studio error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Response(String),

    #[error("Image error: {0}")]
    Image(#[from] DataUrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StudioError>;

/// Where the second caption line comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecondMode {
    /// Built-in templates
    #[default]
    Classic,
    /// Phrases uploaded to the server
    Custom,
}

/// Caption pair for a two-slide post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captions {
    pub caption1: String,
    pub caption2: String,
}

/// One generated slide pair from batch generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub image1: String,
    pub image2: String,
    pub caption1: String,
    pub caption2: String,
    pub style: String,
}

#[derive(Deserialize)]
struct UploadReply {
    filename: String,
}

#[derive(Deserialize)]
struct LineReply {
    #[serde(default)]
    line: String,
}

#[derive(Deserialize)]
struct RunsReply {
    runs: Vec<Run>,
}

#[derive(Deserialize)]
struct DataUrlReply {
    #[serde(rename = "dataUrl")]
    data_url: String,
}

#[derive(Deserialize)]
struct SuccessReply {
    #[serde(default)]
    success: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct PathReply {
    path: String,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

/// Studio API client
pub struct StudioClient {
    client: Client,
    base: Url,
}

impl StudioClient {
    /// Create a client for the studio at `base`
    pub fn new(base: &str) -> Result<Self> {
        let client = Client::builder()
            // ═══════════════════════════════════════════════════════════════
            // CONNECTION
            // ═══════════════════════════════════════════════════════════════
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .gzip(true)
            // ═══════════════════════════════════════════════════════════════
            // SESSION
            // ═══════════════════════════════════════════════════════════════
            // Uploaded images are scoped to the session cookie
            .cookie_store(true)
            // ═══════════════════════════════════════════════════════════════
            // TIMEOUTS (upscaling a large slide takes a while)
            // ═══════════════════════════════════════════════════════════════
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Self::with_client(client, base)
    }

    /// Create a client around an existing reqwest client
    pub fn with_client(client: Client, base: &str) -> Result<Self> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Absolute URL for an API path
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        read_json(self.client.get(url).send().await?).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        read_json(self.client.post(url).json(body).send().await?).await
    }

    /// Image file names visible to this session
    #[instrument(skip(self))]
    pub async fn list_images(&self) -> Result<Vec<String>> {
        self.get("api/images").await
    }

    /// Upload an image file; returns the stored file name
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn upload_image(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| "upload.png".to_string(), |n| n.to_string_lossy().to_string());
        self.upload_image_bytes(&name, bytes).await
    }

    /// Upload raw image bytes under `file_name`
    pub async fn upload_image_bytes(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        let url = self.endpoint("upload-image")?;
        let reply: UploadReply = read_json(self.client.post(url).multipart(form).send().await?).await?;
        info!(filename = %reply.filename, "Uploaded image");
        Ok(reply.filename)
    }

    /// Caption pair for an artist in a corpus style
    #[instrument(skip(self))]
    pub async fn generate(&self, artist: &str, style: &str) -> Result<Captions> {
        self.post("api/generate", &json!({ "artist": artist, "style": style })).await
    }

    /// A fresh second caption line
    #[instrument(skip(self))]
    pub async fn second_line(&self, mode: SecondMode, artist: &str) -> Result<String> {
        let reply: LineReply = self
            .post("api/second_line", &json!({ "second_mode": mode, "artist": artist }))
            .await?;
        Ok(reply.line)
    }

    /// Batch of random slide pairs across all styles
    #[instrument(skip(self))]
    pub async fn mega_generate(&self, artist: &str) -> Result<Vec<Run>> {
        let reply: RunsReply = self.post("api/mega_generate", &json!({ "artist": artist })).await?;
        Ok(reply.runs)
    }

    /// Server-side 4K enhance
    #[instrument(skip(self, image), fields(w = image.width(), h = image.height()))]
    pub async fn upscale_4k(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let data_url = dataurl::encode_png(image)?;
        let reply: DataUrlReply = self.post("api/upscale4k", &json!({ "dataUrl": data_url })).await?;
        Ok(dataurl::decode(&reply.data_url)?)
    }

    /// Add a rendered slide to the phone gallery
    #[instrument(skip(self, upload), fields(filename = %upload.filename))]
    pub async fn save_gallery_image(&self, upload: &GalleryUpload) -> Result<()> {
        let reply: SuccessReply = self.post("api/save_gallery_image", upload).await?;
        if reply.success {
            Ok(())
        } else {
            Err(StudioError::Response(reply.error.unwrap_or_else(|| "Failed".to_string())))
        }
    }

    /// Save to Dropbox; returns the remote path
    #[instrument(skip(self, upload), fields(filename = %upload.filename))]
    pub async fn save_dropbox(&self, upload: &CloudUpload) -> Result<String> {
        let reply: PathReply = self.post("api/save_dropbox", upload).await?;
        Ok(reply.path)
    }

    /// Store a slide for sharing; returns its share path
    #[instrument(skip(self, data_url))]
    pub async fn save_slide(&self, filename: &str, data_url: &str) -> Result<String> {
        let reply: PathReply = self
            .post("api/save_slide", &json!({ "filename": filename, "dataUrl": data_url }))
            .await?;
        Ok(reply.path)
    }

    /// Available caption corpus styles
    #[instrument(skip(self))]
    pub async fn list_corpora(&self) -> Result<Vec<String>> {
        self.get("api/corpora").await
    }
}

#[async_trait]
impl Upscaler for StudioClient {
    async fn upscale(&self, image: &RgbaImage) -> std::result::Result<RgbaImage, UpscaleError> {
        self.upscale_4k(image)
            .await
            .map_err(|e| UpscaleError::Remote(e.to_string()))
    }
}

/// Decode a JSON reply, turning error statuses into [`StudioError::Server`]
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(server_error(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| StudioError::Response(format!("{e}: {}", truncate(&body, 200))))
}

fn server_error(status: u16, body: &str) -> StudioError {
    let message = serde_json::from_str::<ErrorReply>(body)
        .map_or_else(|_| truncate(body, 200).to_string(), |e| e.error);
    StudioError::Server { status, message }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_join_under_base_path() {
        let client = StudioClient::new("http://localhost:5000/studio").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:5000/studio/");
        assert_eq!(
            client.endpoint("/api/images").unwrap().as_str(),
            "http://localhost:5000/studio/api/images"
        );
        assert_eq!(
            client.endpoint("upload-image").unwrap().as_str(),
            "http://localhost:5000/studio/upload-image"
        );
    }

    #[test]
    fn test_server_error_prefers_json_message() {
        match server_error(400, r#"{"error":"Artist required"}"#) {
            StudioError::Server { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Artist required");
            }
            other => panic!("unexpected {other:?}"),
        }
        match server_error(502, "Bad Gateway") {
            StudioError::Server { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_second_mode_wire_names() {
        assert_eq!(serde_json::to_value(SecondMode::Classic).unwrap(), "classic");
        assert_eq!(serde_json::to_value(SecondMode::Custom).unwrap(), "custom");
    }

    #[test]
    fn test_runs_reply_shape() {
        let body = r#"{"runs":[{"image1":"a.png","image2":"b.png","caption1":"x","caption2":"y","style":"provocation"}]}"#;
        let reply: RunsReply = serde_json::from_str(body).unwrap();
        assert_eq!(reply.runs[0].style, "provocation");
    }
}
