//! HTTP front for the order endpoints
//!
//! `tiny_http` accepts connections on a blocking thread; each request is
//! handled on the tokio runtime and answered from a blocking task.

use std::io::Read;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::json;
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::{OrderService, Reply};

/// Headers sent with every response
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Headers",
        "authorization, x-client-info, apikey, content-type",
    ),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
];

/// Largest request body read before replying 413
pub const MAX_BODY: u64 = 1024 * 1024;

/// Which endpoint a path addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Create,
    Capture,
}

impl Route {
    /// Match on the last path segment so the endpoints can sit under any prefix
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or_default().trim_end_matches('/');
        match path.rsplit('/').next() {
            Some("orders-create") => Some(Self::Create),
            Some("orders-capture") => Some(Self::Capture),
            _ => None,
        }
    }
}

/// Route and answer one request
pub async fn dispatch(service: &OrderService, method: &str, path: &str, body: &[u8]) -> Reply {
    let Some(route) = Route::from_path(path) else {
        return Reply::json(404, json!({ "error": "Not found" }));
    };
    if method.eq_ignore_ascii_case("OPTIONS") {
        return Reply::text(200, "ok");
    }
    if !method.eq_ignore_ascii_case("POST") {
        return Reply::json(405, json!({ "error": "Method not allowed" }));
    }

    match route {
        Route::Create => service.handle_create(body).await,
        Route::Capture => service.handle_capture(body).await,
    }
}

/// Response headers for a reply (CORS always, JSON content type for JSON bodies)
#[must_use]
pub fn response_headers(reply: &Reply) -> Vec<(&'static str, &'static str)> {
    let mut headers = CORS_HEADERS.to_vec();
    if reply.json_body().is_some() {
        headers.push(("Content-Type", "application/json"));
    } else {
        headers.push(("Content-Type", "text/plain; charset=utf-8"));
    }
    headers
}

/// Read at most [`MAX_BODY`] bytes, turning oversize or broken bodies into error replies
pub fn read_body(reader: impl Read) -> std::result::Result<Vec<u8>, Reply> {
    let mut body = Vec::new();
    if let Err(e) = reader.take(MAX_BODY + 1).read_to_end(&mut body) {
        warn!(error = %e, "Failed to read request body");
        return Err(Reply::json(400, json!({ "error": "Invalid request body" })));
    }
    if body.len() as u64 > MAX_BODY {
        return Err(Reply::json(413, json!({ "error": "Payload too large" })));
    }
    Ok(body)
}

fn respond(request: Request, reply: &Reply) {
    let mut response = Response::from_string(reply.body_string()).with_status_code(StatusCode(reply.status));
    for (name, value) in response_headers(reply) {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    if let Err(e) = request.respond(response) {
        warn!(error = %e, "Failed to send response");
    }
}

/// Serve the order endpoints on `addr` until the listener fails.
///
/// Blocks the calling thread; handlers run on `runtime`.
pub fn serve(addr: &str, service: Arc<OrderService>, runtime: &Handle) -> Result<()> {
    let server = Server::http(addr).map_err(|e| anyhow!("failed to bind {addr}: {e}"))?;
    serve_on(server, service, runtime)
}

/// Serve on an already bound listener
pub fn serve_on(server: Server, service: Arc<OrderService>, runtime: &Handle) -> Result<()> {
    info!(addr = ?server.server_addr(), "Order endpoints listening");

    for mut request in server.incoming_requests() {
        let method = request.method().as_str().to_string();
        let path = request.url().to_string();
        let body = match read_body(request.as_reader()) {
            Ok(body) => body,
            Err(reply) => {
                info!(%method, %path, status = reply.status, "Rejected body");
                respond(request, &reply);
                continue;
            }
        };
        debug!(%method, %path, bytes = body.len(), "Request");

        let service = Arc::clone(&service);
        runtime.spawn(async move {
            let reply = dispatch(&service, &method, &path, &body).await;
            info!(%method, %path, status = reply.status, "Handled");
            let answered = tokio::task::spawn_blocking(move || respond(request, &reply)).await;
            if let Err(e) = answered {
                warn!(error = %e, "Response task failed");
            }
        });
    }
    Ok(())
}
