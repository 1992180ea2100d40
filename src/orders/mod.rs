//! Order endpoints for the corpus marketplace
//!
//! Two public POST handlers: `orders-create` opens a PayPal order for an
//! approved submission (respecting limited editions) and `orders-capture`
//! captures it and records the sale. The payment provider and the
//! database sit behind [`PaymentGateway`] and [`SalesStore`].

pub mod http;
pub mod paypal;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

pub use paypal::PayPalClient;
pub use store::{MemoryStore, SupabaseStore};

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("PayPal token error {status}: {body}")]
    Token { status: u16, body: String },

    #[error("Upstream error {status}")]
    Upstream { status: u16, body: Value },

    #[error("Store error {status}: {body}")]
    Store { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, OrderError>;

/// Response body of an order endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Json(Value),
    Text(String),
}

/// Status plus body, independent of the HTTP server in front
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: ReplyBody,
}

impl Reply {
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: ReplyBody::Json(body),
        }
    }

    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: ReplyBody::Text(body.into()),
        }
    }

    /// Body as sent on the wire
    #[must_use]
    pub fn body_string(&self) -> String {
        match &self.body {
            ReplyBody::Json(v) => v.to_string(),
            ReplyBody::Text(s) => s.clone(),
        }
    }

    /// JSON body, if any
    #[must_use]
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ReplyBody::Json(v) => Some(v),
            ReplyBody::Text(_) => None,
        }
    }
}

/// Payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an order; non-2xx answers come back as [`OrderError::Upstream`]
    async fn create_order(&self, order: &OrderRequest) -> Result<Value>;

    /// Capture an approved order; non-2xx answers come back as [`OrderError::Upstream`]
    async fn capture_order(&self, order_id: &str) -> Result<Value>;
}

/// Submission and sales storage
#[async_trait]
pub trait SalesStore: Send + Sync {
    /// The submission with this id, if it exists and is approved
    async fn approved_submission(&self, item_id: &str) -> Result<Option<Submission>>;

    /// Number of sales recorded for an item
    async fn sales_count(&self, item_id: &str) -> Result<usize>;

    async fn insert_sale(&self, sale: &Sale) -> Result<()>;
}

/// Price as stored: a number or a numeric string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Number(f64),
    Text(String),
}

impl Price {
    /// Numeric value, 0 when unparsable
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }
}

/// A marketplace submission (only the fields orders care about)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub limited: bool,
    #[serde(default)]
    pub edition_quantity: Option<i64>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub approved: bool,
}

/// Nullable boolean columns read as `false`
fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl Submission {
    /// Id as used in store queries
    #[must_use]
    pub fn key(&self) -> String {
        id_key(&self.id).unwrap_or_default()
    }

    /// Edition size when the item is a limited edition
    #[must_use]
    pub fn edition(&self) -> Option<i64> {
        match self.edition_quantity {
            Some(n) if self.limited && n != 0 => Some(n),
            _ => None,
        }
    }

    /// Copies left for an edition of `edition` after `sold` sales
    #[must_use]
    pub fn remaining(edition: i64, sold: usize) -> i64 {
        let sold = i64::try_from(sold).unwrap_or(i64::MAX);
        edition.saturating_sub(sold).max(0)
    }

    /// Line item description: name, else style, else a generic label
    #[must_use]
    pub fn description(&self) -> String {
        [&self.name, &self.style]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| "Corpus".to_string())
    }
}

/// A single-item EUR order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub description: String,
    pub amount: f64,
}

impl OrderRequest {
    #[must_use]
    pub fn for_submission(item: &Submission) -> Self {
        Self {
            description: item.description(),
            amount: item.price.as_ref().map_or(0.0, Price::value),
        }
    }

    /// Provider request body
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "description": self.description,
                "amount": { "currency_code": "EUR", "value": format!("{:.2}", self.amount) },
            }],
        })
    }
}

/// A recorded sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub item_id: Option<Value>,
    pub amount: f64,
    pub order_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    #[serde(default)]
    item_id: Option<Value>,
    #[serde(default)]
    buyer_user_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureRequest {
    #[serde(default)]
    order_id: Option<Value>,
    #[serde(default)]
    item_id: Option<Value>,
}

/// Usable id from a JSON value; empty strings, zero, false and null are missing
fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// Amount of the first capture of a captured order, 0 when absent
#[must_use]
pub fn capture_amount(capture: &Value) -> f64 {
    let amount = &capture["purchase_units"][0]["payments"]["captures"][0]["amount"]["value"];
    let value = match amount {
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Order endpoint logic
pub struct OrderService {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn SalesStore>,
}

impl OrderService {
    #[must_use]
    pub fn new(gateway: Arc<dyn PaymentGateway>, store: Arc<dyn SalesStore>) -> Self {
        Self { gateway, store }
    }

    /// `orders-create` with a raw JSON body
    pub async fn handle_create(&self, body: &[u8]) -> Reply {
        match self.create(body).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "orders-create error");
                Reply::json(500, json!({ "error": "Internal error", "details": e.to_string() }))
            }
        }
    }

    /// `orders-capture` with a raw JSON body
    pub async fn handle_capture(&self, body: &[u8]) -> Reply {
        match self.capture(body).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "orders-capture error");
                Reply::json(
                    500,
                    json!({ "ok": false, "error": "Internal error", "details": e.to_string() }),
                )
            }
        }
    }

    #[instrument(skip_all)]
    async fn create(&self, body: &[u8]) -> Result<Reply> {
        let request: CreateRequest = serde_json::from_slice(body)?;
        let Some(item_id) = request.item_id.as_ref().and_then(id_key) else {
            return Ok(Reply::json(400, json!({ "error": "itemId required" })));
        };
        debug!(%item_id, buyer = ?request.buyer_user_id, "Creating order");

        let item = match self.store.approved_submission(&item_id).await {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(not_found()),
            Err(e) => {
                warn!(%item_id, error = %e, "Submission lookup failed");
                return Ok(not_found());
            }
        };

        if let Some(edition) = item.edition() {
            let sold = match self.store.sales_count(&item.key()).await {
                Ok(n) => n,
                Err(e) => {
                    warn!(%item_id, error = %e, "Inventory check failed");
                    return Ok(Reply::json(500, json!({ "error": "Failed to check inventory" })));
                }
            };
            if Submission::remaining(edition, sold) <= 0 {
                info!(%item_id, edition, sold, "Sold out");
                return Ok(Reply::json(409, json!({ "error": "Sold out" })));
            }
        }

        let order = OrderRequest::for_submission(&item);
        match self.gateway.create_order(&order).await {
            Ok(created) => {
                info!(%item_id, order_id = %created["id"], "Order created");
                Ok(Reply::json(200, json!({ "id": created["id"] })))
            }
            Err(OrderError::Upstream { status, body }) => {
                warn!(%item_id, status, "PayPal create order failed");
                Ok(Reply::json(
                    status,
                    json!({ "error": "PayPal create order failed", "details": body }),
                ))
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all)]
    async fn capture(&self, body: &[u8]) -> Result<Reply> {
        let request: CaptureRequest = serde_json::from_slice(body)?;
        let Some(order_id) = request.order_id.as_ref().and_then(id_key) else {
            return Ok(Reply::json(400, json!({ "ok": false, "error": "orderId required" })));
        };

        let capture = match self.gateway.capture_order(&order_id).await {
            Ok(capture) => capture,
            Err(OrderError::Upstream { status, body }) => {
                warn!(%order_id, status, "PayPal capture failed");
                return Ok(Reply::json(
                    status,
                    json!({ "ok": false, "error": "PayPal capture failed", "details": body }),
                ));
            }
            Err(e) => return Err(e),
        };

        let sale = Sale {
            item_id: request.item_id.filter(|v| !v.is_null()),
            amount: capture_amount(&capture),
            order_id: order_id.clone(),
        };
        // The capture already went through; a failed insert must not fail the request
        if let Err(e) = self.store.insert_sale(&sale).await {
            warn!(%order_id, error = %e, "Failed to record sale");
        }
        info!(%order_id, amount = sale.amount, "Order captured");

        Ok(Reply::json(200, json!({ "ok": true, "capture": capture })))
    }
}

fn not_found() -> Reply {
    Reply::json(404, json!({ "error": "Item not found or not approved" }))
}
