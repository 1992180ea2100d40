//! PayPal REST gateway (client-credentials auth, Orders v2)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{OrderError, OrderRequest, PaymentGateway, Result};

/// Live PayPal API
pub const DEFAULT_API_BASE: &str = "https://api-m.paypal.com";

#[derive(Deserialize)]
struct TokenReply {
    access_token: String,
}

/// PayPal Orders client
pub struct PayPalClient {
    client: Client,
    api_base: Url,
    client_id: String,
    client_secret: String,
}

impl PayPalClient {
    pub fn new(api_base: &str, client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_base: Url::parse(api_base)?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// API URL for a list of path segments
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Fresh OAuth access token
    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(self.url(&["v1", "oauth2", "token"]))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrderError::Token {
                status: status.as_u16(),
                body,
            });
        }
        let token: TokenReply = response.json().await?;
        debug!("Obtained PayPal access token");
        Ok(token.access_token)
    }
}

/// JSON body of a provider reply; non-2xx becomes [`OrderError::Upstream`]
async fn read_reply(response: Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response.json().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(OrderError::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    #[instrument(skip(self, order), fields(amount = order.amount))]
    async fn create_order(&self, order: &OrderRequest) -> Result<Value> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.url(&["v2", "checkout", "orders"]))
            .bearer_auth(token)
            .json(&order.to_json())
            .send()
            .await?;
        read_reply(response).await
    }

    #[instrument(skip(self))]
    async fn capture_order(&self, order_id: &str) -> Result<Value> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.url(&["v2", "checkout", "orders", order_id, "capture"]))
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        read_reply(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_follow_api_base() {
        let client = PayPalClient::new("https://api-m.sandbox.paypal.com", "id", "secret").unwrap();
        assert_eq!(
            client.url(&["v1", "oauth2", "token"]).as_str(),
            "https://api-m.sandbox.paypal.com/v1/oauth2/token"
        );
        assert_eq!(
            client.url(&["v2", "checkout", "orders", "5O190127TN364715T", "capture"]).as_str(),
            "https://api-m.sandbox.paypal.com/v2/checkout/orders/5O190127TN364715T/capture"
        );
    }
}
