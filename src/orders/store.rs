//! Submission and sales storage backends

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use super::{id_key, OrderError, Result, Sale, SalesStore, Submission};

/// Supabase PostgREST store authenticated with the service role key
pub struct SupabaseStore {
    client: Client,
    rest: Url,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(project_url: &str, service_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        let mut rest = Url::parse(project_url)?;
        rest.set_path("/rest/v1/");
        Ok(Self {
            client,
            rest,
            service_key: service_key.into(),
        })
    }

    fn table(&self, table: &str) -> Result<Url> {
        Ok(self.rest.join(table)?)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn select<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        let response = self.authed(self.client.get(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OrderError::Store {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    /// Query URL for `table` with PostgREST filters
    fn query(&self, table: &str, select: &str, filters: &[(&str, String)]) -> Result<Url> {
        let mut url = self.table(table)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", select);
            for (column, filter) in filters {
                pairs.append_pair(column, filter);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl SalesStore for SupabaseStore {
    async fn approved_submission(&self, item_id: &str) -> Result<Option<Submission>> {
        let url = self.query(
            "submissions",
            "*",
            &[("id", format!("eq.{item_id}")), ("approved", "eq.true".to_string())],
        )?;
        let mut rows: Vec<Submission> = self.select(url).await?;
        debug!(item_id, rows = rows.len(), "Submission lookup");
        // Exactly one row or nothing
        if rows.len() == 1 {
            Ok(rows.pop())
        } else {
            Ok(None)
        }
    }

    async fn sales_count(&self, item_id: &str) -> Result<usize> {
        let url = self.query("sales", "id", &[("item_id", format!("eq.{item_id}"))])?;
        let rows: Vec<Value> = self.select(url).await?;
        Ok(rows.len())
    }

    async fn insert_sale(&self, sale: &Sale) -> Result<()> {
        let response = self
            .authed(self.client.post(self.table("sales")?))
            .header("Prefer", "return=minimal")
            .json(sale)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OrderError::Store {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// In-memory store for tests and local runs
#[derive(Default)]
pub struct MemoryStore {
    submissions: RwLock<HashMap<String, Submission>>,
    sales: RwLock<Vec<Sale>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_submission(&self, submission: Submission) {
        self.submissions.write().await.insert(submission.key(), submission);
    }

    /// Snapshot of the recorded sales
    pub async fn sales(&self) -> Vec<Sale> {
        self.sales.read().await.clone()
    }
}

#[async_trait]
impl SalesStore for MemoryStore {
    async fn approved_submission(&self, item_id: &str) -> Result<Option<Submission>> {
        Ok(self
            .submissions
            .read()
            .await
            .get(item_id)
            .filter(|s| s.approved)
            .cloned())
    }

    async fn sales_count(&self, item_id: &str) -> Result<usize> {
        Ok(self
            .sales
            .read()
            .await
            .iter()
            .filter(|s| s.item_id.as_ref().and_then(id_key).as_deref() == Some(item_id))
            .count())
    }

    async fn insert_sale(&self, sale: &Sale) -> Result<()> {
        self.sales.write().await.push(sale.clone());
        Ok(())
    }
}
