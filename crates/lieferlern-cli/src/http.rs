//! Order Service and supplier directory over HTTP.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use lieferlern_core::{PerformanceRecord, PerformanceSnapshot};
use lieferlern_feedback::{
    CategoryPerformance, PerformanceSource, SourceError, SupplierDirectory, SupplierInfo,
    Transaction, TransactionQuery,
};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;

pub const ENV_ORDER_SERVICE_URL: &str = "ORDER_SERVICE_URL";
pub const ENV_ORDER_SERVICE_API_KEY: &str = "ORDER_SERVICE_API_KEY";
/// Defaults to the Order Service URL when unset.
pub const ENV_SUPPLIER_SERVICE_URL: &str = "SUPPLIER_SERVICE_URL";

const TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpOrderService {
    client: Client,
    order_base: String,
    supplier_base: String,
    api_key: String,
}

impl HttpOrderService {
    pub fn new(order_base: &str, supplier_base: &str, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            order_base: order_base.trim_end_matches('/').to_string(),
            supplier_base: supplier_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_env() -> Result<Self> {
        let order_base = env::var(ENV_ORDER_SERVICE_URL)
            .with_context(|| format!("{ENV_ORDER_SERVICE_URL} env var is required"))?;
        let supplier_base =
            env::var(ENV_SUPPLIER_SERVICE_URL).unwrap_or_else(|_| order_base.clone());
        let api_key = env::var(ENV_ORDER_SERVICE_API_KEY)
            .with_context(|| format!("{ENV_ORDER_SERVICE_API_KEY} env var is required"))?;
        Self::new(&order_base, &supplier_base, api_key)
    }

    fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        tracing::debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .query(query)
            .send()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SourceError::from_status(status.as_u16(), body));
        }
        resp.json::<T>().map_err(|e| SourceError::Decode(e.to_string()))
    }

    fn order_url(&self, supplier_id: u64, path: &str) -> String {
        format!("{}/suppliers/{}/{}", self.order_base, supplier_id, path)
    }
}

fn transaction_params(query: &TransactionQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(since) = &query.since {
        params.push(("start_date", since.clone()));
    }
    if !query.statuses.is_empty() {
        let statuses: Vec<&str> = query.statuses.iter().map(|s| s.as_str()).collect();
        params.push(("status", statuses.join(",")));
    }
    if query.has_delivery_date == Some(true) {
        params.push(("has_delivery_date", "true".to_string()));
    }
    params
}

impl PerformanceSource for HttpOrderService {
    fn transactions(
        &self,
        supplier_id: u64,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>, SourceError> {
        self.get(&self.order_url(supplier_id, "transactions"), &transaction_params(query))
    }

    fn performance_records(
        &self,
        supplier_id: u64,
        since: &str,
    ) -> Result<Vec<PerformanceRecord>, SourceError> {
        self.get(
            &self.order_url(supplier_id, "performance"),
            &[("start_date", since.to_string())],
        )
    }

    fn performance_summary(
        &self,
        supplier_id: u64,
        since: &str,
    ) -> Result<PerformanceSnapshot, SourceError> {
        self.get(
            &self.order_url(supplier_id, "performance/summary"),
            &[("start_date", since.to_string())],
        )
    }

    fn category_performance(
        &self,
        supplier_id: u64,
    ) -> Result<Vec<CategoryPerformance>, SourceError> {
        self.get(&self.order_url(supplier_id, "performance/categories"), &[])
    }
}

impl SupplierDirectory for HttpOrderService {
    fn supplier(&self, id: u64) -> Result<Option<SupplierInfo>, SourceError> {
        match self.get(&format!("{}/api/v1/suppliers/{}", self.supplier_base, id), &[]) {
            Ok(info) => Ok(Some(info)),
            Err(SourceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn suppliers_for_product(&self, product_id: u64) -> Result<Vec<SupplierInfo>, SourceError> {
        Ok(self
            .all_suppliers()?
            .into_iter()
            .filter(|s| s.products.contains(&product_id))
            .collect())
    }

    fn all_suppliers(&self) -> Result<Vec<SupplierInfo>, SourceError> {
        self.get(
            &format!("{}/api/v1/suppliers/", self.supplier_base),
            &[("active", "true".to_string())],
        )
    }
}
