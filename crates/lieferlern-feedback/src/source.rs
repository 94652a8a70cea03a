//! Upstream collaborators: the Order Service (performance data) and the
//! supplier directory. Both are traits so the engine can run against HTTP
//! clients, files or in-memory fakes.

use lieferlern_core::{PerformanceRecord, PerformanceSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl SourceError {
    /// Maps a non-success HTTP status to an error.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => SourceError::BadRequest(message),
            401 | 403 => SourceError::Unauthorized,
            404 => SourceError::NotFound(message),
            _ => SourceError::Server { status, message },
        }
    }
}

/// A supplier as known to the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierInfo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub products: Vec<u64>,
}

/// Filter for [`PerformanceSource::transactions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionQuery {
    /// `YYYY-MM-DD`, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<TransactionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_delivery_date: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Ordered,
    Shipped,
    Delivered,
    Returned,
    Cancelled,
}

impl TransactionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Ordered => "ORDERED",
            TransactionStatus::Shipped => "SHIPPED",
            TransactionStatus::Delivered => "DELIVERED",
            TransactionStatus::Returned => "RETURNED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }
}

/// One order line as reported by the Order Service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub supplier_id: u64,
    pub order_date: String,
    pub status: TransactionStatus,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub defect_count: u32,
    #[serde(default)]
    pub expected_delivery_date: Option<String>,
    #[serde(default)]
    pub actual_delivery_date: Option<String>,
}

/// Aggregate for one product category of a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPerformance {
    pub category: String,
    #[serde(default)]
    pub order_count: u32,
    #[serde(flatten)]
    pub snapshot: PerformanceSnapshot,
}

pub trait PerformanceSource {
    fn transactions(
        &self,
        supplier_id: u64,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>, SourceError>;

    /// Date-stamped records since `since` (`YYYY-MM-DD`).
    fn performance_records(
        &self,
        supplier_id: u64,
        since: &str,
    ) -> Result<Vec<PerformanceRecord>, SourceError>;

    /// Pre-aggregated snapshot over the period since `since`.
    fn performance_summary(
        &self,
        supplier_id: u64,
        since: &str,
    ) -> Result<PerformanceSnapshot, SourceError>;

    fn category_performance(
        &self,
        supplier_id: u64,
    ) -> Result<Vec<CategoryPerformance>, SourceError>;
}

pub trait SupplierDirectory {
    fn supplier(&self, id: u64) -> Result<Option<SupplierInfo>, SourceError>;

    fn suppliers_for_product(&self, product_id: u64) -> Result<Vec<SupplierInfo>, SourceError>;

    fn all_suppliers(&self) -> Result<Vec<SupplierInfo>, SourceError>;
}

impl<T: PerformanceSource + ?Sized> PerformanceSource for &T {
    fn transactions(
        &self,
        supplier_id: u64,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>, SourceError> {
        (**self).transactions(supplier_id, query)
    }

    fn performance_records(
        &self,
        supplier_id: u64,
        since: &str,
    ) -> Result<Vec<PerformanceRecord>, SourceError> {
        (**self).performance_records(supplier_id, since)
    }

    fn performance_summary(
        &self,
        supplier_id: u64,
        since: &str,
    ) -> Result<PerformanceSnapshot, SourceError> {
        (**self).performance_summary(supplier_id, since)
    }

    fn category_performance(
        &self,
        supplier_id: u64,
    ) -> Result<Vec<CategoryPerformance>, SourceError> {
        (**self).category_performance(supplier_id)
    }
}

impl<T: SupplierDirectory + ?Sized> SupplierDirectory for &T {
    fn supplier(&self, id: u64) -> Result<Option<SupplierInfo>, SourceError> {
        (**self).supplier(id)
    }

    fn suppliers_for_product(&self, product_id: u64) -> Result<Vec<SupplierInfo>, SourceError> {
        (**self).suppliers_for_product(product_id)
    }

    fn all_suppliers(&self) -> Result<Vec<SupplierInfo>, SourceError> {
        (**self).all_suppliers()
    }
}

/// Share of transaction-derived rates when blended with recorded rates.
pub const TRANSACTION_WEIGHT: f64 = 0.7;

/// Defect, return, on-time and delay figures computed from raw transactions.
///
/// Rates are percentages. Returns an empty snapshot for no transactions.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize_transactions(transactions: &[Transaction]) -> PerformanceSnapshot {
    if transactions.is_empty() {
        return PerformanceSnapshot::default();
    }
    let total_orders = transactions.len() as f64;
    let quantity: u64 = transactions.iter().map(|t| u64::from(t.quantity)).sum();
    let defects: u64 = transactions.iter().map(|t| u64::from(t.defect_count)).sum();
    let returned = transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::Returned)
        .count() as f64;

    let mut delivered = 0_u32;
    let mut on_time = 0_u32;
    let mut delay_sum = 0_i64;
    let mut delayed = 0_u32;
    for t in transactions {
        if matches!(t.status, TransactionStatus::Cancelled | TransactionStatus::Ordered) {
            continue;
        }
        let (Some(expected), Some(actual)) = (
            t.expected_delivery_date.as_deref().and_then(crate::parse_day),
            t.actual_delivery_date.as_deref().and_then(crate::parse_day),
        ) else {
            continue;
        };
        delivered += 1;
        let late_by = (actual - expected).whole_days();
        if late_by <= 0 {
            on_time += 1;
        } else {
            delayed += 1;
            delay_sum += late_by;
        }
    }

    PerformanceSnapshot {
        defect_rate: (quantity > 0).then(|| defects as f64 / quantity as f64 * 100.0),
        return_rate: Some(returned / total_orders * 100.0),
        on_time_delivery_rate: (delivered > 0)
            .then(|| f64::from(on_time) / f64::from(delivered) * 100.0),
        average_delay_days: (delivered > 0).then(|| {
            if delayed == 0 {
                0.0
            } else {
                delay_sum as f64 / f64::from(delayed)
            }
        }),
        ..PerformanceSnapshot::default()
    }
}

/// Fills `recorded` with transaction-derived figures, blending
/// `TRANSACTION_WEIGHT : 1 - TRANSACTION_WEIGHT` where both exist.
#[must_use]
pub fn blend_snapshots(
    recorded: &PerformanceSnapshot,
    from_transactions: &PerformanceSnapshot,
) -> PerformanceSnapshot {
    let mix = |rec: Option<f64>, tx: Option<f64>| match (rec, tx) {
        (Some(r), Some(t)) => Some(t * TRANSACTION_WEIGHT + r * (1.0 - TRANSACTION_WEIGHT)),
        (r, t) => t.or(r),
    };
    PerformanceSnapshot {
        defect_rate: mix(recorded.defect_rate, from_transactions.defect_rate),
        return_rate: mix(recorded.return_rate, from_transactions.return_rate),
        on_time_delivery_rate: mix(
            recorded.on_time_delivery_rate,
            from_transactions.on_time_delivery_rate,
        ),
        average_delay_days: mix(
            recorded.average_delay_days,
            from_transactions.average_delay_days,
        ),
        ..recorded.clone()
    }
}
