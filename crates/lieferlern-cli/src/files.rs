//! File-backed simulation sources and on-disk persistence.
//!
//! A catalog directory holds `suppliers.json`, `performance.json` and the
//! optional `transactions.json` and `categories.json`. Recorded history is
//! served in full; the lookback window does not apply in simulation mode.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lieferlern_core::{PerformanceRecord, PerformanceSnapshot};
use lieferlern_feedback::{
    CategoryPerformance, PerformanceSource, RankingSnapshot, SnapshotKey, SnapshotStore,
    SourceError, StoreError, SupplierDirectory, SupplierInfo, Transaction, TransactionQuery,
};
use lieferlern_qlearn::{parse_record_date, QTable, QTableSnapshot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub struct FileCatalog {
    suppliers: Vec<SupplierInfo>,
    records: Vec<PerformanceRecord>,
    transactions: Vec<Transaction>,
    categories: HashMap<u64, Vec<CategoryPerformance>>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(file).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_optional<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if path.exists() {
        read_json(path)
    } else {
        Ok(T::default())
    }
}

impl FileCatalog {
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(Self {
            suppliers: read_json(&dir.join("suppliers.json"))?,
            records: read_json(&dir.join("performance.json"))?,
            transactions: read_optional(&dir.join("transactions.json"))?,
            categories: read_optional(&dir.join("categories.json"))?,
        })
    }
}

impl PerformanceSource for FileCatalog {
    fn transactions(
        &self,
        supplier_id: u64,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>, SourceError> {
        Ok(self
            .transactions
            .iter()
            .filter(|t| t.supplier_id == supplier_id)
            .filter(|t| query.statuses.is_empty() || query.statuses.contains(&t.status))
            .filter(|t| query.has_delivery_date != Some(true) || t.actual_delivery_date.is_some())
            .cloned()
            .collect())
    }

    fn performance_records(
        &self,
        supplier_id: u64,
        _since: &str,
    ) -> Result<Vec<PerformanceRecord>, SourceError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.supplier_id == supplier_id)
            .cloned()
            .collect())
    }

    /// The most recent record of the supplier.
    fn performance_summary(
        &self,
        supplier_id: u64,
        _since: &str,
    ) -> Result<PerformanceSnapshot, SourceError> {
        self.records
            .iter()
            .filter(|r| r.supplier_id == supplier_id)
            .filter_map(|r| parse_record_date(&r.date).map(|at| (at, r)))
            .max_by_key(|(at, _)| *at)
            .map(|(_, r)| r.snapshot.clone())
            .ok_or_else(|| {
                SourceError::NotFound(format!("no performance data for supplier {supplier_id}"))
            })
    }

    fn category_performance(
        &self,
        supplier_id: u64,
    ) -> Result<Vec<CategoryPerformance>, SourceError> {
        Ok(self.categories.get(&supplier_id).cloned().unwrap_or_default())
    }
}

impl SupplierDirectory for FileCatalog {
    fn supplier(&self, id: u64) -> Result<Option<SupplierInfo>, SourceError> {
        Ok(self.suppliers.iter().find(|s| s.id == id).cloned())
    }

    fn suppliers_for_product(&self, product_id: u64) -> Result<Vec<SupplierInfo>, SourceError> {
        Ok(self
            .suppliers
            .iter()
            .filter(|s| s.products.contains(&product_id))
            .cloned()
            .collect())
    }

    fn all_suppliers(&self) -> Result<Vec<SupplierInfo>, SourceError> {
        Ok(self.suppliers.clone())
    }
}

/// Q-table as persisted between runs.
#[derive(Serialize, Deserialize, Debug)]
pub struct QTableFile {
    #[serde(with = "time::serde::iso8601::option", default)]
    pub saved_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub table: QTableSnapshot,
}

impl QTableFile {
    /// An empty table when `path` does not exist yet.
    pub fn load(path: &Path) -> Result<QTable> {
        if !path.exists() {
            return Ok(QTable::new());
        }
        let file: QTableFile = read_json(path)?;
        QTable::from_snapshot(file.table)
            .with_context(|| format!("Invalid Q-table in {}", path.display()))
    }

    pub fn save(table: &QTable, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = QTableFile {
            saved_at: Some(OffsetDateTime::now_utc()),
            table: table.snapshot()?,
        };
        serde_json::to_writer_pretty(File::create(path)?, &file)?;
        Ok(())
    }
}

/// Ranking snapshots in one pretty-printed JSON array.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<Vec<RankingSnapshot>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_reader(File::open(&self.path)?)?)
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn put(&self, snapshot: RankingSnapshot) -> Result<(), StoreError> {
        let key = snapshot.key();
        let mut all = self.read_all()?;
        all.retain(|s| s.key() != key);
        all.push(snapshot);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        serde_json::to_writer_pretty(File::create(&self.path)?, &all)?;
        Ok(())
    }

    fn get(&self, key: &SnapshotKey) -> Result<Option<RankingSnapshot>, StoreError> {
        Ok(self.read_all()?.into_iter().find(|s| &s.key() == key))
    }
}
