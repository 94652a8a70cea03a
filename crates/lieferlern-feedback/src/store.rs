//! Ranking snapshots keyed by product, city and date.

use std::collections::BTreeMap;
use std::sync::RwLock;

use lieferlern_core::RankingRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot store data is malformed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

/// A ranking as it stood on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub product_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub suppliers: Vec<RankingRecord>,
}

impl RankingSnapshot {
    #[must_use]
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::new(self.product_id, self.city.as_deref(), &self.date)
    }
}

/// Lookup key. City is compared case-insensitively; no city is its own key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotKey {
    pub product_id: u64,
    pub city: String,
    pub date: String,
}

impl SnapshotKey {
    #[must_use]
    pub fn new(product_id: u64, city: Option<&str>, date: &str) -> Self {
        Self {
            product_id,
            city: city.map(|c| c.trim().to_lowercase()).unwrap_or_default(),
            date: date.trim().to_string(),
        }
    }
}

pub trait SnapshotStore {
    /// Stores `snapshot`, replacing any snapshot with the same key.
    fn put(&self, snapshot: RankingSnapshot) -> Result<(), StoreError>;

    fn get(&self, key: &SnapshotKey) -> Result<Option<RankingSnapshot>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<BTreeMap<SnapshotKey, RankingSnapshot>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        self.snapshots
            .read()
            .map(|s| s.len())
            .map_err(|_| StoreError::Internal("snapshot store lock poisoned"))
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn put(&self, snapshot: RankingSnapshot) -> Result<(), StoreError> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| StoreError::Internal("snapshot store lock poisoned"))?;
        snapshots.insert(snapshot.key(), snapshot);
        Ok(())
    }

    fn get(&self, key: &SnapshotKey) -> Result<Option<RankingSnapshot>, StoreError> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| StoreError::Internal("snapshot store lock poisoned"))?;
        Ok(snapshots.get(key).cloned())
    }
}
