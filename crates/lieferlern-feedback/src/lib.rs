#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Feedback intake, rankings and training runs.
//!
//! This crate is the facade an API layer talks to. [`RankingEngine`] turns
//! feedback events into Q-table updates, ranks suppliers per product and
//! city, replays performance history in batch and explains learned values.
//! Upstream data comes in through the [`PerformanceSource`] and
//! [`SupplierDirectory`] traits; ranking snapshots go to a [`SnapshotStore`].

use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime};

mod telemetry;

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod source;
pub mod store;

pub use config::EngineConfig;
pub use engine::{
    FeedbackOutcome, QTableExport, QValuesResponse, RankingEngine, RankingResponse,
    TrainingRequest,
};
pub use error::{EngineError, Result};
pub use events::{EventKind, EventLog, RankingEvent, RewardStatistics};
pub use source::{
    CategoryPerformance, PerformanceSource, SourceError, SupplierDirectory, SupplierInfo,
    Transaction, TransactionQuery, TransactionStatus,
};
pub use store::{MemorySnapshotStore, RankingSnapshot, SnapshotKey, SnapshotStore, StoreError};

/// Fallback timestamp when formatting fails
const FALLBACK_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

pub(crate) fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_TIMESTAMP.to_string())
}

/// Calendar day of a `YYYY-MM-DD` or RFC 3339 string.
#[must_use]
pub fn parse_day(raw: &str) -> Option<Date> {
    lieferlern_qlearn::parse_record_date(raw).map(|ts| ts.date())
}
