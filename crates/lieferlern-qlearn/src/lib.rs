//! Tabellarisches Q-Learning für Lieferanten-Rankings.
//!
//! Der [`QAgent`] implementiert das [`Policy`](lieferlern_core::Policy)-Trait
//! über einer geteilten [`QTable`]. Feedback wird über die
//! [`reward`]-Funktionen in eine Belohnung übersetzt und per TD-Update
//! gelernt; der [`Trainer`] spielt historische Datensätze im Batch ab, der
//! [`RankingAggregator`] erzeugt daraus Ranglisten.

mod telemetry;

#[cfg(feature = "telemetry")]
#[doc(hidden)]
pub use tracing as __tracing;

pub mod agent;
pub mod config;
pub mod error;
pub mod qtable;
pub mod ranking;
pub mod reward;
pub mod trainer;

pub use agent::QAgent;
pub use config::LearningConfig;
pub use error::{QLearnError, Result};
pub use qtable::{ActionValue, ExportFilter, QEntry, QTable, QTableSnapshot, DEFAULT_EXPORT_LIMIT};
pub use ranking::{Candidate, RankingAggregator};
pub use reward::{expected_tier, reward, shaped_reward, tier_fit, RewardConfig};
pub use trainer::{parse_record_date, RewardStats, Trainer, TrainingSummary};
