//! The engine facade an API layer talks to.
//!
//! [`RankingEngine`] wires normalizer, discretizer, Q-table, agent, trainer
//! and aggregator to the upstream collaborators. Every operation takes
//! `&self`; the Q-table is the only shared learned state and carries its own
//! lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use lieferlern_core::{
    Action, CoreError, Discretizer, FeedbackEvent, MetricVector, Normalizer, PerformanceSnapshot,
    RankingRecord, State,
};
use lieferlern_qlearn::{
    reward, shaped_reward, ActionValue, Candidate, ExportFilter, QAgent, QEntry, QLearnError,
    QTable, RankingAggregator, Trainer, TrainingSummary,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

use crate::config::EngineConfig;
use crate::error::{upstream, EngineError, Result};
use crate::events::{EventKind, EventLog, RankingEvent, RewardStatistics};
use crate::source::{
    blend_snapshots, summarize_transactions, CategoryPerformance, PerformanceSource,
    SupplierDirectory, SupplierInfo, TransactionQuery,
};
use crate::store::{MemorySnapshotStore, RankingSnapshot, SnapshotKey, SnapshotStore};
use crate::telemetry::{info_event, warn_event};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    pub supplier_id: u64,
    pub supplier_name: String,
    pub product_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub state: State,
    pub action: Action,
    /// Reward before tier shaping.
    pub base_reward: f64,
    /// Reward that was applied to the Q-table.
    pub reward: f64,
    pub q_value: f64,
    pub scores: MetricVector,
    pub overall_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResponse {
    pub product_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub as_of: String,
    pub suppliers: Vec<RankingRecord>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingRequest {
    /// Falls back to the configured default.
    pub iterations: Option<u32>,
    /// All known suppliers when absent.
    pub supplier_ids: Option<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QValuesResponse {
    pub supplier_id: u64,
    pub supplier_name: String,
    pub state: State,
    pub best_action: Action,
    pub q_values: Vec<ActionValue>,
    pub scores: MetricVector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTableExport {
    pub entries: Vec<QEntry>,
    /// Rows returned after filtering and limit.
    pub count: usize,
    /// Rows in the whole table.
    pub total_entries: usize,
}

pub struct RankingEngine<P, D, S = MemorySnapshotStore> {
    config: EngineConfig,
    table: Arc<QTable>,
    agent: Mutex<QAgent>,
    seeder: Mutex<StdRng>,
    normalizer: Normalizer,
    discretizer: Discretizer,
    aggregator: RankingAggregator,
    trainer: Trainer,
    source: P,
    directory: D,
    store: S,
    events: Mutex<EventLog>,
    /// Cancel tokens of the training runs in progress.
    active_runs: Mutex<Vec<Arc<AtomicBool>>>,
}

fn poisoned(what: &'static str) -> EngineError {
    EngineError::Learning(QLearnError::Internal(what))
}

/// First day of a lookback window of `days` ending at `now`.
fn lookback_start(now: OffsetDateTime, days: u32) -> Option<Date> {
    now.checked_sub(Duration::days(i64::from(days)))
        .map(|start| start.date())
}

impl<P, D, S> RankingEngine<P, D, S>
where
    P: PerformanceSource,
    D: SupplierDirectory,
    S: SnapshotStore,
{
    /// Engine over a fresh, empty Q-table.
    pub fn new(config: EngineConfig, source: P, directory: D, store: S) -> Result<Self> {
        Self::with_table(config, Arc::new(QTable::new()), source, directory, store)
    }

    /// Engine over an existing table, e.g. one restored from disk.
    pub fn with_table(
        config: EngineConfig,
        table: Arc<QTable>,
        source: P,
        directory: D,
        store: S,
    ) -> Result<Self> {
        config.validate()?;
        let normalizer = Normalizer::new(config.normalizer)?;
        let discretizer = Discretizer::new(config.discretizer)?;
        let trainer = Trainer::new(normalizer, discretizer, config.reward)?;
        let aggregator = RankingAggregator::new(config.reward.weights, discretizer);

        let mut seeder = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let agent = QAgent::seeded(Arc::clone(&table), config.learning, seeder.gen())?;

        Ok(Self {
            events: Mutex::new(EventLog::with_capacity(config.event_log_capacity)),
            config,
            table,
            agent: Mutex::new(agent),
            seeder: Mutex::new(seeder),
            normalizer,
            discretizer,
            aggregator,
            trainer,
            source,
            directory,
            store,
            active_runs: Mutex::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn table(&self) -> &Arc<QTable> {
        &self.table
    }

    fn agent(&self) -> Result<MutexGuard<'_, QAgent>> {
        self.agent.lock().map_err(|_| poisoned("agent lock poisoned"))
    }

    fn record(&self, event: RankingEvent) {
        match self.events.lock() {
            Ok(mut log) => log.record(event),
            Err(_) => warn_event!("event log lock poisoned, dropping {:?}", event.kind),
        }
    }

    fn since(&self) -> Result<String> {
        let days = self.config.lookback_days;
        lookback_start(OffsetDateTime::now_utc(), days)
            .map(|day| day.to_string())
            .ok_or_else(|| {
                QLearnError::Config {
                    field: "lookback_days",
                    reason: format!("{days} days reach before the earliest representable date"),
                }
                .into()
            })
    }

    fn require_supplier(&self, supplier_id: u64) -> Result<SupplierInfo> {
        self.directory
            .supplier(supplier_id)
            .map_err(upstream(Some(supplier_id)))?
            .ok_or(EngineError::NotFound {
                kind: "supplier",
                id: supplier_id,
            })
    }

    /// Recorded summary blended with figures from raw transactions. A failed
    /// transaction fetch degrades to the summary alone.
    fn current_snapshot(&self, supplier_id: u64, since: &str) -> Result<PerformanceSnapshot> {
        let recorded = self
            .source
            .performance_summary(supplier_id, since)
            .map_err(upstream(Some(supplier_id)))?;
        let query = TransactionQuery {
            since: Some(since.to_string()),
            ..TransactionQuery::default()
        };
        let snapshot = match self.source.transactions(supplier_id, &query) {
            Ok(transactions) if !transactions.is_empty() => {
                blend_snapshots(&recorded, &summarize_transactions(&transactions))
            }
            Ok(_) => recorded,
            Err(e) => {
                warn_event!("transactions for supplier {} unavailable: {}", supplier_id, e);
                recorded
            }
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Learns from one feedback event: validate, score, discretize, pick an
    /// action, apply the shaped reward.
    ///
    /// Validation and supplier lookup happen before the table is touched.
    pub fn submit_feedback(&self, event: &FeedbackEvent) -> Result<FeedbackOutcome> {
        event.validate()?;
        let supplier = self.require_supplier(event.supplier_id)?;

        let scores = self.normalizer.from_feedback(event)?;
        let state = self.discretizer.discretize(&scores);
        let base_reward = reward(&scores, Some(&event.signals()), &self.config.reward);

        let (action, applied, q_value) = {
            let mut agent = self.agent()?;
            let action = agent.select(&state, self.config.learning.exploration_rate)?;
            let applied = shaped_reward(base_reward, &state, action, &self.config.reward);
            let q_value = agent.learn(&state, action, applied, &state)?;
            (action, applied, q_value)
        };

        info_event!(
            "feedback for supplier {}: {} / {} reward {:.3} q {:.3}",
            event.supplier_id,
            state,
            action,
            applied,
            q_value
        );
        self.record(RankingEvent {
            supplier_id: Some(event.supplier_id),
            product_id: Some(event.product_id),
            state: Some(state),
            action: Some(action),
            reward: Some(applied),
            ..RankingEvent::new(
                EventKind::FeedbackProcessed,
                format!("Q-value updated via feedback for supplier {}", event.supplier_id),
            )
        });

        Ok(FeedbackOutcome {
            supplier_id: event.supplier_id,
            supplier_name: supplier.name,
            product_id: event.product_id,
            city: event.city.clone(),
            state,
            action,
            base_reward,
            reward: applied,
            q_value,
            overall_score: self.config.reward.weights.blend(&scores),
            scores,
        })
    }

    /// Ranks the suppliers of a product, optionally within one city.
    ///
    /// Suppliers whose performance data cannot be fetched are skipped.
    pub fn ranking(&self, product_id: u64, city: Option<&str>) -> Result<RankingResponse> {
        if product_id == 0 {
            return Err(CoreError::MissingField("product_id").into());
        }
        let city = city.map(str::trim).filter(|c| !c.is_empty());
        let suppliers = self
            .directory
            .suppliers_for_product(product_id)
            .map_err(upstream(None))?;
        let since = self.since()?;

        let mut candidates = Vec::with_capacity(suppliers.len());
        for supplier in suppliers {
            if let Some(wanted) = city {
                let matches = supplier
                    .city
                    .as_deref()
                    .is_some_and(|c| c.trim().eq_ignore_ascii_case(wanted));
                if !matches {
                    continue;
                }
            }
            match self.current_snapshot(supplier.id, &since) {
                Ok(snapshot) => candidates.push(Candidate {
                    supplier_id: supplier.id,
                    supplier_name: supplier.name,
                    city: supplier.city,
                    scores: self.normalizer.from_snapshot(&snapshot),
                }),
                Err(e) => {
                    warn_event!("skipping supplier {} in ranking: {}", supplier.id, e);
                    self.record(RankingEvent {
                        supplier_id: Some(supplier.id),
                        product_id: Some(product_id),
                        ..RankingEvent::new(EventKind::Error, e.to_string())
                    });
                }
            }
        }

        let as_of = crate::iso8601_now();
        let ranked = self
            .aggregator
            .rank(&self.table, product_id, city, candidates, &as_of)?;
        self.record(RankingEvent {
            product_id: Some(product_id),
            ..RankingEvent::new(
                EventKind::RecommendationMade,
                format!("ranked {} suppliers", ranked.len()),
            )
        });
        Ok(RankingResponse {
            product_id,
            city: city.map(str::to_string),
            as_of,
            count: ranked.len(),
            suppliers: ranked,
        })
    }

    /// Replays the suppliers' performance history through the trainer.
    ///
    /// Suppliers whose history cannot be fetched count as skipped records.
    /// The run gets its own cancel token; [`RankingEngine::cancel_training`]
    /// reaches it while it is in progress.
    pub fn train(&self, request: &TrainingRequest) -> Result<TrainingSummary> {
        let token = Arc::new(AtomicBool::new(false));
        self.active_runs
            .lock()
            .map_err(|_| poisoned("training registry lock poisoned"))?
            .push(Arc::clone(&token));
        let result = self.train_with(request, &token);
        match self.active_runs.lock() {
            Ok(mut runs) => runs.retain(|t| !Arc::ptr_eq(t, &token)),
            Err(_) => warn_event!("training registry lock poisoned, run not unregistered"),
        }
        result
    }

    /// Like [`RankingEngine::train`] with a caller-owned cancel token. The
    /// run stops between records once `cancel` is set, including before the
    /// first one.
    pub fn train_with(
        &self,
        request: &TrainingRequest,
        cancel: &AtomicBool,
    ) -> Result<TrainingSummary> {
        let iterations = request
            .iterations
            .unwrap_or(self.config.default_training_iterations);
        if iterations > self.config.max_training_iterations {
            return Err(CoreError::OutOfRange {
                field: "iterations",
                value: f64::from(iterations),
            }
            .into());
        }
        let supplier_ids: Vec<u64> = match &request.supplier_ids {
            Some(ids) => ids.clone(),
            None => self
                .directory
                .all_suppliers()
                .map_err(upstream(None))?
                .into_iter()
                .map(|s| s.id)
                .collect(),
        };

        let since = self.since()?;
        let mut records = Vec::new();
        let mut failed = 0;
        for id in &supplier_ids {
            match self.source.performance_records(*id, &since) {
                Ok(history) => records.extend(history),
                Err(e) => {
                    warn_event!("no training history for supplier {}: {}", id, e);
                    failed += 1;
                }
            }
        }

        let seed = self
            .seeder
            .lock()
            .map_err(|_| poisoned("seeder lock poisoned"))?
            .gen();
        let mut agent = QAgent::seeded(Arc::clone(&self.table), self.config.learning, seed)?;
        let mut summary = self
            .trainer
            .train_until(&mut agent, &records, iterations, cancel)?;
        summary.records_skipped += failed;

        info_event!(
            "training finished: {} updates over {} suppliers, {} skipped",
            summary.updates_applied,
            summary.suppliers_processed,
            summary.records_skipped
        );
        self.record(RankingEvent {
            reward: Some(summary.reward.mean),
            ..RankingEvent::new(
                EventKind::TrainingCompleted,
                format!(
                    "{} updates, {} iterations{}",
                    summary.updates_applied,
                    summary.iterations,
                    if summary.cancelled { ", cancelled" } else { "" }
                ),
            )
        });
        Ok(summary)
    }

    /// Asks every [`RankingEngine::train`] run in progress to stop after its
    /// current record. Runs started later are unaffected. Returns the number
    /// of runs signalled.
    pub fn cancel_training(&self) -> usize {
        match self.active_runs.lock() {
            Ok(runs) => {
                for token in runs.iter() {
                    token.store(true, Ordering::SeqCst);
                }
                runs.len()
            }
            Err(_) => {
                warn_event!("training registry lock poisoned, nothing cancelled");
                0
            }
        }
    }

    /// Current state of a supplier and the value of every action in it.
    pub fn q_values(&self, supplier_id: u64) -> Result<QValuesResponse> {
        let supplier = self.require_supplier(supplier_id)?;
        let snapshot = self.current_snapshot(supplier_id, &self.since()?)?;
        let scores = self.normalizer.from_snapshot(&snapshot);
        let state = self.discretizer.discretize(&scores);
        let (best_action, _) = self.table.best_action(&state)?;
        Ok(QValuesResponse {
            supplier_id,
            supplier_name: supplier.name,
            state,
            best_action,
            q_values: self.table.entries_for(&state)?,
            scores,
        })
    }

    pub fn categories(&self, supplier_id: u64) -> Result<Vec<CategoryPerformance>> {
        self.require_supplier(supplier_id)?;
        self.source
            .category_performance(supplier_id)
            .map_err(upstream(Some(supplier_id)))
    }

    pub fn export(&self, filter: &ExportFilter) -> Result<QTableExport> {
        let entries = self.table.export(filter)?;
        Ok(QTableExport {
            count: entries.len(),
            total_entries: self.table.len()?,
            entries,
        })
    }

    /// Stores `response` under its product, city and the date of `as_of`.
    pub fn store_snapshot(&self, response: &RankingResponse) -> Result<RankingSnapshot> {
        let date = crate::parse_day(&response.as_of)
            .ok_or_else(|| CoreError::InvalidTimestamp {
                field: "as_of",
                value: response.as_of.clone(),
            })?
            .to_string();
        let snapshot = RankingSnapshot {
            product_id: response.product_id,
            city: response.city.clone(),
            date,
            suppliers: response.suppliers.clone(),
        };
        self.store.put(snapshot.clone())?;
        Ok(snapshot)
    }

    pub fn snapshot(
        &self,
        product_id: u64,
        city: Option<&str>,
        date: &str,
    ) -> Result<RankingSnapshot> {
        self.store
            .get(&SnapshotKey::new(product_id, city, date))?
            .ok_or(EngineError::NotFound {
                kind: "ranking snapshot for product",
                id: product_id,
            })
    }

    /// Up to `limit` events, newest first.
    pub fn events(&self, limit: usize) -> Result<Vec<RankingEvent>> {
        Ok(self
            .events
            .lock()
            .map_err(|_| poisoned("event log lock poisoned"))?
            .recent(limit))
    }

    pub fn reward_statistics(&self) -> Result<BTreeMap<Action, RewardStatistics>> {
        let log = self
            .events
            .lock()
            .map_err(|_| poisoned("event log lock poisoned"))?;
        Ok(RewardStatistics::by_action(log.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn lookback_start_counts_back_whole_days() {
        let now = datetime!(2024-03-10 08:30 UTC);
        assert_eq!(lookback_start(now, 90).map(|d| d.to_string()).as_deref(), Some("2023-12-11"));
        assert_eq!(lookback_start(now, 0).map(|d| d.to_string()).as_deref(), Some("2024-03-10"));
    }

    #[test]
    fn lookback_start_overflow_is_none() {
        let now = datetime!(2024-03-10 08:30 UTC);
        assert_eq!(lookback_start(now, u32::MAX), None);
    }
}
