//! Batch training over historical performance records.
//!
//! Records are replayed in date order; each one is a single transition whose
//! next state is the same supplier's following record. The write lock is
//! taken per record, so a cancelled run leaves a consistent table behind.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use lieferlern_core::{Discretizer, Normalizer, PerformanceRecord, State};
use rand::Rng;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::agent::QAgent;
use crate::error::Result;
use crate::reward::{reward, shaped_reward, RewardConfig};
use crate::telemetry::debug_event;
use crate::warn_event;

/// Mean, min and max of the rewards seen during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Default)]
struct RewardAccumulator {
    sum: f64,
    min: f64,
    max: f64,
    count: u64,
}

impl RewardAccumulator {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.count += 1;
    }

    fn finish(&self) -> RewardStats {
        if self.count == 0 {
            return RewardStats::default();
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = self.sum / self.count as f64;
        RewardStats {
            mean,
            min: self.min,
            max: self.max,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub suppliers_processed: usize,
    pub updates_applied: u64,
    /// Malformed records, plus whatever the caller adds for upstream failures.
    pub records_skipped: usize,
    pub iterations: u32,
    pub reward: RewardStats,
    pub cancelled: bool,
}

/// A validated record, ready to replay.
#[derive(Debug, Clone)]
struct Transition {
    supplier_id: u64,
    at: OffsetDateTime,
    state: State,
    next_state: State,
    base_reward: f64,
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_record_date(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

#[derive(Debug, Clone, Default)]
pub struct Trainer {
    normalizer: Normalizer,
    discretizer: Discretizer,
    reward: RewardConfig,
}

impl Trainer {
    pub fn new(
        normalizer: Normalizer,
        discretizer: Discretizer,
        reward: RewardConfig,
    ) -> Result<Self> {
        reward.validate()?;
        Ok(Self {
            normalizer,
            discretizer,
            reward,
        })
    }

    pub fn train<R: Rng>(
        &self,
        agent: &mut QAgent<R>,
        records: &[PerformanceRecord],
        iterations: u32,
    ) -> Result<TrainingSummary> {
        self.train_until(agent, records, iterations, &AtomicBool::new(false))
    }

    /// Like [`Trainer::train`], stopping between records once `cancel` is set.
    pub fn train_until<R: Rng>(
        &self,
        agent: &mut QAgent<R>,
        records: &[PerformanceRecord],
        iterations: u32,
        cancel: &AtomicBool,
    ) -> Result<TrainingSummary> {
        let (transitions, skipped) = self.prepare(records);
        let mut summary = TrainingSummary {
            records_skipped: skipped,
            ..TrainingSummary::default()
        };
        if transitions.is_empty() {
            return Ok(summary);
        }

        let iterations = iterations.max(1);
        summary.iterations = iterations;
        summary.suppliers_processed = transitions
            .iter()
            .map(|t| t.supplier_id)
            .collect::<BTreeSet<_>>()
            .len();

        let config = *agent.config();
        let mut rewards = RewardAccumulator::default();
        'outer: for i in 0..iterations {
            let decay = 1.0 - f64::from(i) / f64::from(iterations);
            let epsilon = (config.exploration_rate * decay).max(config.min_exploration_rate);
            for t in &transitions {
                if cancel.load(Ordering::Relaxed) {
                    summary.cancelled = true;
                    break 'outer;
                }
                let action = agent.select(&t.state, epsilon)?;
                let r = shaped_reward(t.base_reward, &t.state, action, &self.reward);
                agent.learn(&t.state, action, r, &t.next_state)?;
                summary.updates_applied += 1;
                rewards.push(r);
            }
            debug_event!(
                "training iteration {}/{} done (epsilon {:.3})",
                i + 1,
                iterations,
                epsilon
            );
        }
        summary.reward = rewards.finish();
        Ok(summary)
    }

    /// Validates, scores and orders the records. Returns the transitions and
    /// the number of records that were skipped.
    fn prepare(&self, records: &[PerformanceRecord]) -> (Vec<Transition>, usize) {
        let mut skipped = 0;
        let mut transitions = Vec::with_capacity(records.len());
        for record in records {
            let Some(at) = parse_record_date(&record.date) else {
                warn_event!(
                    "skipping record for supplier {}: unparseable date {:?}",
                    record.supplier_id,
                    record.date
                );
                skipped += 1;
                continue;
            };
            if let Err(e) = record.snapshot.validate() {
                warn_event!("skipping record for supplier {}: {}", record.supplier_id, e);
                skipped += 1;
                continue;
            }
            let metrics = self.normalizer.from_snapshot(&record.snapshot);
            let state = self.discretizer.discretize(&metrics);
            let signals = record.snapshot.signals();
            transitions.push(Transition {
                supplier_id: record.supplier_id,
                at,
                state,
                next_state: state,
                base_reward: reward(&metrics, Some(&signals), &self.reward),
            });
        }

        transitions.sort_by_key(|t| t.at);

        let mut following: HashMap<u64, State> = HashMap::new();
        for t in transitions.iter_mut().rev() {
            if let Some(next) = following.get(&t.supplier_id) {
                t.next_state = *next;
            }
            following.insert(t.supplier_id, t.state);
        }
        (transitions, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningConfig;
    use crate::qtable::{ExportFilter, QTable};
    use lieferlern_core::PerformanceSnapshot;
    use std::sync::Arc;

    fn agent() -> QAgent {
        QAgent::seeded(Arc::new(QTable::new()), LearningConfig::default(), 11).expect("agent")
    }

    fn record(supplier_id: u64, date: &str, on_time: f64) -> PerformanceRecord {
        PerformanceRecord {
            supplier_id,
            date: date.into(),
            snapshot: PerformanceSnapshot {
                on_time_delivery_rate: Some(on_time),
                quality_score: Some(8.0),
                ..PerformanceSnapshot::default()
            },
        }
    }

    #[test]
    fn empty_input_yields_zero_summary() {
        let mut agent = agent();
        let summary = Trainer::default().train(&mut agent, &[], 10).expect("train");
        assert_eq!(summary, TrainingSummary::default());
        assert!(agent.table().is_empty().expect("is_empty"));
    }

    #[test]
    fn dates_in_both_formats_parse() {
        assert!(parse_record_date("2024-02-29").is_some());
        assert!(parse_record_date("2024-02-29T12:30:00Z").is_some());
        assert!(parse_record_date("2024-02-30").is_none());
        assert!(parse_record_date("yesterday").is_none());
    }

    #[test]
    fn malformed_records_are_counted_not_fatal() {
        let mut agent = agent();
        let mut bad = record(2, "2024-01-02", 90.0);
        bad.snapshot.fill_rate = Some(f64::INFINITY);
        let records = vec![
            record(1, "2024-01-01", 95.0),
            record(1, "not a date", 95.0),
            bad,
        ];
        let summary = Trainer::default().train(&mut agent, &records, 3).expect("train");
        assert_eq!(summary.records_skipped, 2);
        assert_eq!(summary.suppliers_processed, 1);
        assert_eq!(summary.updates_applied, 3);
        assert_eq!(summary.iterations, 3);
    }

    #[test]
    fn zero_iterations_runs_once() {
        let mut agent = agent();
        let records = vec![record(1, "2024-01-01", 95.0), record(2, "2024-01-01", 60.0)];
        let summary = Trainer::default().train(&mut agent, &records, 0).expect("train");
        assert_eq!(summary.iterations, 1);
        assert_eq!(summary.updates_applied, 2);
        let total: u64 = agent
            .table()
            .export(&ExportFilter::default())
            .expect("export")
            .iter()
            .map(|e| e.update_count)
            .sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn next_state_is_same_suppliers_following_record() {
        let trainer = Trainer::default();
        let records = vec![
            record(1, "2024-01-03", 10.0),
            record(2, "2024-01-02", 95.0),
            record(1, "2024-01-01", 95.0),
        ];
        let (transitions, skipped) = trainer.prepare(&records);
        assert_eq!(skipped, 0);
        let ids: Vec<u64> = transitions.iter().map(|t| t.supplier_id).collect();
        assert_eq!(ids, vec![1, 2, 1]);
        // supplier 1 moves from a good to a poor delivery state
        assert_ne!(transitions[0].state, transitions[2].state);
        assert_eq!(transitions[0].next_state, transitions[2].state);
        // last record of a supplier points at itself
        assert_eq!(transitions[1].next_state, transitions[1].state);
        assert_eq!(transitions[2].next_state, transitions[2].state);
    }

    #[test]
    fn cancellation_stops_before_any_update() {
        let mut agent = agent();
        let records = vec![record(1, "2024-01-01", 95.0)];
        let cancel = AtomicBool::new(true);
        let summary = Trainer::default()
            .train_until(&mut agent, &records, 5, &cancel)
            .expect("train");
        assert!(summary.cancelled);
        assert_eq!(summary.updates_applied, 0);
        assert!(agent.table().is_empty().expect("is_empty"));
    }

    #[test]
    fn reward_stats_stay_in_range() {
        let mut agent = agent();
        let records: Vec<_> = (1..=9)
            .map(|d| record(d, &format!("2024-01-0{d}"), 50.0 + 5.0 * d as f64))
            .collect();
        let summary = Trainer::default().train(&mut agent, &records, 20).expect("train");
        assert_eq!(summary.updates_applied, 180);
        assert!(summary.reward.min <= summary.reward.mean);
        assert!(summary.reward.mean <= summary.reward.max);
        assert!((0.0..=10.0).contains(&summary.reward.min));
        assert!((0.0..=10.0).contains(&summary.reward.max));
    }
}
