//! Ranking event log and reward statistics.
//!
//! The engine records what it did (feedback processed, ranking produced,
//! training finished, errors) in a bounded in-memory log. The statistics
//! below aggregate rewards from that log per action for retrospective
//! analysis.

use std::collections::{BTreeMap, VecDeque};

use lieferlern_core::{Action, State};
use serde::{Deserialize, Serialize};

/// Default number of events kept before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    FeedbackProcessed,
    RecommendationMade,
    TrainingCompleted,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEvent {
    /// RFC 3339 timestamp.
    pub ts: String,
    pub kind: EventKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<f64>,
}

impl RankingEvent {
    #[must_use]
    pub fn new(kind: EventKind, description: impl Into<String>) -> Self {
        Self {
            ts: crate::iso8601_now(),
            kind,
            description: description.into(),
            supplier_id: None,
            product_id: None,
            state: None,
            action: None,
            reward: None,
        }
    }
}

/// Ring buffer of the most recent events.
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    events: VecDeque<RankingEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventLog {
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(DEFAULT_EVENT_CAPACITY)),
        }
    }

    pub fn record(&mut self, event: RankingEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Up to `limit` events, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<RankingEvent> {
        self.events.iter().rev().take(limit).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankingEvent> {
        self.events.iter()
    }
}

/// Reward figures for one group of events.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardStatistics {
    /// Number of events that carried a finite reward.
    pub count: usize,
    pub total_reward: f64,
    pub min_reward: f64,
    pub max_reward: f64,
}

impl RewardStatistics {
    fn push(&mut self, reward: f64) {
        if self.count == 0 {
            self.min_reward = reward;
            self.max_reward = reward;
        } else {
            self.min_reward = self.min_reward.min(reward);
            self.max_reward = self.max_reward.max(reward);
        }
        self.count += 1;
        self.total_reward += reward;
    }

    #[must_use]
    pub fn average_reward(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_reward / self.count as f64
        }
    }

    /// Rewards of feedback events, grouped by the action that was taken.
    #[must_use]
    pub fn by_action<'a>(
        events: impl IntoIterator<Item = &'a RankingEvent>,
    ) -> BTreeMap<Action, RewardStatistics> {
        let mut stats: BTreeMap<Action, RewardStatistics> = BTreeMap::new();
        for event in events {
            if event.kind != EventKind::FeedbackProcessed {
                continue;
            }
            if let (Some(action), Some(reward)) = (event.action, event.reward) {
                if reward.is_finite() {
                    stats.entry(action).or_default().push(reward);
                }
            }
        }
        stats
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn feedback(action: Action, reward: f64) -> RankingEvent {
        RankingEvent {
            action: Some(action),
            reward: Some(reward),
            ..RankingEvent::new(EventKind::FeedbackProcessed, "feedback")
        }
    }

    #[test]
    fn log_drops_oldest_beyond_capacity() {
        let mut log = EventLog::with_capacity(2);
        log.record(RankingEvent::new(EventKind::Error, "first"));
        log.record(RankingEvent::new(EventKind::Error, "second"));
        log.record(RankingEvent::new(EventKind::Error, "third"));
        assert_eq!(log.len(), 2);
        let recent = log.recent(10);
        assert_eq!(recent[0].description, "third");
        assert_eq!(recent[1].description, "second");
    }

    #[test]
    fn statistics_group_by_action() {
        let events = vec![
            feedback(Action::RankTier1, 8.0),
            feedback(Action::RankTier1, 6.0),
            feedback(Action::Explore, 5.0),
            feedback(Action::Explore, f64::NAN),
            RankingEvent::new(EventKind::TrainingCompleted, "done"),
        ];
        let stats = RewardStatistics::by_action(&events);
        assert_eq!(stats.len(), 2);
        let tier1 = &stats[&Action::RankTier1];
        assert_eq!(tier1.count, 2);
        assert!((tier1.average_reward() - 7.0).abs() < 1e-12);
        assert!((tier1.min_reward - 6.0).abs() < 1e-12);
        assert!((tier1.max_reward - 8.0).abs() < 1e-12);
        assert_eq!(stats[&Action::Explore].count, 1);
    }

    #[test]
    fn empty_statistics_average_to_zero() {
        assert_eq!(RewardStatistics::default().average_reward(), 0.0);
    }

    #[test]
    fn event_kind_serializes_upper_snake() {
        let json = serde_json::to_string(&EventKind::FeedbackProcessed).expect("serialize");
        assert_eq!(json, "\"FEEDBACK_PROCESSED\"");
    }
}
