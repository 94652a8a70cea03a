//! ε-greedy agent over the shared Q-table.
//!
//! The agent owns an injected random source so that exploration is
//! reproducible in tests (`StdRng::seed_from_u64`) and entropy-seeded in
//! production.

use std::sync::Arc;

use lieferlern_core::{Action, Decision, Policy, State};
use rand::prelude::*;
use rand::seq::SliceRandom;
use serde_json::Value;

use crate::config::LearningConfig;
use crate::error::{QLearnError, Result};
use crate::qtable::{ActionValue, QTable, QTableSnapshot};
use crate::warn_event;

#[derive(Debug)]
pub struct QAgent<R: Rng = StdRng> {
    table: Arc<QTable>,
    config: LearningConfig,
    rng: R,
}

impl QAgent<StdRng> {
    /// Agent with an entropy-seeded RNG.
    pub fn from_entropy(table: Arc<QTable>, config: LearningConfig) -> Result<Self> {
        Self::new(table, config, StdRng::from_entropy())
    }

    /// Agent with a fixed seed, for reproducible runs.
    pub fn seeded(table: Arc<QTable>, config: LearningConfig, seed: u64) -> Result<Self> {
        Self::new(table, config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> QAgent<R> {
    pub fn new(table: Arc<QTable>, config: LearningConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self { table, config, rng })
    }

    #[must_use]
    pub fn table(&self) -> &Arc<QTable> {
        &self.table
    }

    #[must_use]
    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// With probability `exploration_rate` a uniformly random action,
    /// otherwise the greedy one.
    pub fn select(&mut self, state: &State, exploration_rate: f64) -> Result<Action> {
        Ok(self.select_explained(state, exploration_rate)?.0)
    }

    fn select_explained(&mut self, state: &State, exploration_rate: f64) -> Result<(Action, bool)> {
        if self.rng.gen::<f64>() < exploration_rate {
            let action = Action::ALL
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(Action::Explore);
            return Ok((action, true));
        }
        Ok((self.table.best_action(state)?.0, false))
    }

    pub fn best(&self, state: &State) -> Result<(Action, f64)> {
        self.table.best_action(state)
    }

    pub fn explain(&self, state: &State) -> Result<Vec<ActionValue>> {
        self.table.entries_for(state)
    }

    /// One TD update with the agent's α and γ.
    pub fn learn(
        &self,
        state: &State,
        action: Action,
        reward: f64,
        next_state: &State,
    ) -> Result<f64> {
        self.table.update(
            state,
            action,
            reward,
            self.config.learning_rate,
            self.config.discount_factor,
            next_state,
        )
    }
}

impl<R: Rng> Policy for QAgent<R> {
    type Error = QLearnError;

    fn decide(&mut self, state: &State) -> Decision {
        let epsilon = self.config.exploration_rate;
        let chosen = self
            .select_explained(state, epsilon)
            .and_then(|(action, explored)| Ok((action, explored, self.table.get(state, action)?)));
        match chosen {
            Ok((action, explored, score)) => Decision {
                action,
                score,
                why: if explored {
                    "explore ε"
                } else {
                    "exploit q-table"
                }
                .into(),
                state: *state,
            },
            Err(e) => {
                warn_event!("decide fell back to EXPLORE for {}: {}", state, e);
                Decision {
                    action: Action::Explore,
                    score: 0.0,
                    why: "q-table unavailable".into(),
                    state: *state,
                }
            }
        }
    }

    fn feedback(
        &mut self,
        state: &State,
        action: Action,
        reward: f64,
        next_state: &State,
    ) -> Result<f64> {
        self.learn(state, action, reward, next_state)
    }

    fn snapshot(&self) -> Value {
        match self
            .table
            .snapshot()
            .and_then(|s| serde_json::to_value(s).map_err(QLearnError::from))
        {
            Ok(value) => value,
            Err(e) => {
                warn_event!("q-table snapshot failed: {}", e);
                Value::Null
            }
        }
    }

    fn load(&mut self, snapshot: Value) -> Result<()> {
        let snapshot: QTableSnapshot = serde_json::from_value(snapshot)?;
        self.table.load(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(seed: u64, exploration_rate: f64) -> QAgent {
        let config = LearningConfig {
            exploration_rate,
            min_exploration_rate: 0.0,
            ..LearningConfig::default()
        };
        QAgent::seeded(Arc::new(QTable::new()), config, seed).expect("valid config")
    }

    fn state() -> State {
        State::from_levels(3, 3, 3, 5).expect("valid levels")
    }

    #[test]
    fn greedy_selection_follows_table() {
        let mut agent = agent(7, 0.0);
        let s = state();
        agent.learn(&s, Action::RankTier2, 5.0, &s).expect("learn");
        for _ in 0..20 {
            assert_eq!(agent.select(&s, 0.0).expect("select"), Action::RankTier2);
        }
        let d = agent.decide(&s);
        assert_eq!(d.action, Action::RankTier2);
        assert_eq!(d.why, "exploit q-table");
        assert!(d.score > 0.0);
    }

    #[test]
    fn full_exploration_reaches_every_action() {
        let mut agent = agent(42, 1.0);
        let s = state();
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..500 {
            seen.insert(agent.select(&s, 1.0).expect("select"));
        }
        assert_eq!(seen.len(), Action::ALL.len());
        assert_eq!(agent.decide(&s).why, "explore ε");
    }

    #[test]
    fn same_seed_same_choices() {
        let s = state();
        let mut a = agent(99, 0.5);
        let mut b = agent(99, 0.5);
        let left: Vec<Action> = (0..50).map(|_| a.select(&s, 0.5).expect("select")).collect();
        let right: Vec<Action> = (0..50).map(|_| b.select(&s, 0.5).expect("select")).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn fresh_state_decides_explore() {
        let mut agent = agent(1, 0.0);
        let d = agent.decide(&state());
        assert_eq!(d.action, Action::Explore);
        assert_eq!(d.score, 0.0);
    }

    #[test]
    fn policy_snapshot_roundtrip() {
        let mut source = agent(3, 0.0);
        let s = state();
        source
            .feedback(&s, Action::RankTier1, 6.0, &s)
            .expect("feedback");
        let snap = source.snapshot();

        let mut restored = agent(4, 0.0);
        restored.load(snap).expect("load");
        assert_eq!(
            restored.best(&s).expect("best"),
            source.best(&s).expect("best")
        );
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        let mut agent = agent(5, 0.0);
        let err = agent
            .load(serde_json::json!({"entries": [{"state": "nope"}]}))
            .unwrap_err();
        assert!(matches!(err, QLearnError::Snapshot(_)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = LearningConfig {
            learning_rate: 2.0,
            ..LearningConfig::default()
        };
        assert!(QAgent::seeded(Arc::new(QTable::new()), config, 0).is_err());
    }
}
