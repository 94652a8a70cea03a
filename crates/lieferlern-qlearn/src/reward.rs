//! Reward computation.
//!
//! [`reward`] turns sub-scores and penalty signals into a scalar in `[0, 10]`.
//! [`shaped_reward`] blends that base with how well the chosen tier fits the
//! state, which is what lets different actions learn different values.

use lieferlern_core::{Action, FeedbackSignals, MetricVector, ScoreWeights, State};
use serde::{Deserialize, Serialize};

use crate::error::{QLearnError, Result};

const REWARD_MAX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub weights: ScoreWeights,
    /// Reward lost per reported issue.
    pub issue_penalty: f64,
    /// Order accuracy below this fraction is penalized.
    pub accuracy_floor: f64,
    /// Reward lost per unit of accuracy below the floor.
    pub accuracy_penalty: f64,
    /// Share of the shaped reward that comes from tier fit, in `[0, 1]`.
    pub shaping_weight: f64,
    /// Tier fit credited to `EXPLORE`.
    pub explore_fit: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            issue_penalty: 0.5,
            accuracy_floor: 0.9,
            accuracy_penalty: 20.0,
            shaping_weight: 0.5,
            explore_fit: 5.0,
        }
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        for (field, value) in [
            ("issue_penalty", self.issue_penalty),
            ("accuracy_penalty", self.accuracy_penalty),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(QLearnError::config(field, format!("must be >= 0, got {value}")));
            }
        }
        for (field, value) in [
            ("accuracy_floor", self.accuracy_floor),
            ("shaping_weight", self.shaping_weight),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(QLearnError::config(
                    field,
                    format!("must be in [0, 1], got {value}"),
                ));
            }
        }
        if !self.explore_fit.is_finite() || !(0.0..=REWARD_MAX).contains(&self.explore_fit) {
            return Err(QLearnError::config(
                "explore_fit",
                format!("must be in [0, 10], got {}", self.explore_fit),
            ));
        }
        Ok(())
    }
}

/// Base reward in `[0, 10]`: weighted sub-scores minus issue and accuracy
/// penalties.
#[must_use]
pub fn reward(
    metrics: &MetricVector,
    signals: Option<&FeedbackSignals>,
    cfg: &RewardConfig,
) -> f64 {
    let mut value = cfg.weights.blend(metrics);
    if let Some(signals) = signals {
        if let Some(issues) = signals.issues {
            value -= f64::from(issues) * cfg.issue_penalty;
        }
        if let Some(accuracy) = signals.order_accuracy {
            if accuracy < cfg.accuracy_floor {
                value -= (cfg.accuracy_floor - accuracy) * cfg.accuracy_penalty;
            }
        }
    }
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, REWARD_MAX)
    }
}

/// Tier a state "deserves": strong states map to low tiers.
#[must_use]
pub fn expected_tier(state: &State) -> u8 {
    let mean = state.mean_level().round();
    // mean is within 1..=5, so the cast cannot truncate
    (6.0 - mean).clamp(1.0, 5.0) as u8
}

/// How well `action` fits `state`, on the reward scale.
#[must_use]
pub fn tier_fit(state: &State, action: Action, cfg: &RewardConfig) -> f64 {
    match action.tier() {
        Some(tier) => {
            let distance = f64::from(tier.abs_diff(expected_tier(state)));
            REWARD_MAX * (1.0 - distance / 4.0)
        }
        None => cfg.explore_fit,
    }
}

/// `(1 − w)·base + w·tier_fit`.
#[must_use]
pub fn shaped_reward(base: f64, state: &State, action: Action, cfg: &RewardConfig) -> f64 {
    let w = cfg.shaping_weight;
    ((1.0 - w) * base + w * tier_fit(state, action, cfg)).clamp(0.0, REWARD_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> (MetricVector, FeedbackSignals) {
        (
            MetricVector::new(8.0, 7.0, 7.0, 10.0),
            FeedbackSignals {
                order_accuracy: Some(0.95),
                issues: Some(0),
            },
        )
    }

    #[test]
    fn scenario_reward_is_overall_score() {
        let (metrics, signals) = scenario();
        let r = reward(&metrics, Some(&signals), &RewardConfig::default());
        assert!((r - 8.0).abs() < 1e-9);
    }

    #[test]
    fn penalties_reduce_reward() {
        let (metrics, _) = scenario();
        let cfg = RewardConfig::default();
        let signals = FeedbackSignals {
            order_accuracy: Some(0.8),
            issues: Some(2),
        };
        // 8.0 - 2*0.5 - 0.1*20
        let r = reward(&metrics, Some(&signals), &cfg);
        assert!((r - 5.0).abs() < 1e-9);
    }

    #[test]
    fn reward_stays_in_range() {
        let cfg = RewardConfig::default();
        let worst = FeedbackSignals {
            order_accuracy: Some(0.0),
            issues: Some(50),
        };
        assert_eq!(reward(&MetricVector::new(0.0, 0.0, 0.0, 0.0), Some(&worst), &cfg), 0.0);
        assert_eq!(reward(&MetricVector::new(10.0, 10.0, 10.0, 10.0), None, &cfg), 10.0);
    }

    #[test]
    fn expected_tier_tracks_mean_level() {
        let top = State::from_levels(5, 5, 5, 5).expect("valid");
        let bottom = State::from_levels(1, 1, 1, 1).expect("valid");
        let mid = State::from_levels(3, 3, 3, 5).expect("valid");
        assert_eq!(expected_tier(&top), 1);
        assert_eq!(expected_tier(&bottom), 5);
        // mean 3.5 rounds to 4
        assert_eq!(expected_tier(&mid), 2);
    }

    #[test]
    fn fitting_tier_earns_more() {
        let cfg = RewardConfig::default();
        let state = State::from_levels(5, 5, 5, 5).expect("valid");
        let good = shaped_reward(8.0, &state, Action::RankTier1, &cfg);
        let bad = shaped_reward(8.0, &state, Action::RankTier5, &cfg);
        let explore = shaped_reward(8.0, &state, Action::Explore, &cfg);
        assert!((good - 9.0).abs() < 1e-9);
        assert!((bad - 4.0).abs() < 1e-9);
        assert!((explore - 6.5).abs() < 1e-9);
    }

    #[test]
    fn zero_shaping_weight_keeps_base() {
        let cfg = RewardConfig {
            shaping_weight: 0.0,
            ..RewardConfig::default()
        };
        let state = State::from_levels(1, 1, 1, 1).expect("valid");
        for action in Action::ALL {
            assert!((shaped_reward(6.5, &state, action, &cfg) - 6.5).abs() < 1e-12);
        }
    }

    #[test]
    fn invalid_config_names_field() {
        let cfg = RewardConfig {
            shaping_weight: 1.5,
            ..RewardConfig::default()
        };
        assert_eq!(cfg.validate().unwrap_err().field(), Some("shaping_weight"));
        let cfg = RewardConfig {
            weights: ScoreWeights {
                quality: 0.0,
                delivery: 0.0,
                price: 0.0,
                service: 0.0,
            },
            ..RewardConfig::default()
        };
        assert_eq!(cfg.validate().unwrap_err().field(), Some("weights"));
    }
}
