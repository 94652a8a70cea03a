use lieferlern_core::{DiscretizerConfig, NormalizerConfig};
use lieferlern_qlearn::{LearningConfig, QLearnError, RewardConfig};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::telemetry::warn_event;

pub const ENV_LEARNING_RATE: &str = "LIEFERLERN_LEARNING_RATE";
pub const ENV_DISCOUNT_FACTOR: &str = "LIEFERLERN_DISCOUNT_FACTOR";
pub const ENV_EXPLORATION_RATE: &str = "LIEFERLERN_EXPLORATION_RATE";

/// Upper bound for `lookback_days`, roughly ten years.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// Everything the engine needs, validated once at construction.
///
/// Partial JSON is merged with the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub learning: LearningConfig,
    /// Reward shaping and the score weights shared with rankings.
    pub reward: RewardConfig,
    pub normalizer: NormalizerConfig,
    pub discretizer: DiscretizerConfig,
    /// How far back performance data is requested.
    pub lookback_days: u32,
    pub default_training_iterations: u32,
    pub max_training_iterations: u32,
    pub event_log_capacity: usize,
    /// Fixed RNG seed; entropy-seeded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            learning: LearningConfig::default(),
            reward: RewardConfig::default(),
            normalizer: NormalizerConfig::default(),
            discretizer: DiscretizerConfig::default(),
            lookback_days: 90,
            default_training_iterations: 100,
            max_training_iterations: 10_000,
            event_log_capacity: DEFAULT_EVENT_CAPACITY,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            EngineError::Learning(QLearnError::Config {
                field: "config",
                reason: e.to_string(),
            })
        })
    }

    /// Applies `LIEFERLERN_*` overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`. Unparseable values are ignored.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| -> Option<f64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Some(v),
                _ => {
                    warn_event!("ignoring {}={:?}: not a finite number", key, raw);
                    None
                }
            }
        };
        if let Some(v) = parse(ENV_LEARNING_RATE) {
            self.learning.learning_rate = v;
        }
        if let Some(v) = parse(ENV_DISCOUNT_FACTOR) {
            self.learning.discount_factor = v;
        }
        if let Some(v) = parse(ENV_EXPLORATION_RATE) {
            self.learning.exploration_rate = v;
            self.learning.min_exploration_rate = self.learning.min_exploration_rate.min(v);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.learning.validate()?;
        self.reward.validate()?;
        self.normalizer.validate()?;
        self.discretizer.validate()?;
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            return Err(QLearnError::Config {
                field: "lookback_days",
                reason: format!(
                    "must be in 1..={MAX_LOOKBACK_DAYS}, got {}",
                    self.lookback_days
                ),
            }
            .into());
        }
        if self.max_training_iterations == 0 {
            return Err(QLearnError::Config {
                field: "max_training_iterations",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.default_training_iterations > self.max_training_iterations {
            return Err(QLearnError::Config {
                field: "default_training_iterations",
                reason: "must not exceed max_training_iterations".into(),
            }
            .into());
        }
        Ok(())
    }
}
