use serde::{Deserialize, Serialize};

use crate::error::{QLearnError, Result};

/// Hyperparameters of the TD update and the ε-greedy policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// α, in `(0, 1]`.
    pub learning_rate: f64,
    /// γ, in `[0, 1]`.
    pub discount_factor: f64,
    /// ε, in `[0, 1]`.
    pub exploration_rate: f64,
    /// Floor for ε while it decays during batch training.
    pub min_exploration_rate: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.9,
            exploration_rate: 0.3,
            min_exploration_rate: 0.05,
        }
    }
}

impl LearningConfig {
    pub fn validate(&self) -> Result<()> {
        let a = self.learning_rate;
        if !a.is_finite() || a <= 0.0 || a > 1.0 {
            return Err(QLearnError::config(
                "learning_rate",
                format!("must be in (0, 1], got {a}"),
            ));
        }
        unit_interval("discount_factor", self.discount_factor)?;
        unit_interval("exploration_rate", self.exploration_rate)?;
        unit_interval("min_exploration_rate", self.min_exploration_rate)?;
        if self.min_exploration_rate > self.exploration_rate {
            return Err(QLearnError::config(
                "min_exploration_rate",
                "must not exceed exploration_rate",
            ));
        }
        Ok(())
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(QLearnError::config(
            field,
            format!("must be in [0, 1], got {value}"),
        ))
    }
}
