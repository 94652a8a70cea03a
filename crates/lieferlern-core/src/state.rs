//! Discrete performance states.
//!
//! A [`State`] holds four ordinal levels (quality, delivery, price, service).
//! Internally it is a typed tuple; the `Q{n}_D{n}_P{n}_S{n}` string form only
//! exists at the serialization boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::metrics::MetricVector;

/// Ordinal level in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Level(u8);

impl Level {
    pub const MIN: Level = Level(1);
    pub const MAX: Level = Level(5);

    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (1..=5).contains(&value).then_some(Level(value))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct State {
    pub quality: Level,
    pub delivery: Level,
    pub price: Level,
    pub service: Level,
}

impl State {
    #[must_use]
    pub fn new(quality: Level, delivery: Level, price: Level, service: Level) -> Self {
        Self {
            quality,
            delivery,
            price,
            service,
        }
    }

    /// Builds a state from raw levels, `None` if any is outside `1..=5`.
    #[must_use]
    pub fn from_levels(quality: u8, delivery: u8, price: u8, service: u8) -> Option<Self> {
        Some(Self::new(
            Level::new(quality)?,
            Level::new(delivery)?,
            Level::new(price)?,
            Level::new(service)?,
        ))
    }

    /// Same level in every dimension.
    #[must_use]
    pub fn uniform(level: Level) -> Self {
        Self::new(level, level, level, level)
    }

    #[must_use]
    pub fn mean_level(&self) -> f64 {
        f64::from(
            u16::from(self.quality.0)
                + u16::from(self.delivery.0)
                + u16::from(self.price.0)
                + u16::from(self.service.0),
        ) / 4.0
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Q{}_D{}_P{}_S{}",
            self.quality.0, self.delivery.0, self.price.0, self.service.0
        )
    }
}

impl FromStr for State {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidState(s.to_string());
        let mut parts = s.split('_');
        let mut level = |tag: char| -> Result<Level> {
            let part = parts.next().ok_or_else(invalid)?;
            let mut chars = part.chars();
            if chars.next() != Some(tag) {
                return Err(invalid());
            }
            let digit = chars.next().and_then(|c| c.to_digit(10)).ok_or_else(invalid)?;
            if chars.next().is_some() {
                return Err(invalid());
            }
            u8::try_from(digit)
                .ok()
                .and_then(Level::new)
                .ok_or_else(invalid)
        };
        let state = State::new(level('Q')?, level('D')?, level('P')?, level('S')?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(state)
    }
}

impl TryFrom<String> for State {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<State> for String {
    fn from(state: State) -> Self {
        state.to_string()
    }
}

/// Four ascending cut points on the 0–10 scale.
///
/// level = 1 + number of cut points `<=` score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds(pub [f64; 4]);

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds([3.0, 5.0, 8.5, 9.5])
    }
}

impl Thresholds {
    fn validate(&self, dimension: &'static str) -> Result<()> {
        let invalid = |reason: &str| CoreError::InvalidThresholds {
            dimension,
            reason: reason.to_string(),
        };
        if self.0.iter().any(|t| !t.is_finite() || *t <= 0.0 || *t > 10.0) {
            return Err(invalid("cut points must lie in (0, 10]"));
        }
        if self.0.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid("cut points must be strictly ascending"));
        }
        Ok(())
    }

    #[must_use]
    pub fn level(&self, score: f64) -> Level {
        let above = self.0.iter().filter(|t| **t <= score).count();
        // at most 4 cut points, so this stays within 1..=5
        Level(1 + above as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscretizerConfig {
    pub quality: Thresholds,
    pub delivery: Thresholds,
    pub price: Thresholds,
    pub service: Thresholds,
}

impl DiscretizerConfig {
    pub fn validate(&self) -> Result<()> {
        self.quality.validate("quality")?;
        self.delivery.validate("delivery")?;
        self.price.validate("price")?;
        self.service.validate("service")
    }
}

/// Maps metric vectors to states. Pure and total.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Discretizer {
    config: DiscretizerConfig,
}

impl Discretizer {
    pub fn new(config: DiscretizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn discretize(&self, metrics: &MetricVector) -> State {
        State::new(
            self.config.quality.level(metrics.quality()),
            self.config.delivery.level(metrics.delivery()),
            self.config.price.level(metrics.price()),
            self.config.service.level(metrics.service()),
        )
    }
}
