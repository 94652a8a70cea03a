//! Metric normalization.
//!
//! Raw supplier inputs (a single feedback event or a pre-aggregated
//! performance snapshot) are turned into a [`MetricVector`] of four
//! sub-scores on a 0–10 scale. Every mapping is monotone in its inputs and
//! tolerant of missing optional fields.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::event::{FeedbackEvent, PerformanceSnapshot};

const SCORE_MAX: f64 = 10.0;

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, SCORE_MAX)
    }
}

/// Four sub-scores, each guaranteed to lie in `[0, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScoreFields")]
pub struct MetricVector {
    quality: f64,
    delivery: f64,
    price: f64,
    service: f64,
}

#[derive(Deserialize)]
struct ScoreFields {
    quality: f64,
    delivery: f64,
    price: f64,
    service: f64,
}

impl From<ScoreFields> for MetricVector {
    fn from(f: ScoreFields) -> Self {
        MetricVector::new(f.quality, f.delivery, f.price, f.service)
    }
}

impl MetricVector {
    /// Clamps every component into `[0, 10]`; NaN becomes 0.
    #[must_use]
    pub fn new(quality: f64, delivery: f64, price: f64, service: f64) -> Self {
        Self {
            quality: clamp_score(quality),
            delivery: clamp_score(delivery),
            price: clamp_score(price),
            service: clamp_score(service),
        }
    }

    #[must_use]
    pub fn quality(&self) -> f64 {
        self.quality
    }

    #[must_use]
    pub fn delivery(&self) -> f64 {
        self.delivery
    }

    #[must_use]
    pub fn price(&self) -> f64 {
        self.price
    }

    #[must_use]
    pub fn service(&self) -> f64 {
        self.service
    }
}

/// Relative weight of each sub-score in the overall score and the reward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub quality: f64,
    pub delivery: f64,
    pub price: f64,
    pub service: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            quality: 0.25,
            delivery: 0.25,
            price: 0.25,
            service: 0.25,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<()> {
        let all = [self.quality, self.delivery, self.price, self.service];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(CoreError::InvalidWeights(
                "weights must be finite and non-negative".into(),
            ));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(CoreError::InvalidWeights("weights must not all be zero".into()));
        }
        Ok(())
    }

    /// Weighted average of the sub-scores, normalized by the weight sum.
    #[must_use]
    pub fn blend(&self, metrics: &MetricVector) -> f64 {
        let total = self.quality + self.delivery + self.price + self.service;
        if total <= 0.0 {
            return 0.0;
        }
        let sum = self.quality * metrics.quality
            + self.delivery * metrics.delivery
            + self.price * metrics.price
            + self.service * metrics.service;
        clamp_score(sum / total)
    }
}

/// Tunable constants of the normalizer. Defaults are documented per field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Delivery points lost per day of delivery time (feedback path). Default 1.0.
    pub delivery_day_penalty: f64,
    /// Service points lost per reported issue (feedback path). Default 2.0.
    pub issue_penalty: f64,
    /// Price score when no price input exists. Default 7.0.
    pub neutral_price: f64,
    /// Quality score assumed when a snapshot has none. Default 5.0.
    pub default_quality_score: f64,
    /// On-time delivery rate (%) assumed when missing. Default 80.
    pub default_on_time_rate: f64,
    /// Responsiveness (0–10) assumed when missing. Default 5.0.
    pub default_responsiveness: f64,
    /// Issue-resolution score used when no resolution time is known. Default 5.0.
    pub default_resolution_score: f64,
    /// Hours of issue resolution that cost one service point. Default 7.2.
    pub resolution_hours_per_point: f64,
    /// Fill rate (%) assumed when missing. Default 90.
    pub default_fill_rate: f64,
    /// Order accuracy (%) assumed when missing. Default 95.
    pub default_order_accuracy: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            delivery_day_penalty: 1.0,
            issue_penalty: 2.0,
            neutral_price: 7.0,
            default_quality_score: 5.0,
            default_on_time_rate: 80.0,
            default_responsiveness: 5.0,
            default_resolution_score: 5.0,
            resolution_hours_per_point: 7.2,
            default_fill_rate: 90.0,
            default_order_accuracy: 95.0,
        }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("delivery_day_penalty", self.delivery_day_penalty),
            ("issue_penalty", self.issue_penalty),
            ("neutral_price", self.neutral_price),
            ("default_quality_score", self.default_quality_score),
            ("default_on_time_rate", self.default_on_time_rate),
            ("default_responsiveness", self.default_responsiveness),
            ("default_resolution_score", self.default_resolution_score),
            ("default_fill_rate", self.default_fill_rate),
            ("default_order_accuracy", self.default_order_accuracy),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::OutOfRange { field, value });
            }
        }
        if !self.resolution_hours_per_point.is_finite() || self.resolution_hours_per_point <= 0.0 {
            return Err(CoreError::OutOfRange {
                field: "resolution_hours_per_point",
                value: self.resolution_hours_per_point,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Sub-scores for a single feedback event. Validates the event first.
    pub fn from_feedback(&self, event: &FeedbackEvent) -> Result<MetricVector> {
        event.validate()?;
        let c = &self.config;
        let issues = f64::from(event.issues.unwrap_or(0));
        Ok(MetricVector::new(
            event.quality_rating * SCORE_MAX,
            SCORE_MAX - event.delivery_time_days * c.delivery_day_penalty,
            c.neutral_price,
            SCORE_MAX - issues * c.issue_penalty,
        ))
    }

    /// Sub-scores for an aggregated performance snapshot.
    ///
    /// Rates are percentages (0–100); scores are on the 0–10 scale.
    #[must_use]
    pub fn from_snapshot(&self, snap: &PerformanceSnapshot) -> MetricVector {
        let c = &self.config;

        let quality_score = clamp_score(snap.quality_score.unwrap_or(c.default_quality_score));
        let defect_score = clamp_score(SCORE_MAX - snap.defect_rate.unwrap_or(0.0).max(0.0) / 2.0);
        let return_score = clamp_score(SCORE_MAX - snap.return_rate.unwrap_or(0.0).max(0.0) / 2.0);
        let quality = quality_score * 0.4 + defect_score * 0.4 + return_score * 0.2;

        let on_time_score =
            clamp_score(snap.on_time_delivery_rate.unwrap_or(c.default_on_time_rate) / 10.0);
        let delay = snap.average_delay_days.unwrap_or(0.0).max(0.0);
        let delay_score = clamp_score(SCORE_MAX - (delay * 2.0).min(SCORE_MAX));
        let delivery = on_time_score * 0.6 + delay_score * 0.4;

        let price = snap.price_competitiveness.unwrap_or(c.neutral_price);

        let responsiveness = clamp_score(snap.responsiveness.unwrap_or(c.default_responsiveness));
        let resolution_score = match snap.issue_resolution_hours {
            Some(hours) => clamp_score(SCORE_MAX - hours.max(0.0) / c.resolution_hours_per_point),
            None => clamp_score(c.default_resolution_score),
        };
        let fill_score = clamp_score(snap.fill_rate.unwrap_or(c.default_fill_rate) / 10.0);
        let accuracy_score =
            clamp_score(snap.order_accuracy.unwrap_or(c.default_order_accuracy) / 10.0);
        let service = responsiveness * 0.3
            + resolution_score * 0.2
            + fill_score * 0.25
            + accuracy_score * 0.25;

        MetricVector::new(quality, delivery, price, service)
    }
}
