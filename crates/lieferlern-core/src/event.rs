//! Eingangsdaten für die Lernschleife.
//!
//! Dieses Modul definiert die Rohdaten, aus denen Sub-Scores, Zustände und
//! Belohnungen abgeleitet werden: das einzelne [`FeedbackEvent`] nach einer
//! Bestellung und der voraggregierte [`PerformanceSnapshot`] des
//! Order-Service, der als [`PerformanceRecord`] mit Datum die Grundlage des
//! Batch-Trainings bildet.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Rückmeldung zu einer einzelnen abgeschlossenen Bestellung.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEvent {
    /// Kennung des Lieferanten; `0` gilt als fehlend.
    pub supplier_id: u64,
    /// Kennung des Produkts; `0` gilt als fehlend.
    pub product_id: u64,
    /// Optionaler Stadtkontext der Bestellung.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Lieferzeit in Tagen, nicht negativ.
    pub delivery_time_days: f64,
    /// Qualitätsbewertung im Bereich `[0, 1]`.
    pub quality_rating: f64,
    /// Anteil korrekt gelieferter Positionen im Bereich `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_accuracy: Option<f64>,
    /// Anzahl gemeldeter Probleme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<u32>,
}

impl FeedbackEvent {
    /// Prüft Pflichtfelder und Wertebereiche, bevor irgendetwas gelernt wird.
    pub fn validate(&self) -> Result<()> {
        if self.supplier_id == 0 {
            return Err(CoreError::MissingField("supplier_id"));
        }
        if self.product_id == 0 {
            return Err(CoreError::MissingField("product_id"));
        }
        if !self.delivery_time_days.is_finite() || self.delivery_time_days < 0.0 {
            return Err(CoreError::OutOfRange {
                field: "delivery_time_days",
                value: self.delivery_time_days,
            });
        }
        check_unit("quality_rating", self.quality_rating)?;
        if let Some(accuracy) = self.order_accuracy {
            check_unit("order_accuracy", accuracy)?;
        }
        Ok(())
    }

    /// Die Teile des Events, die nur die Belohnung beeinflussen.
    #[must_use]
    pub fn signals(&self) -> FeedbackSignals {
        FeedbackSignals {
            order_accuracy: self.order_accuracy,
            issues: self.issues,
        }
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::OutOfRange { field, value })
    }
}

/// Strafsignale für die Belohnungsfunktion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedbackSignals {
    #[serde(default)]
    pub order_accuracy: Option<f64>,
    #[serde(default)]
    pub issues: Option<u32>,
}

/// Voraggregierte Kennzahlen eines Lieferanten. Alle Felder sind optional;
/// fehlende Werte werden beim Normalisieren durch neutrale Vorgaben ersetzt.
///
/// Raten sind Prozentwerte (0–100), Scores liegen auf der Skala 0–10.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defect_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_time_delivery_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_delay_days: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_competitiveness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsiveness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_resolution_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_accuracy: Option<f64>,
}

impl PerformanceSnapshot {
    /// Lehnt nicht-endliche Werte ab; Bereichsgrenzen klemmt der Normalizer.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("quality_score", self.quality_score),
            ("defect_rate", self.defect_rate),
            ("return_rate", self.return_rate),
            ("on_time_delivery_rate", self.on_time_delivery_rate),
            ("average_delay_days", self.average_delay_days),
            ("price_competitiveness", self.price_competitiveness),
            ("responsiveness", self.responsiveness),
            ("issue_resolution_hours", self.issue_resolution_hours),
            ("fill_rate", self.fill_rate),
            ("order_accuracy", self.order_accuracy),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(CoreError::OutOfRange { field, value });
                }
            }
        }
        Ok(())
    }

    /// Strafsignale aus dem Snapshot (Genauigkeit als Anteil statt Prozent).
    #[must_use]
    pub fn signals(&self) -> FeedbackSignals {
        FeedbackSignals {
            order_accuracy: self.order_accuracy.map(|pct| (pct / 100.0).clamp(0.0, 1.0)),
            issues: None,
        }
    }
}

/// Datierter Snapshot eines Lieferanten, ein Punkt der Order-Service-Zeitreihe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceRecord {
    pub supplier_id: u64,
    /// Datum als `YYYY-MM-DD` oder RFC-3339-Zeitstempel.
    pub date: String,
    #[serde(flatten)]
    pub snapshot: PerformanceSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> FeedbackEvent {
        FeedbackEvent {
            supplier_id: 123,
            product_id: 456,
            city: Some("Berlin".into()),
            delivery_time_days: 3.0,
            quality_rating: 0.8,
            order_accuracy: Some(0.95),
            issues: Some(0),
        }
    }

    #[test]
    fn valid_event_passes() {
        assert!(event().validate().is_ok());
    }

    #[test]
    fn missing_ids_are_reported() {
        let mut e = event();
        e.supplier_id = 0;
        assert_eq!(e.validate(), Err(CoreError::MissingField("supplier_id")));

        let mut e = event();
        e.product_id = 0;
        assert_eq!(e.validate().unwrap_err().field(), Some("product_id"));
    }

    #[test]
    fn out_of_range_values_name_their_field() {
        let mut e = event();
        e.quality_rating = 1.5;
        assert_eq!(e.validate().unwrap_err().field(), Some("quality_rating"));

        let mut e = event();
        e.delivery_time_days = -1.0;
        assert_eq!(e.validate().unwrap_err().field(), Some("delivery_time_days"));

        let mut e = event();
        e.order_accuracy = Some(f64::NAN);
        assert_eq!(e.validate().unwrap_err().field(), Some("order_accuracy"));
    }

    #[test]
    fn minimal_event_deserializes() {
        let e: FeedbackEvent = serde_json::from_str(
            r#"{"supplier_id":1,"product_id":2,"delivery_time_days":1.5,"quality_rating":0.5}"#,
        )
        .expect("deserialize");
        assert_eq!(e.city, None);
        assert_eq!(e.signals(), FeedbackSignals::default());
    }

    #[test]
    fn record_flattens_snapshot_fields() {
        let r: PerformanceRecord = serde_json::from_str(
            r#"{"supplier_id":7,"date":"2024-03-01","on_time_delivery_rate":92.5,"fill_rate":98}"#,
        )
        .expect("deserialize");
        assert_eq!(r.supplier_id, 7);
        assert_eq!(r.snapshot.on_time_delivery_rate, Some(92.5));
        assert_eq!(r.snapshot.fill_rate, Some(98.0));
        assert_eq!(r.snapshot.quality_score, None);
    }

    #[test]
    fn snapshot_accuracy_becomes_fraction() {
        let snap = PerformanceSnapshot {
            order_accuracy: Some(85.0),
            ..PerformanceSnapshot::default()
        };
        assert_eq!(snap.signals().order_accuracy, Some(0.85));
    }
}
