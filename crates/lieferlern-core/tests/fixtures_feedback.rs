use lieferlern_core::{
    Discretizer, FeedbackEvent, MetricVector, Normalizer, PerformanceSnapshot, State,
};
use std::fs;

fn fixture(name: &str) -> FeedbackEvent {
    let content = fs::read_to_string(format!("../../tests/fixtures/feedback/{name}"))
        .expect("Failed to read fixture file");
    serde_json::from_str(&content).expect("Failed to deserialize feedback fixture")
}

#[test]
fn ok_fixture_lands_in_expected_state() {
    let event = fixture("sample.ok.json");
    let scores = Normalizer::default()
        .from_feedback(&event)
        .expect("fixture is valid");
    let state = Discretizer::default().discretize(&scores);
    assert_eq!(state.to_string(), "Q3_D3_P3_S5");
    assert_eq!(event.city.as_deref(), Some("Berlin"));
}

#[test]
fn bad_fixture_is_rejected_with_field() {
    let event = fixture("sample.bad.json");
    let err = Normalizer::default().from_feedback(&event).unwrap_err();
    assert_eq!(err.field(), Some("quality_rating"));
}

#[test]
fn normalizer_and_levels_are_monotone_in_rating() {
    let normalizer = Normalizer::default();
    let discretizer = Discretizer::default();
    let mut event = fixture("sample.ok.json");
    let mut last_score = f64::MIN;
    let mut last_level = 0;
    for step in 0..=20 {
        event.quality_rating = f64::from(step) / 20.0;
        let scores = normalizer.from_feedback(&event).expect("valid rating");
        let level = discretizer.discretize(&scores).quality.get();
        assert!(scores.quality() >= last_score);
        assert!(level >= last_level);
        last_score = scores.quality();
        last_level = level;
    }
}

#[test]
fn normalizer_is_monotone_in_delivery_time() {
    let normalizer = Normalizer::default();
    let mut event = fixture("sample.ok.json");
    let mut last = f64::MAX;
    for days in 0..15 {
        event.delivery_time_days = f64::from(days);
        let delivery = normalizer.from_feedback(&event).expect("valid").delivery();
        assert!(delivery <= last);
        assert!((0.0..=10.0).contains(&delivery));
        last = delivery;
    }
}

#[test]
fn service_and_level_fall_with_issues() {
    let normalizer = Normalizer::default();
    let discretizer = Discretizer::default();
    let mut event = fixture("sample.ok.json");
    let mut last_score = f64::MAX;
    let mut last_level = u8::MAX;
    for issues in 0..=10 {
        event.issues = Some(issues);
        let scores = normalizer.from_feedback(&event).expect("valid issues");
        let level = discretizer.discretize(&scores).service.get();
        assert!(scores.service() <= last_score, "issues {issues}");
        assert!(level <= last_level, "issues {issues}");
        last_score = scores.service();
        last_level = level;
    }
    assert_eq!(last_score, 0.0);
    assert_eq!(last_level, 1);
}

#[derive(Clone, Copy)]
enum Dimension {
    Quality,
    Delivery,
    Price,
    Service,
}

impl Dimension {
    fn score(self, scores: &MetricVector) -> f64 {
        match self {
            Dimension::Quality => scores.quality(),
            Dimension::Delivery => scores.delivery(),
            Dimension::Price => scores.price(),
            Dimension::Service => scores.service(),
        }
    }

    fn level(self, state: &State) -> u8 {
        match self {
            Dimension::Quality => state.quality.get(),
            Dimension::Delivery => state.delivery.get(),
            Dimension::Price => state.price.get(),
            Dimension::Service => state.service.get(),
        }
    }
}

struct Sweep {
    field: &'static str,
    set: fn(&mut PerformanceSnapshot, f64),
    dimension: Dimension,
    rising: bool,
}

fn snapshot_sweeps() -> [Sweep; 10] {
    [
        Sweep {
            field: "quality_score",
            set: |s, v| s.quality_score = Some(v),
            dimension: Dimension::Quality,
            rising: true,
        },
        Sweep {
            field: "defect_rate",
            set: |s, v| s.defect_rate = Some(v),
            dimension: Dimension::Quality,
            rising: false,
        },
        Sweep {
            field: "return_rate",
            set: |s, v| s.return_rate = Some(v),
            dimension: Dimension::Quality,
            rising: false,
        },
        Sweep {
            field: "on_time_delivery_rate",
            set: |s, v| s.on_time_delivery_rate = Some(v),
            dimension: Dimension::Delivery,
            rising: true,
        },
        Sweep {
            field: "average_delay_days",
            set: |s, v| s.average_delay_days = Some(v),
            dimension: Dimension::Delivery,
            rising: false,
        },
        Sweep {
            field: "price_competitiveness",
            set: |s, v| s.price_competitiveness = Some(v),
            dimension: Dimension::Price,
            rising: true,
        },
        Sweep {
            field: "responsiveness",
            set: |s, v| s.responsiveness = Some(v),
            dimension: Dimension::Service,
            rising: true,
        },
        Sweep {
            field: "issue_resolution_hours",
            set: |s, v| s.issue_resolution_hours = Some(v),
            dimension: Dimension::Service,
            rising: false,
        },
        Sweep {
            field: "fill_rate",
            set: |s, v| s.fill_rate = Some(v),
            dimension: Dimension::Service,
            rising: true,
        },
        Sweep {
            field: "order_accuracy",
            set: |s, v| s.order_accuracy = Some(v),
            dimension: Dimension::Service,
            rising: true,
        },
    ]
}

#[test]
fn snapshot_scores_and_levels_move_with_each_input() {
    let normalizer = Normalizer::default();
    let discretizer = Discretizer::default();
    for sweep in &snapshot_sweeps() {
        let mut previous: Option<(f64, u8)> = None;
        let mut moved = false;
        for step in 0..=40 {
            let value = f64::from(step) * 2.5;
            let mut snapshot = PerformanceSnapshot::default();
            (sweep.set)(&mut snapshot, value);
            let scores = normalizer.from_snapshot(&snapshot);
            let score = sweep.dimension.score(&scores);
            let level = sweep.dimension.level(&discretizer.discretize(&scores));
            if let Some((last_score, last_level)) = previous {
                if sweep.rising {
                    assert!(score >= last_score, "{} at {value}", sweep.field);
                    assert!(level >= last_level, "{} level at {value}", sweep.field);
                } else {
                    assert!(score <= last_score, "{} at {value}", sweep.field);
                    assert!(level <= last_level, "{} level at {value}", sweep.field);
                }
                moved |= score != last_score;
            }
            previous = Some((score, level));
        }
        assert!(moved, "{} never changed the score", sweep.field);
    }
}
