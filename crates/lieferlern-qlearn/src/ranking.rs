use lieferlern_core::{tier_for_rank, Discretizer, MetricVector, RankingRecord, ScoreWeights};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::qtable::QTable;
use crate::telemetry::debug_event;

/// A supplier eligible for ranking, with its current sub-scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub supplier_id: u64,
    pub supplier_name: String,
    #[serde(default)]
    pub city: Option<String>,
    pub scores: MetricVector,
}

impl Candidate {
    fn in_city(&self, city: &str) -> bool {
        self.city
            .as_deref()
            .is_some_and(|c| c.trim().eq_ignore_ascii_case(city.trim()))
    }
}

/// Combines learned values and sub-scores into dense ranks and tiers.
#[derive(Debug, Clone, Default)]
pub struct RankingAggregator {
    weights: ScoreWeights,
    discretizer: Discretizer,
}

impl RankingAggregator {
    #[must_use]
    pub fn new(weights: ScoreWeights, discretizer: Discretizer) -> Self {
        Self {
            weights,
            discretizer,
        }
    }

    /// Ranks `candidates` for one product.
    ///
    /// The city filter (case-insensitive) is applied before ranking;
    /// candidates without a city are dropped when a filter is given. Order is
    /// overall score desc, Q-value desc, supplier id asc.
    pub fn rank(
        &self,
        table: &QTable,
        product_id: u64,
        city: Option<&str>,
        candidates: Vec<Candidate>,
        as_of: &str,
    ) -> Result<Vec<RankingRecord>> {
        let mut rows = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if let Some(city) = city {
                if !candidate.in_city(city) {
                    continue;
                }
            }
            let state = self.discretizer.discretize(&candidate.scores);
            let (best_action, q_value) = table.best_action(&state)?;
            let s = &candidate.scores;
            rows.push(RankingRecord {
                supplier_id: candidate.supplier_id,
                supplier_name: candidate.supplier_name,
                rank: 0,
                tier: 0,
                overall_score: self.weights.blend(s),
                quality_score: s.quality(),
                delivery_score: s.delivery(),
                price_score: s.price(),
                service_score: s.service(),
                state,
                best_action,
                q_value,
                as_of: as_of.to_string(),
            });
        }

        rows.sort_by(|a, b| {
            b.overall_score
                .total_cmp(&a.overall_score)
                .then_with(|| b.q_value.total_cmp(&a.q_value))
                .then_with(|| a.supplier_id.cmp(&b.supplier_id))
        });
        let total = rows.len();
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
            row.tier = tier_for_rank(row.rank, total);
        }
        debug_event!("ranked {} suppliers for product {}", total, product_id);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lieferlern_core::{Action, State};

    fn candidate(id: u64, city: Option<&str>, score: f64) -> Candidate {
        Candidate {
            supplier_id: id,
            supplier_name: format!("Supplier {id}"),
            city: city.map(str::to_string),
            scores: MetricVector::new(score, score, score, score),
        }
    }

    const AS_OF: &str = "2024-05-01T00:00:00Z";

    #[test]
    fn ranks_are_dense_and_sorted() {
        let table = QTable::new();
        let ranked = RankingAggregator::default()
            .rank(
                &table,
                456,
                None,
                vec![candidate(1, None, 5.0), candidate(2, None, 9.0), candidate(3, None, 7.0)],
                AS_OF,
            )
            .expect("rank");
        let ids: Vec<u64> = ranked.iter().map(|r| r.supplier_id).collect();
        let ranks: Vec<usize> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!(ranked.iter().all(|r| r.as_of == AS_OF));
    }

    #[test]
    fn ties_break_on_q_value_then_id() {
        let table = QTable::new();
        // both candidates share the state of score 7.0
        let state = State::from_levels(3, 3, 3, 3).expect("valid");
        table
            .update(&state, Action::RankTier1, 1.0, 1.0, 0.0, &state)
            .expect("update");
        let low = State::from_levels(2, 2, 2, 2).expect("valid");
        table
            .update(&low, Action::RankTier1, 0.5, 1.0, 0.0, &low)
            .expect("update");

        let aggregator = RankingAggregator::default();
        let ranked = aggregator
            .rank(
                &table,
                1,
                None,
                vec![candidate(9, None, 7.0), candidate(4, None, 7.0)],
                AS_OF,
            )
            .expect("rank");
        assert_eq!(ranked[0].supplier_id, 4);
        assert_eq!(ranked[0].best_action, Action::RankTier1);
        assert!((ranked[0].q_value - 1.0).abs() < 1e-12);

        // equal overall score, different Q: the Q-value decides
        let a = Candidate {
            supplier_id: 1,
            supplier_name: "a".into(),
            city: None,
            scores: MetricVector::new(4.0, 4.0, 6.0, 6.0),
        };
        let b = Candidate {
            supplier_id: 2,
            supplier_name: "b".into(),
            city: None,
            scores: MetricVector::new(7.0, 7.0, 3.0, 3.0),
        };
        let ranked = aggregator
            .rank(&table, 1, None, vec![a.clone(), b.clone()], AS_OF)
            .expect("rank");
        // both states unseen, so the lower id wins
        assert_eq!(ranked[0].supplier_id, 1);

        let b_state = State::from_levels(3, 3, 2, 2).expect("valid");
        table
            .update(&b_state, Action::RankTier2, 2.0, 1.0, 0.0, &b_state)
            .expect("update");
        let ranked = aggregator.rank(&table, 1, None, vec![a, b], AS_OF).expect("rank");
        assert_eq!(ranked[0].supplier_id, 2);
        assert_eq!(ranked[0].best_action, Action::RankTier2);
    }

    #[test]
    fn city_filter_runs_before_ranking() {
        let table = QTable::new();
        let ranked = RankingAggregator::default()
            .rank(
                &table,
                1,
                Some("berlin"),
                vec![
                    candidate(1, Some("Hamburg"), 9.9),
                    candidate(2, Some("Berlin"), 6.0),
                    candidate(3, None, 9.0),
                    candidate(4, Some("BERLIN"), 8.0),
                ],
                AS_OF,
            )
            .expect("rank");
        let ids: Vec<u64> = ranked.iter().map(|r| r.supplier_id).collect();
        assert_eq!(ids, vec![4, 2]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn tiers_follow_list_length() {
        let table = QTable::new();
        let candidates: Vec<_> = (1..=10)
            .map(|i| candidate(i, None, f64::from(u32::try_from(i).unwrap_or(0))))
            .collect();
        let ranked = RankingAggregator::default()
            .rank(&table, 1, None, candidates, AS_OF)
            .expect("rank");
        let tiers: Vec<u8> = ranked.iter().map(|r| r.tier).collect();
        assert_eq!(tiers, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
    }

    #[test]
    fn learned_action_agrees_with_assigned_tier() {
        let table = QTable::new();
        // levels 5..=1 for the scores below; the best-scored state prefers tier 1
        for (level, tier) in (1..=5_u8).rev().zip(1..=5_u8) {
            let state = State::from_levels(level, level, level, level).expect("valid");
            let action = Action::from_tier(tier).expect("tier");
            table
                .update(&state, action, 1.0, 1.0, 0.0, &state)
                .expect("update");
        }
        let candidates = vec![
            candidate(3, None, 7.0),
            candidate(1, None, 9.9),
            candidate(5, None, 1.0),
            candidate(2, None, 9.0),
            candidate(4, None, 4.0),
        ];
        let ranked = RankingAggregator::default()
            .rank(&table, 456, None, candidates, AS_OF)
            .expect("rank");
        let ids: Vec<u64> = ranked.iter().map(|r| r.supplier_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        for record in &ranked {
            assert_eq!(record.action_tier(), Some(record.tier), "{}", record.state);
        }
    }

    #[test]
    fn empty_candidate_list() {
        let ranked = RankingAggregator::default()
            .rank(&QTable::new(), 1, Some("Köln"), Vec::new(), AS_OF)
            .expect("rank");
        assert!(ranked.is_empty());
    }
}
