use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::state::State;

/// Number of tiers a ranked list is split into.
pub const TIER_COUNT: usize = 5;

/// One supplier's place in a product/city ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingRecord {
    pub supplier_id: u64,
    pub supplier_name: String,
    /// Dense rank, 1 is best.
    pub rank: usize,
    /// Rank bucket, 1 is best.
    pub tier: u8,
    pub overall_score: f64,
    pub quality_score: f64,
    pub delivery_score: f64,
    pub price_score: f64,
    pub service_score: f64,
    pub state: State,
    pub best_action: Action,
    pub q_value: f64,
    /// RFC 3339 timestamp of the ranking run.
    pub as_of: String,
}

impl RankingRecord {
    /// Tier implied by the learned best action, `None` for `EXPLORE`.
    #[must_use]
    pub fn action_tier(&self) -> Option<u8> {
        self.best_action.tier()
    }
}

/// Tier of a 1-based `rank` within `total` ranked entries:
/// `ceil(rank / ceil(total / 5))`, capped at 5.
#[must_use]
pub fn tier_for_rank(rank: usize, total: usize) -> u8 {
    if rank == 0 || total == 0 {
        return TIER_COUNT as u8;
    }
    let per_tier = total.div_ceil(TIER_COUNT);
    let tier = rank.div_ceil(per_tier).clamp(1, TIER_COUNT);
    tier as u8
}
