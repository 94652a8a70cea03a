use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The closed set of ranking decisions.
///
/// Declaration order is the tie-break order: lower tiers win, `EXPLORE` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "RANK_TIER_1")]
    RankTier1,
    #[serde(rename = "RANK_TIER_2")]
    RankTier2,
    #[serde(rename = "RANK_TIER_3")]
    RankTier3,
    #[serde(rename = "RANK_TIER_4")]
    RankTier4,
    #[serde(rename = "RANK_TIER_5")]
    RankTier5,
    #[serde(rename = "EXPLORE")]
    Explore,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::RankTier1,
        Action::RankTier2,
        Action::RankTier3,
        Action::RankTier4,
        Action::RankTier5,
        Action::Explore,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::RankTier1 => "RANK_TIER_1",
            Action::RankTier2 => "RANK_TIER_2",
            Action::RankTier3 => "RANK_TIER_3",
            Action::RankTier4 => "RANK_TIER_4",
            Action::RankTier5 => "RANK_TIER_5",
            Action::Explore => "EXPLORE",
        }
    }

    /// Tier implied by a `RANK_TIER_k` action.
    #[must_use]
    pub fn tier(self) -> Option<u8> {
        match self {
            Action::RankTier1 => Some(1),
            Action::RankTier2 => Some(2),
            Action::RankTier3 => Some(3),
            Action::RankTier4 => Some(4),
            Action::RankTier5 => Some(5),
            Action::Explore => None,
        }
    }

    #[must_use]
    pub fn from_tier(tier: u8) -> Option<Self> {
        match tier {
            1 => Some(Action::RankTier1),
            2 => Some(Action::RankTier2),
            3 => Some(Action::RankTier3),
            4 => Some(Action::RankTier4),
            5 => Some(Action::RankTier5),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::InvalidAction(s.to_string()))
    }
}
