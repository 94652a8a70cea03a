use serde::{Serialize,Deserialize};
use serde_json::Value;

pub mod action;
pub mod error;
pub mod event;
pub mod metrics;
pub mod ranking;
pub mod state;

pub use action::Action;
pub use error::{CoreError, Result};
pub use event::{FeedbackEvent, FeedbackSignals, PerformanceRecord, PerformanceSnapshot};
pub use metrics::{MetricVector, Normalizer, NormalizerConfig, ScoreWeights};
pub use ranking::{tier_for_rank, RankingRecord};
pub use state::{Discretizer, DiscretizerConfig, Level, State, Thresholds};

#[derive(Debug,Serialize,Deserialize,Clone,PartialEq)]
pub struct Decision { pub action: Action, pub score: f64, pub why: String, pub state: State }

pub trait Policy {
    type Error;
    fn decide(&mut self, state: &State) -> Decision;
    fn feedback(
        &mut self,
        state: &State,
        action: Action,
        reward: f64,
        next_state: &State,
    ) -> std::result::Result<f64, Self::Error>;
    fn snapshot(&self) -> Value;
    fn load(&mut self, snapshot: Value) -> std::result::Result<(), Self::Error>;
}
