//! Feeds a handful of feedback events through the engine and prints the
//! resulting ranking plus reward statistics per action.
//!
//! Run with: cargo run -p lieferlern-feedback --example feedback_loop

use std::error::Error;

use lieferlern_core::{FeedbackEvent, PerformanceRecord, PerformanceSnapshot};
use lieferlern_feedback::{
    CategoryPerformance, EngineConfig, MemorySnapshotStore, PerformanceSource, RankingEngine,
    SourceError, SupplierDirectory, SupplierInfo, Transaction, TransactionQuery,
};

/// Three suppliers with fixed summaries, no transaction history.
struct Demo;

impl PerformanceSource for Demo {
    fn transactions(&self, _: u64, _: &TransactionQuery) -> Result<Vec<Transaction>, SourceError> {
        Ok(Vec::new())
    }

    fn performance_records(&self, _: u64, _: &str) -> Result<Vec<PerformanceRecord>, SourceError> {
        Ok(Vec::new())
    }

    fn performance_summary(
        &self,
        supplier_id: u64,
        _: &str,
    ) -> Result<PerformanceSnapshot, SourceError> {
        let quality = match supplier_id {
            1 => 9.5,
            2 => 7.0,
            _ => 4.0,
        };
        Ok(PerformanceSnapshot {
            quality_score: Some(quality),
            on_time_delivery_rate: Some(quality * 10.0),
            ..PerformanceSnapshot::default()
        })
    }

    fn category_performance(&self, _: u64) -> Result<Vec<CategoryPerformance>, SourceError> {
        Ok(Vec::new())
    }
}

impl SupplierDirectory for Demo {
    fn supplier(&self, id: u64) -> Result<Option<SupplierInfo>, SourceError> {
        Ok(self.all_suppliers()?.into_iter().find(|s| s.id == id))
    }

    fn suppliers_for_product(&self, _: u64) -> Result<Vec<SupplierInfo>, SourceError> {
        self.all_suppliers()
    }

    fn all_suppliers(&self) -> Result<Vec<SupplierInfo>, SourceError> {
        Ok(["Nordlicht", "Elbkontor", "Südwind"]
            .iter()
            .zip(1..)
            .map(|(name, id)| SupplierInfo {
                id,
                name: (*name).to_string(),
                city: Some("Berlin".into()),
                products: vec![456],
            })
            .collect())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = EngineConfig {
        seed: Some(7),
        ..EngineConfig::default()
    };
    let engine = RankingEngine::new(config, Demo, Demo, MemorySnapshotStore::new())?;

    for round in 0..30_u32 {
        let supplier_id = u64::from(round % 3) + 1;
        let rating = match supplier_id {
            1 => 0.95,
            2 => 0.7,
            _ => 0.3,
        };
        let outcome = engine.submit_feedback(&FeedbackEvent {
            supplier_id,
            product_id: 456,
            city: Some("Berlin".into()),
            delivery_time_days: supplier_id as f64,
            quality_rating: rating,
            order_accuracy: Some(0.9 + rating / 10.0),
            issues: Some(u32::from(supplier_id == 3)),
        })?;
        if round < 3 {
            println!(
                "{} {} -> {} reward {:.2} q {:.3}",
                outcome.supplier_name,
                outcome.state,
                outcome.action,
                outcome.reward,
                outcome.q_value
            );
        }
    }

    let ranking = engine.ranking(456, Some("Berlin"))?;
    println!("\nranking for product {} ({} suppliers):", ranking.product_id, ranking.count);
    for row in &ranking.suppliers {
        println!(
            "  #{} tier {} {:<10} overall {:.2} best {} q {:.3}",
            row.rank, row.tier, row.supplier_name, row.overall_score, row.best_action, row.q_value
        );
    }

    println!("\nrewards by action:");
    for (action, stats) in engine.reward_statistics()? {
        println!(
            "  {:<12} n={:<3} avg {:.2} [{:.2}, {:.2}]",
            action.as_str(),
            stats.count,
            stats.average_reward(),
            stats.min_reward,
            stats.max_reward
        );
    }
    Ok(())
}
