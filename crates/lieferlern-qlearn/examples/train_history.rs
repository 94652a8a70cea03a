use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::sync::Arc;

use lieferlern_core::PerformanceRecord;
use lieferlern_qlearn::{ExportFilter, LearningConfig, QAgent, QTable, Trainer};

fn main() -> Result<(), Box<dyn Error>> {
    let raw = match std::env::args().nth(1) {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            input
        }
    };
    let records: Vec<PerformanceRecord> = serde_json::from_str(&raw)?;

    let table = Arc::new(QTable::new());
    let mut agent = QAgent::seeded(Arc::clone(&table), LearningConfig::default(), 42)?;
    let summary = Trainer::default().train(&mut agent, &records, 50)?;

    serde_json::to_writer_pretty(io::stdout(), &summary)?;
    println!();

    let filter = ExportFilter {
        limit: 5,
        ..ExportFilter::default()
    };
    for entry in table.export(&filter)? {
        println!(
            "{:.3}\t{}\t{}\t{}",
            entry.q_value, entry.state, entry.action, entry.update_count
        );
    }
    Ok(())
}
