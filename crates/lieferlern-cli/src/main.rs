//! CLI for lieferlern.
//!
//! Submits feedback, produces rankings, runs training and inspects the
//! learned Q-table. Data comes from the Order Service over HTTP or, with
//! `--catalog`, from a directory of JSON files (simulation mode). The Q-table
//! and ranking snapshots are kept as JSON files between runs.

mod files;
mod http;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lieferlern_core::{FeedbackEvent, PerformanceRecord, PerformanceSnapshot};
use lieferlern_feedback::{
    CategoryPerformance, EngineConfig, PerformanceSource, RankingEngine, SourceError,
    SupplierDirectory, SupplierInfo, TrainingRequest, Transaction, TransactionQuery,
};
use lieferlern_qlearn::ExportFilter;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::files::{FileCatalog, JsonSnapshotStore, QTableFile};
use crate::http::HttpOrderService;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Read suppliers and performance data from this directory instead of the Order Service
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Engine configuration (JSON); environment overrides apply on top
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the Q-table file
    #[arg(long, global = true, default_value = "data/lieferlern.qtable.json")]
    qtable: PathBuf,

    /// Path to the ranking snapshot file
    #[arg(long, global = true, default_value = "data/lieferlern.rankings.json")]
    rankings: PathBuf,

    /// Fixed RNG seed for reproducible runs
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn from feedback events (JSON objects, one after another)
    Feedback {
        /// Input file; stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Rank the suppliers of a product
    Rank {
        #[arg(long)]
        product: u64,

        #[arg(long)]
        city: Option<String>,

        /// Also store the ranking as today's snapshot
        #[arg(long)]
        store: bool,
    },
    /// Replay performance history into the Q-table
    Train {
        /// Passes over the history (default from config)
        #[arg(long)]
        iterations: Option<u32>,

        /// Restrict to these suppliers (repeatable); all suppliers when omitted
        #[arg(long = "supplier")]
        suppliers: Vec<u64>,
    },
    /// Show the current state and Q-values of a supplier
    Qvalues {
        #[arg(long)]
        supplier: u64,
    },
    /// Show a supplier's performance per product category
    Categories {
        #[arg(long)]
        supplier: u64,
    },
    /// Export Q-table entries
    Export {
        /// Substring of the state key
        #[arg(long)]
        state: Option<String>,

        /// Substring of the action name
        #[arg(long)]
        action: Option<String>,

        #[arg(long)]
        min_q: Option<f64>,

        #[arg(long, default_value = "100")]
        limit: usize,
    },
    /// Show a stored ranking snapshot
    Snapshot {
        #[arg(long)]
        product: u64,

        #[arg(long)]
        city: Option<String>,

        /// Day of the snapshot (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
}

/// Where suppliers and performance data come from.
enum Backend {
    Http(HttpOrderService),
    Files(FileCatalog),
}

impl Backend {
    fn open(catalog: Option<&Path>) -> Result<Self> {
        match catalog {
            Some(dir) => Ok(Backend::Files(FileCatalog::open(dir)?)),
            None => Ok(Backend::Http(HttpOrderService::from_env()?)),
        }
    }

    fn source(&self) -> &dyn PerformanceSource {
        match self {
            Backend::Http(svc) => svc,
            Backend::Files(cat) => cat,
        }
    }

    fn directory(&self) -> &dyn SupplierDirectory {
        match self {
            Backend::Http(svc) => svc,
            Backend::Files(cat) => cat,
        }
    }
}

impl PerformanceSource for Backend {
    fn transactions(
        &self,
        supplier_id: u64,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>, SourceError> {
        self.source().transactions(supplier_id, query)
    }

    fn performance_records(
        &self,
        supplier_id: u64,
        since: &str,
    ) -> Result<Vec<PerformanceRecord>, SourceError> {
        self.source().performance_records(supplier_id, since)
    }

    fn performance_summary(
        &self,
        supplier_id: u64,
        since: &str,
    ) -> Result<PerformanceSnapshot, SourceError> {
        self.source().performance_summary(supplier_id, since)
    }

    fn category_performance(
        &self,
        supplier_id: u64,
    ) -> Result<Vec<CategoryPerformance>, SourceError> {
        self.source().category_performance(supplier_id)
    }
}

impl SupplierDirectory for Backend {
    fn supplier(&self, id: u64) -> Result<Option<SupplierInfo>, SourceError> {
        self.directory().supplier(id)
    }

    fn suppliers_for_product(&self, product_id: u64) -> Result<Vec<SupplierInfo>, SourceError> {
        self.directory().suppliers_for_product(product_id)
    }

    fn all_suppliers(&self) -> Result<Vec<SupplierInfo>, SourceError> {
        self.directory().all_suppliers()
    }
}

type Engine<'a> = RankingEngine<&'a Backend, &'a Backend, JsonSnapshotStore>;

fn load_config(path: Option<&Path>, seed: Option<u64>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            EngineConfig::from_json(&raw)?
        }
        None => EngineConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if seed.is_some() {
        config.seed = seed;
    }
    config.validate().context("Invalid engine configuration")?;
    Ok(config)
}

fn read_events(input: Option<&Path>) -> Result<Vec<FeedbackEvent>> {
    let raw = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    serde_json::Deserializer::from_str(&raw)
        .into_iter::<FeedbackEvent>()
        .collect::<Result<_, _>>()
        .context("Malformed feedback input")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_feedback(engine: &Engine<'_>, input: Option<&Path>) -> Result<()> {
    let events = read_events(input)?;
    let mut rejected = 0;
    for event in &events {
        match engine.submit_feedback(event) {
            Ok(outcome) => println!("{}", serde_json::to_string(&outcome)?),
            Err(e) => {
                tracing::warn!(
                    "feedback for supplier {} rejected ({}): {}",
                    event.supplier_id,
                    e.kind(),
                    e
                );
                rejected += 1;
            }
        }
    }
    if rejected > 0 {
        anyhow::bail!("{} of {} feedback events rejected", rejected, events.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref(), cli.seed)?;
    let backend = Backend::open(cli.catalog.as_deref())?;
    let table = Arc::new(QTableFile::load(&cli.qtable)?);
    let engine: Engine<'_> = RankingEngine::with_table(
        config,
        Arc::clone(&table),
        &backend,
        &backend,
        JsonSnapshotStore::new(&cli.rankings),
    )?;

    match cli.command {
        Commands::Feedback { input } => {
            let result = run_feedback(&engine, input.as_deref());
            // accepted events are kept even when others were rejected
            QTableFile::save(&table, &cli.qtable).context("Failed to save Q-table")?;
            result?;
        }
        Commands::Rank {
            product,
            city,
            store,
        } => {
            let ranking = engine.ranking(product, city.as_deref())?;
            if store {
                let snapshot = engine.store_snapshot(&ranking)?;
                tracing::info!("stored ranking snapshot for {}", snapshot.date);
            }
            print_json(&ranking)?;
        }
        Commands::Train {
            iterations,
            suppliers,
        } => {
            let summary = engine.train(&TrainingRequest {
                iterations,
                supplier_ids: (!suppliers.is_empty()).then_some(suppliers),
            })?;
            QTableFile::save(&table, &cli.qtable).context("Failed to save Q-table")?;
            print_json(&summary)?;
        }
        Commands::Qvalues { supplier } => print_json(&engine.q_values(supplier)?)?,
        Commands::Categories { supplier } => print_json(&engine.categories(supplier)?)?,
        Commands::Export {
            state,
            action,
            min_q,
            limit,
        } => {
            let export = engine.export(&ExportFilter {
                state,
                action,
                min_q_value: min_q,
                limit,
            })?;
            print_json(&export)?;
        }
        Commands::Snapshot {
            product,
            city,
            date,
        } => print_json(&engine.snapshot(product, city.as_deref(), &date)?)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn seed_flag_overrides_config() {
        let config = load_config(None, Some(9)).expect("config");
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn concatenated_events_are_read() {
        let dir =
            std::env::temp_dir().join(format!("lieferlern_cli_events_{}", std::process::id()));
        let _ = fs::create_dir_all(&dir);
        let path = dir.join("events.json");
        fs::write(
            &path,
            r#"{"supplier_id":1,"product_id":2,"delivery_time_days":1,"quality_rating":0.5}
{
  "supplier_id": 3,
  "product_id": 4,
  "delivery_time_days": 2,
  "quality_rating": 0.9
}"#,
        )
        .expect("write");
        let events = read_events(Some(&path)).expect("events");
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].supplier_id, 3);
    }
}
