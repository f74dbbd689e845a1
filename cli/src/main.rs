//! EZchain Simulator CLI
//!
//! # Usage
//!
//! ```bash
//! # Run with the reference parameter set
//! ezchain run
//!
//! # Small fast run
//! ezchain run --quick --duration 5000
//!
//! # Run from a config file, overriding the seed
//! ezchain run --config sim.toml --seed 7
//!
//! # Show the effective configuration
//! ezchain print-config --quick
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use ezchain::Simulation;
use ezchain_storage::{KvStore, MemoryStore, RedbStore};

mod config;
mod logging;
mod report;

use config::RunConfig;

/// EZchain layered-ledger protocol simulator
#[derive(Parser)]
#[command(name = "ezchain")]
#[command(author = "EZchain Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Discrete-event simulator for the EZchain protocol", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation
    Run(RunArgs),

    /// Print the effective configuration as TOML
    PrintConfig(OverrideArgs),

    /// Show version information
    Version,
}

/// Parameter overrides shared by `run` and `print-config`.
#[derive(Args, Clone)]
struct OverrideArgs {
    /// Start from the quick profile instead of the reference one
    #[arg(long)]
    quick: bool,

    /// Simulated duration in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Number of nodes (N)
    #[arg(short = 'n', long)]
    nodes: Option<u64>,

    /// Target committee size (M)
    #[arg(short = 'm', long)]
    committee: Option<u64>,

    /// Epoch length in seconds (T)
    #[arg(long)]
    epoch: Option<f64>,

    /// Mean initial values per node
    #[arg(long)]
    values_mean: Option<f64>,

    /// Transactions per node per second
    #[arg(long)]
    tx_rate: Option<f64>,

    /// Disable the checkpoint-chain protocol
    #[arg(long)]
    no_cc: bool,

    /// Network delay upper bound δ
    #[arg(long)]
    delay: Option<f64>,

    /// CC phase timeouts γ1..γ4
    #[arg(long, num_args = 4, value_names = ["G1", "G2", "G3", "G4"])]
    gamma: Option<Vec<f64>>,

    /// Per-round block interval target
    #[arg(long)]
    round: Option<f64>,

    /// Seconds between statistics rows
    #[arg(long)]
    record_interval: Option<f64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,
}

impl OverrideArgs {
    fn apply(&self, cfg: &mut RunConfig) {
        let sim = &mut cfg.sim;
        if let Some(v) = self.duration {
            sim.duration = v;
        }
        if let Some(v) = self.nodes {
            sim.nodes = v;
        }
        if let Some(v) = self.committee {
            sim.committee = v;
        }
        if let Some(v) = self.epoch {
            sim.epoch = v;
        }
        if let Some(v) = self.values_mean {
            sim.values_mean = v;
        }
        if let Some(v) = self.tx_rate {
            sim.tx_rate = v;
        }
        if self.no_cc {
            sim.use_cc = false;
        }
        if let Some(v) = self.delay {
            sim.delay = v;
        }
        if let Some(g) = &self.gamma {
            sim.gamma = [g[0], g[1], g[2], g[3]];
        }
        if let Some(v) = self.round {
            sim.round = Some(v);
        }
        if let Some(v) = self.record_interval {
            sim.record_interval = v;
        }
        if let Some(v) = self.seed {
            sim.seed = v;
        }
    }

    fn resolve(&self, config_path: Option<&PathBuf>) -> anyhow::Result<RunConfig> {
        let mut cfg = match config_path {
            Some(path) => RunConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None if self.quick => RunConfig::quick(),
            None => RunConfig::default(),
        };
        self.apply(&mut cfg);
        Ok(cfg)
    }
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    overrides: OverrideArgs,

    /// Output directory for the statistics CSVs
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Back the entity cache with a redb database in this directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

impl RunArgs {
    fn execute(&self, config_path: Option<&PathBuf>) -> anyhow::Result<()> {
        let mut cfg = self.overrides.resolve(config_path)?;
        if let Some(dir) = &self.out_dir {
            cfg.output.out_dir = dir.clone();
        }

        let store: Arc<dyn KvStore> = match &self.data_dir {
            Some(dir) => Arc::new(
                RedbStore::open(dir.join("cache.redb")).context("opening entity cache")?,
            ),
            None => Arc::new(MemoryStore::new()),
        };

        let mut sim = Simulation::new(cfg.sim.clone(), store)?;
        let summary = match sim.run() {
            Ok(summary) => summary,
            Err(e) => {
                // Chain-walk violations are fatal but still end up in the
                // error summary, as the run's last word.
                if let Some(kind) = e.kind() {
                    sim.metrics().get().record_error(kind);
                }
                report::write_errors(&cfg.output, sim.metrics().get())?;
                return Err(e.into());
            }
        };

        let stats = report::write_stats(&cfg.output, &cfg.sim, &summary)?;
        let errors = report::write_errors(&cfg.output, sim.metrics().get())?;
        info!(
            events = summary.events,
            end_time = summary.end_time,
            stats = %stats.display(),
            errors = %errors.display(),
            "simulation finished"
        );
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.json_logs)?;

    match &cli.command {
        Commands::Run(cmd) => cmd.execute(cli.config.as_ref()),
        Commands::PrintConfig(overrides) => {
            let cfg = overrides.resolve(cli.config.as_ref())?;
            print!("{}", cfg.to_toml()?);
            Ok(())
        }
        Commands::Version => {
            println!("ezchain {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
