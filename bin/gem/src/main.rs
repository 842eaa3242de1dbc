//! Gem miner
//!
//! Grinds salts for a gem contract on as many workers as there are cores and
//! claims every find below the configured gas price.
//!
//! Usage:
//!   gem-mine --config config.json --loop

mod config;

use clap::Parser;
use config::{parse_private_key, FileConfig, Gwei};
use gem_ledger::RpcLedger;
use gem_miner::{MinerConfig, RoundPolicy, SearchLoop, WorkerOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Proof-of-work gem miner
#[derive(Debug, Parser)]
#[command(name = "gem-mine")]
#[command(about = "Search for gem salts and claim them on-chain")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, short = 'c', env = "GEM_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Number of workers (default: config file, then available parallelism)
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Keep mining after every find
    #[arg(long = "loop", conflicts_with = "once")]
    looping: bool,

    /// Stop each worker after its first find
    #[arg(long)]
    once: bool,

    /// Report finds without claiming them
    #[arg(long)]
    observe: bool,

    /// Signing key, overriding the config file
    #[arg(long, env = "GEM_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Maximum gas price in gwei
    #[arg(long)]
    max_gas_price: Option<String>,

    /// Iterations between background state refreshes
    #[arg(long)]
    refresh_interval: Option<u64>,

    /// Iterations between yield points
    #[arg(long)]
    yield_interval: Option<u64>,

    /// Ring the terminal bell on every find
    #[arg(long)]
    ding: bool,
}

impl Cli {
    /// Load the config file and apply command line overrides.
    fn miner_config(&self) -> eyre::Result<MinerConfig> {
        let mut config = FileConfig::load(&self.config)?.into_miner_config()?;

        if let Some(key) = &self.private_key {
            config = config.with_signing_key(Some(parse_private_key(key)?));
        }
        if self.observe {
            config = config.with_auto_claim(false);
        }
        if let Some(price) = &self.max_gas_price {
            config.gas_price_ceiling = Some(Gwei::Text(price.clone()).to_wei()?);
        }
        if self.looping {
            config.round_policy = RoundPolicy::Continuous;
        } else if self.once {
            config.round_policy = RoundPolicy::Single;
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(interval) = self.refresh_interval {
            config.search.refresh_interval = interval;
        }
        if let Some(interval) = self.yield_interval {
            config.search.yield_interval = interval.max(1);
        }
        config.ding |= self.ding;

        Ok(config)
    }
}

fn main() -> eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).with_target(true).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = cli.miner_config()?;

    info!(
        target: "gem::cli",
        kind = %config.context.gem_kind,
        contract = %config.context.contract,
        mining_for = %config.context.target,
        chain_id = config.context.chain_id,
        workers = config.workers,
        observe_only = config.observe_only(),
        rounds = ?config.round_policy,
        "You venture into the mines"
    );
    if config.observe_only() {
        warn!(target: "gem::cli", "No signing key or auto-claim disabled, finds will not be claimed");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: MinerConfig) -> eyre::Result<()> {
    let pool = WorkerOrchestrator::new(config.workers);

    let cancel = pool.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: "gem::cli", "Interrupted, stopping workers");
            cancel.cancel();
        }
    });

    let config = Arc::new(config);
    let report = pool
        .run(move |slot| {
            let ledger = RpcLedger::from_config(&config)?;
            config.check_signer(ledger.signer())?;
            Ok(SearchLoop::from_config(slot, &config, Arc::new(ledger)))
        })
        .await;

    let totals = report.totals();
    info!(
        target: "gem::cli",
        rounds = totals.rounds,
        hashes = totals.hashes,
        claimed = totals.submitted,
        unclaimed = totals.found_no_claim,
        invalid = totals.invalid,
        price_aborts = totals.price_aborts,
        failed = totals.failed,
        "Mining finished"
    );

    let failures = report.failures().count();
    if failures > 0 {
        for (slot, err) in report.failures() {
            error!(target: "gem::cli", slot, %err, "Worker stopped");
        }
        eyre::bail!("{failures} of {} workers failed", report.workers.len());
    }
    Ok(())
}
