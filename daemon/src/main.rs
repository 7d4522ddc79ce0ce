//! tally: inspect governance rounds in a ledger dump, or watch it live.

mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use tally_governance::RoundEngine;
use tally_ledger::{fetch_snapshot, FileLedger};
use tally_types::{AccountId, Clock, ProposalId, SystemClock, Timestamp};
use tally_watcher::{init_logging, LogFormat, RoundWatcher, ShutdownController, WatcherConfig};

#[derive(Parser)]
#[command(name = "tally", about = "Governance round reconciliation over a ledger dump")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    /// JSON ledger dump to read.
    #[arg(long, env = "TALLY_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TALLY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "TALLY_LOG_FORMAT")]
    log_format: Option<String>,

    /// Collect Prometheus metrics while watching and print them on exit.
    #[arg(long, env = "TALLY_ENABLE_METRICS")]
    metrics: bool,

    /// Evaluate as of this unix time instead of the system clock.
    #[arg(long, env = "TALLY_NOW")]
    now: Option<u64>,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// List every round with its members and closure state.
    Rounds,
    /// Status of one proposal.
    Status { proposal: ProposalId },
    /// Whether an account may vote on a proposal.
    Eligibility {
        account: AccountId,
        proposal: ProposalId,
    },
    /// Proposals a listing should hide.
    Hidden,
    /// Winning proposals, unexecuted first.
    Winners,
    /// Whether an account may submit a proposal.
    CanPropose { account: AccountId },
    /// Keep polling the dump and report every change.
    Watch,
    /// Print the effective configuration as TOML.
    Config,
}

fn load_config(cli: &Cli) -> (WatcherConfig, Option<String>) {
    let mut warning = None;
    let mut config = match &cli.config {
        Some(path) => match WatcherConfig::from_toml_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warning = Some(format!(
                    "failed to load config file {}: {e}, using defaults",
                    path.display()
                ));
                WatcherConfig::default()
            }
        },
        None => WatcherConfig::default(),
    };
    if let Some(path) = &cli.snapshot {
        config.snapshot_path = path.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    config.enable_metrics |= cli.metrics;
    (config, warning)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, warning) = load_config(&cli);

    let format: LogFormat = config.log_format.parse()?;
    init_logging(format, &config.log_level)?;
    if let Some(warning) = warning {
        tracing::warn!("{warning}");
    }
    config.validate()?;

    let now = cli.now.map(Timestamp::new).unwrap_or_else(|| SystemClock.now());
    let ledger = FileLedger::open(&config.snapshot_path)
        .with_context(|| format!("opening ledger dump {}", config.snapshot_path.display()))?;

    match cli.command {
        Command::Watch => return watch(ledger, config, cli.json).await,
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            return Ok(());
        }
        _ => {}
    }

    let mut engine = RoundEngine::new(config.governance.clone())?;
    let snapshot = fetch_snapshot(&ledger, None, now)?;
    if !snapshot.is_complete() {
        tracing::warn!(failures = snapshot.read_failures.len(), "snapshot is partial");
    }
    let view = engine.view(&snapshot, now);

    match cli.command {
        Command::Rounds => output::rounds(&view, cli.json)?,
        Command::Status { proposal } => {
            let status = view.get_status(proposal)?;
            output::status(&view, proposal, status, cli.json)?;
        }
        Command::Eligibility { account, proposal } => {
            let eligibility = view.get_eligibility(&account, proposal, &ledger)?;
            output::eligibility(&account, proposal, &eligibility, cli.json)?;
        }
        Command::Hidden => {
            let hidden: Vec<ProposalId> = snapshot
                .proposals
                .iter()
                .map(|p| p.id)
                .filter(|id| view.should_hide(*id))
                .collect();
            output::ids(&hidden, cli.json)?;
        }
        Command::Winners => output::winners(&view, cli.json)?,
        Command::CanPropose { account } => {
            let permission = view.can_propose(&account);
            output::permission(&account, &permission, now, cli.json)?;
        }
        Command::Watch | Command::Config => {}
    }
    Ok(())
}

async fn watch(ledger: FileLedger, config: WatcherConfig, json: bool) -> anyhow::Result<()> {
    tracing::info!(
        snapshot = %config.snapshot_path.display(),
        round_poll_secs = config.round_poll_secs,
        headcount_poll_secs = config.headcount_poll_secs,
        "starting round watcher"
    );
    let watcher = Arc::new(RoundWatcher::new(
        Arc::new(ledger),
        Arc::new(SystemClock),
        config,
    )?);
    let shutdown = Arc::new(ShutdownController::new());

    let poll_task = {
        let watcher = Arc::clone(&watcher);
        let rx = shutdown.subscribe();
        tokio::spawn(async move { watcher.run(rx).await })
    };
    let signal_task = {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move { shutdown.wait_for_signal().await })
    };

    let mut summaries = watcher.subscribe();
    let mut stop = shutdown.subscribe();
    let mut last = None;
    loop {
        tokio::select! {
            _ = stop.recv() => break,
            changed = summaries.changed() => {
                if changed.is_err() {
                    break;
                }
                let summary = summaries.borrow_and_update().clone();
                let key = (summary.rounds.clone(), summary.statuses.clone());
                if last.as_ref() != Some(&key) {
                    output::summary(&summary, json)?;
                    last = Some(key);
                }
            }
        }
    }

    poll_task.await?;
    signal_task.abort();
    if let Some(metrics) = watcher.metrics() {
        print!("{}", metrics.encode()?);
    }
    tracing::info!("round watcher exited cleanly");
    Ok(())
}
