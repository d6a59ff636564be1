//! ghwatch CLI
//!
//! Polls GitHub search on a schedule and reports results not seen before.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use ghwatch::{
    config,
    error::Result,
    models::Config,
    pipeline::{Backoff, BackoffConfig, CycleOutcome, CycleRunner, DedupEngine, Scheduler, StopSignal},
    report::{LogSink, ReportFanout},
    services::{GitHubClient, SearchApi},
    storage::{JsonStateStore, MemoryStateStore, StateStore},
    utils::log::{header, separator, summary},
};

/// ghwatch - GitHub search watcher
#[derive(Parser, Debug)]
#[command(
    name = "ghwatch",
    version,
    about = "Reports newly published GitHub search results"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "ghwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll on the configured interval until interrupted
    Run,

    /// Run a single cycle and exit
    Once {
        /// Report new results without persisting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration file
    Validate {
        /// Print the effective configuration, token masked
        #[arg(long)]
        print: bool,
    },

    /// Show the persisted watch state
    Info,

    /// Apply the retention policy to the seen set now
    Compact,
}

/// Initialize logging from the configured level, or debug when verbose.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let loaded = config::load_config(&cli.config);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let result = match loaded {
        Ok(config) => execute(&cli, config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: &Cli, config: Config) -> Result<()> {
    if cli.config.exists() {
        log::info!("Loaded configuration from {}", cli.config.display());
    } else {
        log::warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
    }

    match cli.command {
        Command::Run => {
            config.validate()?;
            let stop = StopSignal::new();
            spawn_ctrl_c(stop.clone());

            let client = Arc::new(GitHubClient::new(config.github.clone())?);
            let store = Arc::new(JsonStateStore::new(&config.storage.state_file));
            let sinks = ReportFanout::from_config(&config.report);
            let runner = open_runner(&config, client, store, sinks).await?;
            let mut scheduler =
                Scheduler::new(runner, Backoff::new(BackoffConfig::from(&config.watch)), stop);
            if !config.watch.run_on_start {
                scheduler = scheduler.delay_first_cycle();
            }
            scheduler.run().await?;
        }

        Command::Once { dry_run } => {
            config.validate()?;
            let stop = StopSignal::new();
            spawn_ctrl_c(stop.clone());

            let client = Arc::new(GitHubClient::new(config.github.clone())?);
            let json = JsonStateStore::new(&config.storage.state_file);
            let runner = if dry_run {
                log::info!("Dry run: state will not be written");
                let mut sinks = ReportFanout::new();
                sinks.push(LogSink::new(config.report.template.clone()));
                let store = Arc::new(MemoryStateStore::new(json.load().await?));
                open_runner(&config, Arc::clone(&client), store, sinks).await?
            } else {
                let sinks = ReportFanout::from_config(&config.report);
                open_runner(&config, Arc::clone(&client), Arc::new(json), sinks).await?
            };

            let backoff = Backoff::new(BackoffConfig::from(&config.watch));
            let mut scheduler = Scheduler::new(runner, backoff, stop);
            match scheduler.run_once().await? {
                CycleOutcome::Completed(report) => summary(
                    "Cycle complete",
                    &[
                        ("Queries", report.queries_run.to_string()),
                        ("Fetched", report.fetched.to_string()),
                        ("New", report.new.to_string()),
                        ("Ignored", report.ignored.to_string()),
                        ("Known repos checked", report.repos_checked.to_string()),
                        ("Status changes", report.status_changes.to_string()),
                        ("Seen total", report.seen_total.to_string()),
                    ],
                ),
                CycleOutcome::RateLimited { report, retry_after } => log::warn!(
                    "Rate limited: {} new result(s) committed, pass resumes after {}s",
                    report.new,
                    retry_after.as_secs()
                ),
                CycleOutcome::Transient(message) => {
                    log::warn!("Cycle failed, nothing committed: {}", message)
                }
                CycleOutcome::Cancelled => log::info!("Cycle cancelled"),
            }

            let quota = client.rate_limit();
            if let (Some(remaining), Some(limit)) = (quota.remaining, quota.limit) {
                let reset = quota
                    .reset_at
                    .map_or_else(|| "unknown".to_string(), |at| at.to_rfc3339());
                log::info!("Search quota: {}/{} remaining, resets {}", remaining, limit, reset);
            }
        }

        Command::Validate { print } => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} queries, {} search)",
                config.queries.len(),
                config.github.kind.endpoint()
            );
            if print {
                println!("{}", config.to_toml()?);
            }
        }

        Command::Info => {
            let store = JsonStateStore::new(&config.storage.state_file);
            let state = store.load().await?;

            header("ghwatch state");
            log::info!("State file: {}", store.path().display());
            log::info!("Seen identifiers: {}", state.seen.len());
            match state.last_run_at {
                Some(at) => log::info!("Last completed pass: {}", at.to_rfc3339()),
                None => log::info!("No completed pass yet."),
            }
            if let Some(cursor) = &state.cursor {
                separator();
                log::info!(
                    "Pending pass started {} resumes at '{}'",
                    cursor.started_at.to_rfc3339(),
                    cursor.next_query
                );
            }
            if !state.known.is_empty() {
                separator();
                log::info!("Known repositories:");
                for (repo, status) in &state.known {
                    log::info!("  {:<40} {}", repo, status);
                }
            }
        }

        Command::Compact => {
            let retention = config.storage.retention();
            if retention.is_disabled() {
                log::warn!("No retention policy configured; nothing to compact");
                return Ok(());
            }

            let store = JsonStateStore::new(&config.storage.state_file);
            let mut state = store.load().await?;
            let removed = state.seen.compact(&retention, Utc::now());
            if removed > 0 {
                store.commit(&state).await?;
            }
            log::info!(
                "Removed {} seen identifier(s), {} remain",
                removed,
                state.seen.len()
            );
        }
    }

    Ok(())
}

async fn open_runner(
    config: &Config,
    client: Arc<GitHubClient>,
    store: Arc<dyn StateStore>,
    sinks: ReportFanout,
) -> Result<CycleRunner> {
    let engine = DedupEngine::with_ignored_urls(&config.watch.ignore_urls);
    let search: Arc<dyn SearchApi> = client.clone();
    let mut runner = CycleRunner::open(search, store, sinks, engine, config.ordered_queries())
        .await?
        .with_retention(config.storage.retention());
    if config.watch.check_known {
        runner = runner.with_known_repos(client, &config.watch.ignore_urls);
        log::info!("Tracking status of {} known repositories", runner.known_repos().count());
    }
    Ok(runner)
}

fn spawn_ctrl_c(stop: StopSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupt received, stopping after the current request...");
            stop.stop();
        }
    });
}
