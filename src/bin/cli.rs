//! webwatch CLI
//!
//! Runs all configured watches once; meant to be called from cron or a
//! systemd timer.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use webwatch::{
    error::Result,
    models::{Config, RunReport},
    pipeline::Watcher,
    storage::{LocalStorage, SnapshotBackend},
};

/// webwatch - Website Change Watcher
#[derive(Parser, Debug)]
#[command(
    name = "webwatch",
    version,
    about = "Watches web pages and notifies on content changes"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every enabled watch once
    Run {
        /// Log detected changes instead of sending notifications
        #[arg(long)]
        test: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Show snapshot database info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run { test } => run(&cli.config, test).await,
        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());
            let config = Config::load_validated(&cli.config)?;
            log::info!(
                "Config OK: {} watches ({} disabled)",
                config.watches.len(),
                config.watches.iter().filter(|w| !w.is_enabled()).count()
            );
            Ok(())
        }
        Command::Info => info(&cli.config).await,
    }
}

async fn run(config_path: &Path, dry_run: bool) -> Result<()> {
    let config = Config::load_validated(config_path)?;
    log::info!("Loaded configuration from {}", config_path.display());
    if dry_run {
        log::info!("Test mode: change notifications are disabled");
    }

    let watcher = Watcher::from_config(config).await?.dry_run(dry_run);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling run...");
            on_signal.cancel();
        }
    });

    let report = watcher.run(&cancel).await?;
    log_report(&report);
    Ok(())
}

async fn info(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let storage = LocalStorage::new(&config.storage.database);
    log::info!("Snapshot database: {}", storage.location());

    let data = storage.load().await?;
    match data.last_run {
        Some(last_run) => log::info!("Last run: {}", last_run.to_rfc3339()),
        None => log::info!("No run recorded yet."),
    }
    log::info!("Stored websites: {}", data.websites.len());

    let urls = config.watch_urls();
    let unseen = urls
        .iter()
        .filter(|url| !data.websites.contains_key(*url))
        .count();
    log::info!("Configured watches: {} ({} never stored)", urls.len(), unseen);
    Ok(())
}

fn log_report(report: &RunReport) {
    log::info!(
        "Run complete: {} new, {} unchanged, {} changed",
        report.new_resources,
        report.unchanged,
        report.changed
    );
    if report.ignored_errors + report.reported_errors + report.fatal_errors > 0 {
        log::info!(
            "Errors: {} ignored, {} reported, {} fatal",
            report.ignored_errors,
            report.reported_errors,
            report.fatal_errors
        );
    }
    if report.skipped > 0 {
        log::info!("Skipped {} disabled watches", report.skipped);
    }
    if report.not_dispatched > 0 {
        log::warn!("{} watches were not checked (cancelled)", report.not_dispatched);
    }
}
