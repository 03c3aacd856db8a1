//! cadence-send - Publish due scheduled posts
//!
//! Runs the processing cycle either once (manual trigger) or on a poll loop
//! until SIGINT/SIGTERM.

use clap::{Parser, ValueEnum};
use libcadence::logging::LoggingConfig;
use libcadence::processor::{AttemptStatus, CycleSummary};
use libcadence::{CadenceError, Config, Database, Result, ScheduledPostProcessor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cadence-send")]
#[command(version)]
#[command(about = "Publish due scheduled posts")]
#[command(long_about = "\
cadence-send - Publish due scheduled posts

DESCRIPTION:
    cadence-send runs the scheduled-post processor. Each cycle finds the
    active schedules whose next post time has passed, generates or reuses
    their content, publishes to every enabled platform with credentials,
    records one history entry per attempt and moves successful schedules
    to their next due time.

    Without --once it runs as a daemon, starting a cycle every poll
    interval until interrupted.

USAGE:
    # Run as a daemon (logs to stderr)
    cadence-send

    # Run a single cycle now and print the summary
    cadence-send --once

    # Single cycle with a machine-readable summary
    cadence-send --once --format json | jq '.results[] | .overallStatus'

    # Poll every 30 seconds with debug logging
    cadence-send --poll-interval 30 --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current cycle)

CONFIGURATION:
    Configuration file: ~/.config/cadence/config.toml
    Database location: ~/.local/share/cadence/cadence.db

    [scheduling]
    poll_interval = 60  # seconds between cycles

    [generator]
    api_key_env = \"CADENCE_GENERATOR_API_KEY\"

    Override with environment variables:
        CADENCE_CONFIG     - Path to config file
        CADENCE_DB_PATH    - Path to database file
        CADENCE_LOG_FORMAT - text, json or pretty
        CADENCE_LOG_LEVEL  - error, warn, info, debug or trace

EXIT CODES:
    0 - Cycle completed / clean shutdown (individual publish failures are
        reported in the summary and history, not the exit code)
    1 - Runtime error (database unavailable)
    2 - Configuration error
    3 - Invalid input
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to run a cycle in daemon mode (default: from config, 60)")]
    poll_interval: Option<u64>,

    /// Run a single cycle and exit
    #[arg(long)]
    #[arg(help = "Process due posts once, print the cycle summary and exit")]
    once: bool,

    /// Summary format for --once
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env("info", cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    let processor = ScheduledPostProcessor::from_config(&config, db)?;

    if cli.once {
        let summary = processor.run_cycle().await?;
        print_summary(&summary, cli.format)?;
        return Ok(());
    }

    let poll_interval = cli
        .poll_interval
        .unwrap_or(config.scheduling.poll_interval)
        .max(1);

    info!("cadence-send daemon starting (poll interval: {}s)", poll_interval);

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    run_daemon_loop(&processor, poll_interval, shutdown).await;

    info!("cadence-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| CadenceError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

async fn run_daemon_loop(
    processor: &ScheduledPostProcessor,
    poll_interval: u64,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        match processor.run_cycle().await {
            Ok(summary) if summary.processed > 0 => {
                info!(
                    processed = summary.processed,
                    success = summary.count(libcadence::processor::OverallStatus::Success),
                    partial = summary.count(libcadence::processor::OverallStatus::Partial),
                    failed = summary.count(libcadence::processor::OverallStatus::Failed),
                    skipped = summary.count(libcadence::processor::OverallStatus::Skipped),
                    "Cycle complete"
                );
            }
            Ok(_) => {}
            Err(e) => error!("Cycle aborted: {}", e),
        }

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

fn print_summary(summary: &CycleSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(summary).map_err(|e| {
                CadenceError::InvalidInput(format!("Failed to serialize summary: {}", e))
            })?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("Processed {} due post(s)", summary.processed);
            for result in &summary.results {
                println!("{} | {}", result.id, result.overall_status);
                for platform in &result.platform_results {
                    let (symbol, detail) = match platform.status {
                        AttemptStatus::Success => ("✓", platform.platform_post_id.as_deref()),
                        AttemptStatus::Failed => ("✗", platform.error.as_deref()),
                        AttemptStatus::Skipped => ("-", platform.error.as_deref()),
                    };
                    match detail {
                        Some(detail) => println!("  {} {}: {}", symbol, platform.platform, detail),
                        None => println!("  {} {}", symbol, platform.platform),
                    }
                }
                if let Some(ref error) = result.error {
                    println!("  ! {}", error);
                }
            }
        }
    }
    Ok(())
}
