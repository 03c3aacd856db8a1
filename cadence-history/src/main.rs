use anyhow::{Context, Result};
use clap::Parser;
use libcadence::logging::LoggingConfig;
use libcadence::scheduling::format_timestamp;
use libcadence::service::history::{HistoryStats, DEFAULT_LIMIT};
use libcadence::service::CadenceService;
use libcadence::{Config, HistoryFilter, HistoryRecord, HistoryStatus, PlatformKind};

#[derive(Parser, Debug)]
#[command(name = "cadence-history")]
#[command(version, about = "Query publish history")]
#[command(long_about = r#"Query the history of publish attempts with filtering and formatting options.

Every attempt the processor makes on a platform is recorded once, successful
or not. Skipped platforms (missing credentials, no content) are not recorded.

EXAMPLES:
    # Show the last 100 attempts (default)
    cadence-history

    # Only failures on LinkedIn
    cadence-history --platform linkedin --status failed

    # Everything one schedule has published
    cadence-history --schedule <SCHEDULE_ID> --status success

    # Filter by date range
    cadence-history --since "2025-10-01" --until "2025-10-05"
    cadence-history --since "2025-10-01T09:00:00Z"

    # Search published text
    cadence-history --search "rust"

    # Success rates per platform
    cadence-history --stats
    cadence-history --stats --format json

    # JSON output for scripting
    cadence-history --format json | jq -r '.[] | select(.status == "failed") | .error_message'

    # Export to CSV for analysis
    cadence-history --format csv > history.csv

OUTPUT FORMATS:
    text  - Human-readable text with timestamps and status (default)
    json  - JSON array (complete data structure)
    jsonl - JSON lines, one object per line (streaming-friendly)
    csv   - CSV with headers (spreadsheet-compatible)

EXIT CODES:
    0 - Success (including empty results)
    1 - Error (database not found, query failed, invalid filter, etc.)
"#)]
struct Args {
    /// Filter by platform (threads, linkedin, instagram)
    #[arg(short, long, value_name = "PLATFORM")]
    platform: Option<String>,

    /// Filter by attempt status
    #[arg(long, value_name = "STATUS")]
    #[arg(value_parser = ["success", "failed"])]
    status: Option<String>,

    /// Filter by schedule
    #[arg(long, value_name = "SCHEDULE_ID")]
    schedule: Option<String>,

    /// Filter attempts since this date (Unix timestamp or ISO 8601 format)
    #[arg(long, value_name = "DATE")]
    #[arg(help = "Show attempts since this date (Unix timestamp, YYYY-MM-DD, or ISO 8601 format)")]
    since: Option<String>,

    /// Filter attempts until this date (Unix timestamp or ISO 8601 format)
    #[arg(long, value_name = "DATE")]
    #[arg(help = "Show attempts until this date (Unix timestamp, YYYY-MM-DD, or ISO 8601 format)")]
    until: Option<String>,

    /// Search attempts by content
    #[arg(short, long, value_name = "TERM")]
    #[arg(help = "Search attempts whose text contains this term (case-insensitive)")]
    search: Option<String>,

    /// Maximum number of records to return
    #[arg(short, long, default_value_t = DEFAULT_LIMIT, value_name = "N")]
    limit: usize,

    /// Show per-platform totals and success rates instead of records
    #[arg(long)]
    stats: bool,

    /// User whose history to query (default: defaults.user_id from config)
    #[arg(long, value_name = "USER_ID")]
    user: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(help = "Output format: text (human-readable), json (array), jsonl (streaming), or csv (spreadsheet)")]
    #[arg(value_parser = ["text", "json", "jsonl", "csv"])]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Parse date string to Unix timestamp
fn parse_date(date_str: &str) -> Result<i64> {
    // Try parsing as Unix timestamp first
    if let Ok(timestamp) = date_str.parse::<i64>() {
        return Ok(timestamp);
    }

    let dt = chrono::DateTime::parse_from_rfc3339(date_str)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::default()).and_utc())
        })
        .with_context(|| {
            format!(
                "Invalid date format: {}. Use Unix timestamp or ISO 8601 (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SSZ)",
                date_str
            )
        })?;

    Ok(dt.timestamp())
}

fn build_filter(args: &Args, user_id: String) -> Result<HistoryFilter> {
    let platform = args
        .platform
        .as_deref()
        .map(str::parse::<PlatformKind>)
        .transpose()?;
    let status = args
        .status
        .as_deref()
        .map(str::parse::<HistoryStatus>)
        .transpose()?;

    Ok(HistoryFilter {
        user_id: Some(user_id),
        platform,
        status,
        scheduled_post_id: args.schedule.clone(),
        search: args.search.clone(),
        since: args.since.as_deref().map(parse_date).transpose()?,
        until: args.until.as_deref().map(parse_date).transpose()?,
        limit: args.limit,
    })
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    LoggingConfig::from_env("error", args.verbose).init();

    tracing::debug!("cadence-history started with args: {:?}", args);

    if let Err(e) = run(args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    // Reading never creates the database
    let db_path = shellexpand::tilde(&config.database.path).to_string();
    if !std::path::Path::new(&db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Nothing has been scheduled yet? Try: cadence-queue template add",
            db_path
        );
    }

    let user_id = args
        .user
        .clone()
        .unwrap_or_else(|| config.defaults.user_id.clone());
    let filter = build_filter(&args, user_id)?;

    let service = CadenceService::from_config(config)
        .await
        .context("Failed to open database")?;

    if args.stats {
        let stats = service.history().stats(&filter).await?;
        output_stats(&stats, &args.format)?;
    } else {
        let records = service
            .history()
            .list(&filter)
            .await
            .context("Failed to query history")?;
        output_records(&records, &args.format)?;
    }

    Ok(())
}

fn output_records(records: &[HistoryRecord], format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
        "jsonl" => {
            for record in records {
                println!("{}", serde_json::to_string(record)?);
            }
        }
        "csv" => {
            println!("id,posted_at,platform,status,platform_post_id,error,scheduled_post_id,content");
            for record in records {
                println!(
                    "{},{},{},{},{},{},{},{}",
                    record.id.map(|id| id.to_string()).unwrap_or_default(),
                    record.posted_at,
                    record.platform,
                    record.status.as_str(),
                    record.platform_post_id.as_deref().unwrap_or(""),
                    csv_field(record.error_message.as_deref().unwrap_or("")),
                    record.scheduled_post_id.as_deref().unwrap_or(""),
                    csv_field(&record.content)
                );
            }
        }
        _ => {
            for record in records {
                let preview = truncate(&record.content, 60);
                println!(
                    "{} | {} | {}",
                    format_timestamp(record.posted_at),
                    record.platform,
                    preview
                );

                match record.status {
                    HistoryStatus::Success => println!(
                        "  ✓ {}",
                        record.platform_post_id.as_deref().unwrap_or("published")
                    ),
                    HistoryStatus::Failed => println!(
                        "  ✗ {}",
                        record.error_message.as_deref().unwrap_or("failed")
                    ),
                }
                println!();
            }
        }
    }
    Ok(())
}

fn output_stats(stats: &HistoryStats, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(stats)?),
        "jsonl" => {
            for platform in &stats.platforms {
                println!("{}", serde_json::to_string(platform)?);
            }
        }
        "csv" => {
            println!("platform,total,successful,failed,success_rate");
            for p in &stats.platforms {
                println!(
                    "{},{},{},{},{:.1}",
                    p.platform, p.total, p.successful, p.failed, p.success_rate
                );
            }
        }
        _ => {
            println!(
                "Total attempts: {} ({} successful, {} failed)",
                stats.total, stats.successful, stats.failed
            );
            for p in &stats.platforms {
                println!(
                    "  {}: {}/{} successful ({:.1}%)",
                    p.platform, p.successful, p.total, p.success_rate
                );
            }
        }
    }
    Ok(())
}

/// Quote a CSV field, doubling embedded quotes
fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn truncate(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() > max_chars {
        let head: String = content.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        content
    }
}
