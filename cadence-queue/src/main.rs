//! cadence-queue - Manage templates and recurring schedules
//!
//! Unix-style tool for the schedule side of Cadence: prompt templates,
//! recurring schedules and content previews.

use std::collections::HashMap;

use clap::{Args, Parser, Subcommand};
use libcadence::generator::ChatCompletionGenerator;
use libcadence::logging::LoggingConfig;
use libcadence::scheduling::{format_timestamp, parse_start};
use libcadence::service::schedule::NewSchedule;
use libcadence::service::CadenceService;
use libcadence::types::PlatformContent;
use libcadence::{
    CadenceError, Interval, IntervalUnit, PlatformKind, Result, ScheduledPost, Template,
};

#[derive(Parser, Debug)]
#[command(name = "cadence-queue")]
#[command(version)]
#[command(about = "Manage templates and recurring schedules")]
#[command(long_about = "\
cadence-queue - Manage templates and recurring schedules

DESCRIPTION:
    cadence-queue manages what cadence-send publishes. A template holds the
    prompt handed to the content generator; a schedule ties a template to
    a recurrence interval and a set of platforms, with optional fixed text
    per platform that replaces generated content.

COMMANDS:
    template add|list|delete  Manage prompt templates
    add                       Create a recurring schedule
    list                      List schedules
    pause                     Stop a schedule from running
    resume                    Re-activate a paused schedule
    delete                    Remove a schedule
    preview                   Generate and store the next post's text now

USAGE EXAMPLES:
    # Create a template
    cadence-queue template add \"Rust tips\" --prompt \"Share one practical Rust tip\"

    # Post to Threads and LinkedIn every 6 hours, starting tomorrow 9am
    cadence-queue add --template <TEMPLATE_ID> --every 6 --unit hours \\
        --platform threads --platform linkedin --start \"tomorrow 9am\"

    # Fixed LinkedIn text, generated text elsewhere
    cadence-queue add --template <TEMPLATE_ID> --every 1 --unit days \\
        --platform threads --platform linkedin --linkedin-text \"Weekly digest is out\"

    # List schedules as JSON
    cadence-queue list --format json

    # See (and lock in) the text the next cycle will publish
    cadence-queue preview <SCHEDULE_ID>

CONFIGURATION:
    Configuration file: ~/.config/cadence/config.toml
    Database location: ~/.local/share/cadence/cadence.db

    Override with environment variables:
        CADENCE_CONFIG    - Path to config file
        CADENCE_DB_PATH   - Path to database file

EXIT CODES:
    0 - Success
    1 - Operation failed (database, generator)
    2 - Configuration error
    3 - Invalid input (unknown ID, bad interval or time format, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// User to act on behalf of (default: defaults.user_id from config)
    #[arg(long, global = true, value_name = "USER_ID")]
    user: Option<String>,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage prompt templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },

    /// Create a recurring schedule
    Add(AddArgs),

    /// List schedules
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        #[arg(value_parser = ["text", "json"])]
        format: String,

        /// Only schedules that publish to this platform
        #[arg(short, long)]
        platform: Option<String>,
    },

    /// Pause a schedule
    Pause {
        /// Schedule ID
        schedule_id: String,
    },

    /// Resume a paused schedule
    Resume {
        /// Schedule ID
        schedule_id: String,
    },

    /// Delete a schedule
    Delete {
        /// Schedule ID
        schedule_id: String,
    },

    /// Generate the next post's text and store it for the next cycle
    Preview {
        /// Schedule ID
        schedule_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// Create a template
    Add {
        /// Short title shown in listings
        title: String,

        /// Prompt handed to the content generator
        #[arg(long)]
        prompt: String,

        /// Language of the generated posts (default: en)
        #[arg(long)]
        language: Option<String>,
    },

    /// List templates
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        #[arg(value_parser = ["text", "json"])]
        format: String,
    },

    /// Delete a template that no schedule uses
    Delete {
        /// Template ID
        template_id: String,
    },
}

#[derive(Args, Debug)]
struct AddArgs {
    /// Template ID providing the prompt
    #[arg(long)]
    template: String,

    /// Number of units between posts
    #[arg(long, value_name = "N")]
    every: u32,

    /// Interval unit: minutes, hours or days
    #[arg(long, default_value = "hours")]
    unit: String,

    /// Platform to publish to (repeatable)
    #[arg(short, long = "platform", required = true)]
    platforms: Vec<String>,

    /// Fixed Threads text instead of generated content
    #[arg(long)]
    threads_text: Option<String>,

    /// Fixed LinkedIn text instead of generated content
    #[arg(long)]
    linkedin_text: Option<String>,

    /// Fixed Instagram caption instead of generated content
    #[arg(long)]
    instagram_text: Option<String>,

    /// First run (e.g. "now", "30m", "tomorrow 9am"); default: one interval from now
    #[arg(long)]
    start: Option<String>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    #[arg(value_parser = ["text", "json"])]
    format: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env("error", cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let service = CadenceService::new().await?;
    let user_id = cli
        .user
        .unwrap_or_else(|| service.config().defaults.user_id.clone());

    match cli.command {
        Commands::Template { command } => match command {
            TemplateCommands::Add {
                title,
                prompt,
                language,
            } => cmd_template_add(&service, &user_id, &title, &prompt, language.as_deref()).await?,
            TemplateCommands::List { format } => {
                cmd_template_list(&service, &user_id, &format).await?
            }
            TemplateCommands::Delete { template_id } => {
                service.schedules().delete_template(&template_id).await?;
                println!("Deleted template {}", template_id);
            }
        },
        Commands::Add(args) => cmd_add(&service, &user_id, args).await?,
        Commands::List { format, platform } => {
            cmd_list(&service, &user_id, &format, platform.as_deref()).await?
        }
        Commands::Pause { schedule_id } => {
            service.schedules().pause(&schedule_id).await?;
            println!("Paused {}", schedule_id);
        }
        Commands::Resume { schedule_id } => {
            service.schedules().resume(&schedule_id).await?;
            println!("Resumed {}", schedule_id);
        }
        Commands::Delete { schedule_id } => {
            service.schedules().delete(&schedule_id).await?;
            println!("Deleted {}", schedule_id);
        }
        Commands::Preview { schedule_id } => cmd_preview(&service, &schedule_id).await?,
    }

    Ok(())
}

async fn cmd_template_add(
    service: &CadenceService,
    user_id: &str,
    title: &str,
    prompt: &str,
    language: Option<&str>,
) -> Result<()> {
    let template = service
        .schedules()
        .create_template(user_id, title, prompt, language)
        .await?;
    println!("{}", template.id);
    Ok(())
}

async fn cmd_template_list(service: &CadenceService, user_id: &str, format: &str) -> Result<()> {
    let templates = service.schedules().list_templates(user_id).await?;

    if format == "json" {
        print_json(&templates)?;
        return Ok(());
    }

    for template in &templates {
        println!(
            "{} | {} | {} | {}",
            template.id,
            template.title,
            template.language,
            truncate_content(&template.comment, 50)
        );
    }
    Ok(())
}

async fn cmd_add(service: &CadenceService, user_id: &str, args: AddArgs) -> Result<()> {
    let unit: IntervalUnit = args.unit.parse()?;
    let interval = Interval::new(args.every, unit)?;

    let platforms = args
        .platforms
        .iter()
        .map(|p| p.parse::<PlatformKind>())
        .collect::<Result<Vec<_>>>()?;

    let overrides = PlatformContent {
        threads: args.threads_text,
        linkedin: args.linkedin_text,
        instagram: args.instagram_text,
    };

    let now = chrono::Utc::now();
    let start = args
        .start
        .as_deref()
        .map(|input| parse_start(input, now))
        .transpose()?
        .map(|dt| dt.timestamp());

    let post = service
        .schedules()
        .create(
            NewSchedule {
                user_id: user_id.to_string(),
                template_id: args.template,
                interval,
                platforms,
                overrides,
                start,
            },
            now.timestamp(),
        )
        .await?;

    if args.format == "json" {
        print_json(&post)?;
    } else {
        println!("{}", post.id);
        println!("Next post: {}", format_timestamp(post.next_post_time));
    }
    Ok(())
}

/// List schedules
async fn cmd_list(
    service: &CadenceService,
    user_id: &str,
    format: &str,
    platform: Option<&str>,
) -> Result<()> {
    let mut posts = service.schedules().list(user_id).await?;

    if let Some(platform) = platform {
        let kind: PlatformKind = platform.parse()?;
        posts.retain(|p| p.is_enabled(kind));
    }

    if format == "json" {
        print_json(&posts)?;
    } else {
        let templates: HashMap<String, Template> = service
            .schedules()
            .list_templates(user_id)
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
        output_list_text(&posts, &templates);
    }

    Ok(())
}

/// Output schedules as human-readable text
fn output_list_text(posts: &[ScheduledPost], templates: &HashMap<String, Template>) {
    let now = chrono::Utc::now().timestamp();

    for post in posts {
        let title = templates
            .get(&post.template_id)
            .map(|t| truncate_content(&t.title, 30))
            .unwrap_or_else(|| post.template_id.clone());
        let platforms: Vec<&str> = post.platforms.iter().map(|p| p.as_str()).collect();
        let next = match post.status {
            libcadence::ScheduleStatus::Active => format_time_until(now, post.next_post_time),
            libcadence::ScheduleStatus::Paused => "paused".to_string(),
        };

        println!(
            "{} | {} | {} | {} | {}",
            post.id,
            title,
            post.interval,
            platforms.join(","),
            next
        );
    }
}

async fn cmd_preview(service: &CadenceService, schedule_id: &str) -> Result<()> {
    let generator = ChatCompletionGenerator::new(&service.config().generator)?;
    let text = service.schedules().preview(schedule_id, &generator).await?;
    println!("{}", text);
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CadenceError::InvalidInput(format!("Failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Truncate content to max characters with ellipsis
fn truncate_content(content: &str, max_len: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_len {
        content
    } else {
        let truncated: String = content.chars().take(max_len).collect();
        format!("{}...", truncated)
    }
}

/// Format time until scheduled time in human-readable format
fn format_time_until(now: i64, scheduled_at: i64) -> String {
    let diff = scheduled_at - now;

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}
