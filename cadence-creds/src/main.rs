//! cadence-creds - Credential management tool for Cadence
//!
//! Stores the per-user platform tokens the processor publishes with.

use anyhow::Result;
use clap::{Parser, Subcommand};
use libcadence::logging::LoggingConfig;
use libcadence::{CadenceError, Config, Credentials, Database, PlatformKind};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

#[derive(Parser)]
#[command(name = "cadence-creds")]
#[command(version)]
#[command(about = "Manage Cadence platform credentials")]
#[command(long_about = "\
cadence-creds - Manage Cadence platform credentials

DESCRIPTION:
    Stores the access tokens cadence-send publishes with, one set per user.
    Threads needs an app id and a token, Instagram a business user id and
    a token, LinkedIn only a token. A platform without a complete set is
    skipped by the processor.

USAGE EXAMPLES:
    # Store a Threads token (prompts without echo)
    cadence-creds set threads --account-id 1234567890

    # Store a LinkedIn token from a secrets manager
    pass show cadence/linkedin | cadence-creds set linkedin --stdin

    # Show which platforms are configured
    cadence-creds list

    # Remove Instagram credentials
    cadence-creds delete instagram --force

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Configuration error
    3 - Invalid input (unknown platform, missing account id, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// User to act on behalf of (default: defaults.user_id from config)
    #[arg(long, global = true, value_name = "USER_ID")]
    user: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store credentials for a platform
    Set {
        /// Platform name (threads, linkedin, instagram)
        platform: String,

        /// Threads app id or Instagram business user id
        #[arg(long)]
        account_id: Option<String>,

        /// Read the token from stdin (for automation/agents)
        #[arg(long)]
        stdin: bool,

        /// Overwrite existing credentials without asking
        #[arg(short, long)]
        force: bool,
    },

    /// List configured platforms (without showing tokens)
    List {
        /// Filter by platform (optional)
        #[arg(long)]
        platform: Option<String>,
    },

    /// Delete credentials for a platform
    Delete {
        /// Platform name (threads, linkedin, instagram)
        platform: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env("warn", cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        let code = e
            .downcast_ref::<CadenceError>()
            .map(CadenceError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    let user_id = cli.user.unwrap_or(config.defaults.user_id);

    match cli.command {
        Commands::Set {
            platform,
            account_id,
            stdin,
            force,
        } => {
            set_credentials(
                &db,
                &user_id,
                &platform,
                account_id.as_deref(),
                stdin,
                force,
            )
            .await
        }
        Commands::List { platform } => list_credentials(&db, &user_id, platform.as_deref()).await,
        Commands::Delete { platform, force } => {
            delete_credentials(&db, &user_id, &platform, force).await
        }
    }
}

/// Set credentials for a platform
async fn set_credentials(
    db: &Database,
    user_id: &str,
    platform: &str,
    account_id: Option<&str>,
    use_stdin: bool,
    force: bool,
) -> Result<()> {
    let kind: PlatformKind = platform.parse()?;

    if kind != PlatformKind::Linkedin && account_id.map_or(true, |id| id.trim().is_empty()) {
        let flag_help = match kind {
            PlatformKind::Threads => "Threads app id",
            _ => "Instagram business user id",
        };
        return Err(CadenceError::InvalidInput(format!(
            "{} credentials require --account-id (the {})",
            kind, flag_help
        ))
        .into());
    }

    let interactive = !use_stdin && atty::is(atty::Stream::Stdin);

    // If a credential already exists, require explicit confirmation before overwriting
    let existing = db.get_credentials(user_id).await?;
    if !force && existing.as_ref().is_some_and(|c| c.has_platform(kind)) {
        if !interactive {
            anyhow::bail!(
                "Credentials for {} already exist for user '{}'. Refusing to overwrite in \
                 non-interactive mode. Pass --force or delete first with 'cadence-creds delete {}'.",
                kind,
                user_id,
                kind
            );
        }

        use std::io::{self, Write};
        println!(
            "\n⚠️  {} credentials already exist for user '{}'. This will OVERWRITE them.",
            kind, user_id
        );
        print!("Type 'overwrite' to confirm (or anything else to cancel): ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if input.trim() != "overwrite" {
            println!("Cancelled");
            return Ok(());
        }
    }

    let token = if use_stdin {
        // Explicit stdin mode: for automation/agents
        use std::io::{self, Read};
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer.trim().to_string()
    } else {
        if !interactive {
            anyhow::bail!("Not a TTY. Use --stdin to read the token from stdin for automation.");
        }
        rpassword::prompt_password(format!("Enter {} access token for '{}': ", kind, user_id))?
    };

    if token.trim().is_empty() {
        anyhow::bail!("Access token cannot be empty");
    }

    let token = SecretString::from(token);
    db.set_platform_credentials(user_id, kind, account_id, &token)
        .await?;
    debug!(user_id, platform = %kind, "Stored credentials");

    println!("✓ Stored {} credentials for user '{}'", kind, user_id);
    Ok(())
}

/// List configured platforms
async fn list_credentials(db: &Database, user_id: &str, platform: Option<&str>) -> Result<()> {
    let platforms = match platform {
        Some(platform) => vec![platform.parse::<PlatformKind>()?],
        None => PlatformKind::ALL.to_vec(),
    };

    let credentials = db
        .get_credentials(user_id)
        .await?
        .unwrap_or_else(|| Credentials::empty(user_id));

    println!("Credentials for user '{}':", user_id);
    println!();

    for kind in platforms {
        println!("  {}", describe_platform(&credentials, kind));
    }

    if !PlatformKind::ALL.iter().any(|k| credentials.has_platform(*k)) {
        println!();
        println!("Use 'cadence-creds set <platform>' to store credentials.");
    }

    Ok(())
}

fn describe_platform(credentials: &Credentials, kind: PlatformKind) -> String {
    let (account, token) = match kind {
        PlatformKind::Threads => credentials
            .threads()
            .map(|a| (Some(a.account_id), a.access_token)),
        PlatformKind::Instagram => credentials
            .instagram()
            .map(|a| (Some(a.account_id), a.access_token)),
        PlatformKind::Linkedin => credentials.linkedin().map(|token| (None, token)),
    }
    .unzip();

    match token {
        Some(token) => {
            let masked = mask(token.expose_secret());
            match account.flatten() {
                Some(account) => format!("✓ {}: account {}, token {}", kind, account, masked),
                None => format!("✓ {}: token {}", kind, masked),
            }
        }
        None => format!("✗ {}: not configured", kind),
    }
}

/// Show only the last four characters of a secret
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Delete credentials for a platform
async fn delete_credentials(db: &Database, user_id: &str, platform: &str, force: bool) -> Result<()> {
    let kind: PlatformKind = platform.parse()?;

    let configured = db
        .get_credentials(user_id)
        .await?
        .is_some_and(|c| c.has_platform(kind));
    if !configured {
        println!("No {} credentials found for user '{}'", kind, user_id);
        return Ok(());
    }

    // Confirm deletion unless --force is used
    if !force && atty::is(atty::Stream::Stdin) {
        use std::io::{self, Write};
        print!("Delete {} credentials for user '{}'? [y/N]: ", kind, user_id);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled");
            return Ok(());
        }
    }

    db.clear_platform_credentials(user_id, kind).await?;
    println!("✓ Deleted {} credentials for user '{}'", kind, user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_hides_short_secrets() {
        assert_eq!(mask("abc"), "****");
        assert_eq!(mask("12345678"), "****");
    }

    #[test]
    fn test_mask_keeps_last_four() {
        assert_eq!(mask("EAAB-long-token-9f3a"), "****9f3a");
    }

    #[test]
    fn test_describe_unconfigured_platform() {
        let credentials = Credentials::empty("alice");
        assert_eq!(
            describe_platform(&credentials, PlatformKind::Linkedin),
            "✗ linkedin: not configured"
        );
    }

    #[test]
    fn test_describe_configured_platforms() {
        let credentials = Credentials {
            user_id: "alice".to_string(),
            threads_app_id: Some("app-42".to_string()),
            threads_access_token: Some(SecretString::from("threads-token-abcd".to_string())),
            linkedin_access_token: Some(SecretString::from("linkedin-token-wxyz".to_string())),
            ..Default::default()
        };

        assert_eq!(
            describe_platform(&credentials, PlatformKind::Threads),
            "✓ threads: account app-42, token ****abcd"
        );
        assert_eq!(
            describe_platform(&credentials, PlatformKind::Linkedin),
            "✓ linkedin: token ****wxyz"
        );
    }
}
