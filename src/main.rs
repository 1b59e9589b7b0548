use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use gator::commands;
use gator::config::{default_config_path, Config};
use gator::storage::{Database, DatabaseError};

#[derive(Parser, Debug)]
#[command(name = "gator", version, about = "Command-line RSS aggregator")]
struct Args {
    /// Config file to use instead of ~/.config/gator/config.toml
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Switch to an existing user
    Login { name: String },
    /// List all users
    Users,
    /// Delete all users, feeds and posts
    Reset,
    /// Add a feed and follow it as the current user
    Addfeed { name: String, url: String },
    /// List all feeds
    Feeds,
    /// Show the newest posts from followed feeds
    Browse {
        #[arg(default_value_t = commands::DEFAULT_BROWSE_LIMIT)]
        limit: i64,
    },
    /// Poll feeds every INTERVAL (e.g. 30s, 1m) until interrupted
    Agg {
        interval: String,
        /// Per-request fetch timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

/// SEC-007: Create the config directory with user-only permissions.
fn ensure_config_dir(config_path: &Path) -> Result<()> {
    let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(());
    };
    if dir.exists() {
        return Ok(());
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create config directory {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,gator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    ensure_config_dir(&config_path)?;
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config.resolved_db_path();
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: the database at {} is locked by another process.", db_path.display());
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let mut out = std::io::stdout().lock();
    match args.command {
        Command::Register { name } => commands::register(&db, &mut config, &name, &mut out).await,
        Command::Login { name } => commands::login(&db, &mut config, &name, &mut out).await,
        Command::Users => commands::users(&db, &config, &mut out).await,
        Command::Reset => commands::reset(&db, &mut out).await,
        Command::Addfeed { name, url } => {
            commands::add_feed(&db, &config, &name, &url, &mut out).await
        }
        Command::Feeds => commands::feeds(&db, &mut out).await,
        Command::Browse { limit } => commands::browse(&db, &config, limit, &mut out).await,
        Command::Agg { interval, timeout } => {
            commands::agg(&db, &config, &interval, timeout, &mut out).await
        }
    }
}
