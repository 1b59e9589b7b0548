//! Handlers behind each `gator` subcommand.
//!
//! Every handler takes the open [`Database`] and the loaded [`Config`] and
//! writes its human-readable output to `out` (stdout in the binary). Text that
//! came from a feed passes through [`strip_control_chars`] before printing.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use tokio::sync::watch;

use crate::config::Config;
use crate::poller::run_poll_loop;
use crate::storage::{Database, DatabaseError, User};
use crate::util::{parse_interval, strip_control_chars, truncate_to_width, validate_url};

/// Default number of posts shown by `browse`.
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

/// Descriptions in `browse` are cut to this many columns.
const DESCRIPTION_WIDTH: usize = 160;

/// Resolve the logged-in user, failing with a hint when there is none.
async fn current_user(db: &Database, config: &Config) -> Result<User> {
    let Some(name) = config.current_user_name.as_deref() else {
        bail!("No user logged in. Run `gator register <name>` or `gator login <name>` first");
    };
    db.get_user(name)
        .await?
        .with_context(|| format!("Current user '{}' does not exist, log in again", name))
}

fn validate_name(kind: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        bail!("{} name cannot be empty", kind);
    }
    Ok(name.to_string())
}

/// `register <name>`: create the user and log in as them.
pub async fn register(
    db: &Database,
    config: &mut Config,
    name: &str,
    out: &mut impl Write,
) -> Result<()> {
    let name = validate_name("User", name)?;
    let user = match db.create_user(&name).await {
        Ok(user) => user,
        Err(DatabaseError::AlreadyExists(_)) => bail!("User '{}' already exists", name),
        Err(e) => return Err(e).context("Failed to create user"),
    };

    config
        .set_user(&user.name)
        .context("Failed to save current user to config")?;
    tracing::info!(user_id = user.id, name = %user.name, "Registered user");
    writeln!(out, "User '{}' created and logged in", user.name)?;
    Ok(())
}

/// `login <name>`: switch the current user.
pub async fn login(
    db: &Database,
    config: &mut Config,
    name: &str,
    out: &mut impl Write,
) -> Result<()> {
    let name = name.trim();
    if db.get_user(name).await?.is_none() {
        bail!("User '{}' does not exist", name);
    }

    config
        .set_user(name)
        .context("Failed to save current user to config")?;
    writeln!(out, "Logged in as '{}'", name)?;
    Ok(())
}

/// `users`: list everyone, marking the current user.
pub async fn users(db: &Database, config: &Config, out: &mut impl Write) -> Result<()> {
    let current = config.current_user_name.as_deref();
    let users = db.get_users().await?;

    if users.is_empty() {
        writeln!(out, "No users registered")?;
    }
    for user in users {
        if Some(user.name.as_str()) == current {
            writeln!(out, "* {} (current)", user.name)?;
        } else {
            writeln!(out, "* {}", user.name)?;
        }
    }
    Ok(())
}

/// `reset`: delete every user, and with them all feeds, follows and posts.
pub async fn reset(db: &Database, out: &mut impl Write) -> Result<()> {
    let removed = db.reset().await.context("Failed to reset database")?;
    tracing::info!(users = removed, "Database reset");
    writeln!(out, "Database reset ({} users removed)", removed)?;
    Ok(())
}

/// `addfeed <name> <url>`: store a feed owned and followed by the current user.
pub async fn add_feed(
    db: &Database,
    config: &Config,
    name: &str,
    url: &str,
    out: &mut impl Write,
) -> Result<()> {
    let user = current_user(db, config).await?;
    let name = validate_name("Feed", name)?;
    let url = validate_url(url).with_context(|| format!("Rejected feed URL '{}'", url))?;

    let feed = match db.add_feed_for_user(&name, url.as_str(), user.id).await {
        Ok(feed) => feed,
        Err(DatabaseError::AlreadyExists(_)) => {
            bail!("A feed with URL '{}' already exists", url)
        }
        Err(e) => return Err(e).context("Failed to add feed"),
    };

    tracing::info!(feed_id = feed.id, user_id = user.id, url = %feed.url, "Added feed");
    writeln!(out, "Added feed '{}' ({})", feed.name, feed.url)?;
    Ok(())
}

/// `feeds`: every feed with the user that added it.
pub async fn feeds(db: &Database, out: &mut impl Write) -> Result<()> {
    let feeds = db.get_feeds().await?;
    if feeds.is_empty() {
        writeln!(out, "No feeds yet. Add one with `gator addfeed <name> <url>`")?;
    }
    for feed in feeds {
        writeln!(
            out,
            "* {} ({}) added by {}",
            strip_control_chars(&feed.name),
            strip_control_chars(&feed.url),
            feed.owner_name
        )?;
    }
    Ok(())
}

fn format_published(published_at: Option<i64>) -> String {
    published_at
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "undated".to_string())
}

/// `browse [limit]`: newest posts from the feeds the current user follows.
pub async fn browse(
    db: &Database,
    config: &Config,
    limit: i64,
    out: &mut impl Write,
) -> Result<()> {
    let user = current_user(db, config).await?;
    let posts = db.get_posts_for_user(user.id, limit).await?;

    if posts.is_empty() {
        writeln!(out, "No posts yet. Run `gator agg <interval>` to collect some")?;
        return Ok(());
    }

    for post in posts {
        writeln!(
            out,
            "{} | {}",
            format_published(post.published_at),
            strip_control_chars(&post.feed_name)
        )?;
        writeln!(out, "  {}", strip_control_chars(&post.title))?;
        writeln!(out, "  {}", strip_control_chars(&post.url))?;
        if let Some(description) = post.description.as_deref() {
            let flat = description.split_whitespace().collect::<Vec<_>>().join(" ");
            writeln!(
                out,
                "  {}",
                truncate_to_width(&strip_control_chars(&flat), DESCRIPTION_WIDTH)
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// `agg <interval>`: poll feeds until SIGINT or SIGTERM.
pub async fn agg(
    db: &Database,
    config: &Config,
    interval: &str,
    timeout_secs: Option<u64>,
    out: &mut impl Write,
) -> Result<()> {
    let every = parse_interval(interval)?;
    let mut config = config.clone();
    if let Some(secs) = timeout_secs {
        config.fetch_timeout_secs = secs;
    }
    if config.fetch_timeout_secs == 0 {
        bail!("Fetch timeout must be at least one second");
    }

    writeln!(out, "Collecting feeds every {}", humanize(every))?;
    out.flush()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_shutdown(wait_for_shutdown_signal(), shutdown_tx));

    run_poll_loop(db.clone(), &config, every, shutdown_rx)
        .await
        .context("Failed to start poller")?;
    Ok(())
}

fn humanize(d: Duration) -> String {
    if d.subsec_millis() != 0 || d.as_secs() == 0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{}s", d.as_secs())
    }
}

/// Turn the first shutdown signal into `true` on `tx`.
///
/// If the handlers cannot be installed the poller keeps running: `tx` is held
/// forever so the loop never sees a dropped sender.
async fn forward_shutdown<F>(signal: F, tx: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<&'static str>>,
{
    match signal.await {
        Ok(signal) => {
            tracing::info!(signal, "Shutting down gracefully");
            let _ = tx.send(true);
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to listen for shutdown signals, polling continues until the process is killed"
            );
            std::future::pending::<()>().await;
            drop(tx);
        }
    }
}

/// Resolve on the first SIGINT (Ctrl-C) or SIGTERM, naming the signal.
async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => Ok("SIGTERM"),
            _ = sigint.recv() => Ok("SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl-C")
    }
}
