//! The background poll loop behind `gator agg`.
//!
//! Each tick claims the least recently fetched feed (stamping it fetched in
//! the same store call), pulls its RSS document and stores any posts not seen before. Ticks run strictly
//! one after another; a failure in one tick never stops the loop.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::feed::{fetch_feed, normalize, FetchError};
use crate::storage::{now_millis, DatabaseError, FeedStore};

/// `tokio::time::interval` rejects a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Counts for one processed feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub feed_id: i64,
    pub items: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// There were no feeds to claim.
    NoFeeds,
    /// The claimed feed could not be fetched or decoded.
    FetchFailed { feed_id: i64, kind: &'static str },
    /// The feed was fetched and its items written.
    Processed(TickSummary),
}

pub struct Poller<S> {
    store: S,
    client: reqwest::Client,
    fetch_timeout: Duration,
}

impl<S: FeedStore> Poller<S> {
    pub fn new(store: S, client: reqwest::Client, fetch_timeout: Duration) -> Self {
        Self {
            store,
            client,
            fetch_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one claim -> fetch -> normalize -> persist cycle.
    ///
    /// Only claim errors are returned; they abandon the tick before any
    /// network traffic. Fetch errors and per-item insert
    /// failures are logged and reflected in the outcome.
    pub async fn tick(&self) -> Result<TickOutcome, DatabaseError> {
        // Stamped at claim time so a failing feed still rotates to the back
        let Some(feed) = self.store.claim_next_feed(now_millis()).await? else {
            info!("No feeds to fetch");
            return Ok(TickOutcome::NoFeeds);
        };

        debug!(feed_id = feed.id, url = %feed.url, "Fetching feed");
        let doc = match fetch_feed(&self.client, &feed.url, self.fetch_timeout).await {
            Ok(doc) => doc,
            Err(e) => {
                log_fetch_error(feed.id, &e);
                return Ok(TickOutcome::FetchFailed {
                    feed_id: feed.id,
                    kind: e.kind(),
                });
            }
        };

        let now = now_millis();
        let mut summary = TickSummary {
            feed_id: feed.id,
            items: doc.items.len(),
            ..TickSummary::default()
        };

        for item in &doc.items {
            let post = normalize(feed.id, item, now);
            match self.store.insert_post_if_absent(&post).await {
                Ok(true) => summary.inserted += 1,
                Ok(false) => {
                    debug!(feed_id = feed.id, url = %post.url, "Post already stored");
                    summary.duplicates += 1;
                }
                Err(e) => {
                    warn!(
                        feed_id = feed.id,
                        url = %post.url,
                        error = %e,
                        "Failed to store post, skipping"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            feed_id = feed.id,
            feed = %feed.name,
            items = summary.items,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            failed = summary.failed,
            "Feed collected"
        );
        Ok(TickOutcome::Processed(summary))
    }

    /// Tick every `every` until `shutdown` turns `true` or its sender is dropped.
    ///
    /// The first tick fires immediately. A tick that overruns the interval
    /// delays the next one instead of causing a burst. Shutdown also
    /// abandons an in-flight fetch. A zero `every` is raised to 1ms.
    pub async fn run(&self, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let every = if every.is_zero() {
            warn!(min = ?MIN_INTERVAL, "Zero poll interval, using the minimum");
            MIN_INTERVAL
        } else {
            every
        };
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval = ?every, "Collecting feeds");

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                result = self.tick() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Poll tick abandoned: storage error");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Shutdown requested, abandoning in-flight tick");
                    break;
                }
            }
        }

        info!("Poll loop stopped");
    }
}

fn log_fetch_error(feed_id: i64, e: &FetchError) {
    warn!(
        feed_id,
        error_kind = e.kind(),
        error = %e,
        "Failed to fetch feed, skipping until next rotation"
    );
}

/// Build a poller over `store` from the loaded config and run it until shutdown.
pub async fn run_poll_loop<S: FeedStore>(
    store: S,
    config: &crate::config::Config,
    every: Duration,
    shutdown: watch::Receiver<bool>,
) -> Result<(), FetchError> {
    let client = crate::feed::build_client(&config.user_agent)?;
    let poller = Poller::new(store, client, config.fetch_timeout());
    poller.run(every, shutdown).await;
    Ok(())
}
