//! gator: a command-line RSS aggregator.
//!
//! Users register, add feeds by URL, and run `gator agg <interval>` to poll
//! them in the background. Each tick fetches the least recently fetched feed
//! and stores any posts not seen before; `gator browse` shows the newest.

pub mod commands;
pub mod config;
pub mod feed;
pub mod poller;
pub mod storage;
pub mod util;
