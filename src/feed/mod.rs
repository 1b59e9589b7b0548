//! Fetching RSS feeds and turning their items into posts.
//!
//! - `fetcher` - one bounded HTTP GET per feed, no retries
//! - `parser` - RSS 2.0 XML into a [`FeedDocument`], HTML entities decoded
//! - `normalize` - [`FeedItem`] into a storable [`NewPost`](crate::storage::NewPost), with lenient `pubDate` parsing
//!
//! # Example
//!
//! ```ignore
//! use gator::feed::{build_client, fetch_feed, normalize};
//!
//! let client = build_client("gator")?;
//! let doc = fetch_feed(&client, "https://blog.example.com/rss", timeout).await?;
//! let posts: Vec<_> = doc.items.iter().map(|i| normalize(feed.id, i, now)).collect();
//! ```

mod fetcher;
mod normalize;
mod parser;

pub use fetcher::{build_client, fetch_feed, FetchError};
pub use normalize::{normalize, parse_pub_date};
pub use parser::{parse_feed, FeedDocument, FeedItem, ParseError};
