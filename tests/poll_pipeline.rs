//! End-to-end tests for the poll pipeline: claim, fetch, normalize, persist.
//!
//! Feeds are served by wiremock and stored in an in-memory SQLite database,
//! so each test exercises the real HTTP client, RSS parser and SQL.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use gator::feed::build_client;
use gator::poller::{Poller, TickOutcome, TickSummary};
use gator::storage::{Database, Feed};
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss(links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|link| {
            format!(
                "<item><title>Post {0}</title><link>https://example.com/{0}</link>\
                 <pubDate>Mon, 02 Jan 2006 15:04:05 GMT</pubDate></item>",
                link
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>Feed</title>{}</channel></rss>",
        items
    )
}

async fn mount(server: &MockServer, route: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

async fn add_feeds(db: &Database, server: &MockServer, routes: &[&str]) -> Vec<Feed> {
    let user = db.create_user("alice").await.unwrap();
    let mut feeds = Vec::new();
    for route in routes {
        let feed = db
            .add_feed_for_user(route, &format!("{}{}", server.uri(), route), user.id)
            .await
            .unwrap();
        feeds.push(feed);
    }
    feeds
}

fn poller(db: Database) -> Poller<Database> {
    Poller::new(db, build_client("gator-test").unwrap(), Duration::from_secs(5))
}

#[tokio::test]
async fn test_ticks_rotate_through_all_feeds() {
    let server = MockServer::start().await;
    mount(&server, "/a", 200, rss(&["a1", "a2"])).await;
    mount(&server, "/b", 200, rss(&["b1"])).await;
    mount(&server, "/c", 200, rss(&[])).await;

    let db = Database::open(":memory:").await.unwrap();
    let feeds = add_feeds(&db, &server, &["/a", "/b", "/c"]).await;
    let p = poller(db);

    let mut visited = Vec::new();
    for _ in 0..3 {
        match p.tick().await.unwrap() {
            TickOutcome::Processed(TickSummary { feed_id, .. }) => visited.push(feed_id),
            other => panic!("Expected Processed, got {:?}", other),
        }
    }

    let ids: Vec<i64> = feeds.iter().map(|f| f.id).collect();
    assert_eq!(visited, ids);
    assert_eq!(p.store().get_posts_for_feed(ids[0]).await.unwrap().len(), 2);
    assert_eq!(p.store().get_posts_for_feed(ids[1]).await.unwrap().len(), 1);
}

/// Extension elements share local names with the RSS fields they sit next to.
const PODCAST_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
     xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"
     xmlns:media="http://search.yahoo.com/mrss/">
<channel>
    <itunes:title>Show (iTunes)</itunes:title>
    <title>Show</title>
    <description>A show</description>
    <item>
        <itunes:title>Episode one (iTunes)</itunes:title>
        <title>Ep 1</title>
        <link>https://example.com/ep1</link>
        <media:description>Media blurb</media:description>
        <description>First episode</description>
        <media:content url="https://cdn.example.com/ep1.mp3">
            <media:title>Ep 1 audio</media:title>
        </media:content>
        <pubDate>Mon, 02 Jan 2006 15:04:05 MST</pubDate>
    </item>
</channel>
</rss>"#;

#[tokio::test]
async fn test_podcast_feed_with_extensions_is_stored() {
    let server = MockServer::start().await;
    mount(&server, "/podcast", 200, PODCAST_FEED.to_string()).await;

    let db = Database::open(":memory:").await.unwrap();
    let feeds = add_feeds(&db, &server, &["/podcast"]).await;
    let p = poller(db);

    let outcome = p.tick().await.unwrap();
    assert!(matches!(
        outcome,
        TickOutcome::Processed(TickSummary { items: 1, inserted: 1, .. })
    ));

    let posts = p.store().get_posts_for_feed(feeds[0].id).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].title, "Ep 1");
    assert_eq!(posts[0].url, "https://example.com/ep1");
    assert_eq!(posts[0].description.as_deref(), Some("First episode"));
    assert_eq!(
        posts[0].published_at,
        Some(Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap().timestamp_millis())
    );
}

#[tokio::test]
async fn test_broken_feed_does_not_block_rotation() {
    let server = MockServer::start().await;
    mount(&server, "/broken", 500, String::new()).await;
    mount(&server, "/ok", 200, rss(&["x"])).await;

    let db = Database::open(":memory:").await.unwrap();
    let feeds = add_feeds(&db, &server, &["/broken", "/ok"]).await;
    let p = poller(db);

    assert!(matches!(
        p.tick().await.unwrap(),
        TickOutcome::FetchFailed { kind: "network", .. }
    ));
    // The broken feed moved to the back, so the healthy one is next
    assert!(matches!(
        p.tick().await.unwrap(),
        TickOutcome::Processed(TickSummary { inserted: 1, .. })
    ));
    // And then the broken one again
    match p.tick().await.unwrap() {
        TickOutcome::FetchFailed { feed_id, .. } => assert_eq!(feed_id, feeds[0].id),
        other => panic!("Expected FetchFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_collected_posts_are_browsable() {
    let server = MockServer::start().await;
    mount(&server, "/rss", 200, rss(&["one", "two", "three"])).await;

    let db = Database::open(":memory:").await.unwrap();
    let feeds = add_feeds(&db, &server, &["/rss"]).await;
    let p = poller(db.clone());
    p.tick().await.unwrap();

    let posts = db.get_posts_for_user(feeds[0].user_id, 10).await.unwrap();
    assert_eq!(posts.len(), 3);
    assert!(posts.iter().all(|post| post.feed_name == "/rss"));
}

#[tokio::test]
async fn test_refetch_after_feed_grows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(&["old"])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount(&server, "/rss", 200, rss(&["new", "old"])).await;

    let db = Database::open(":memory:").await.unwrap();
    add_feeds(&db, &server, &["/rss"]).await;
    let p = poller(db);

    p.tick().await.unwrap();
    let second = p.tick().await.unwrap();

    assert!(matches!(
        second,
        TickOutcome::Processed(TickSummary {
            items: 2,
            inserted: 1,
            duplicates: 1,
            failed: 0,
            ..
        })
    ));
}

#[tokio::test]
async fn test_run_loop_collects_then_stops() {
    let server = MockServer::start().await;
    mount(&server, "/rss", 200, rss(&["a", "b"])).await;

    let db = Database::open(":memory:").await.unwrap();
    let feeds = add_feeds(&db, &server, &["/rss"]).await;
    let (tx, rx) = watch::channel(false);

    let p = poller(db.clone());
    let handle = tokio::spawn(async move { p.run(Duration::from_millis(50), rx).await });

    // Wait for the first tick to land
    let mut stored = 0;
    for _ in 0..100 {
        stored = db.get_posts_for_feed(feeds[0].id).await.unwrap().len();
        if stored == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(stored, 2);

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("poll loop did not stop")
        .unwrap();
}
