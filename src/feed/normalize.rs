use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::parser::FeedItem;
use crate::storage::NewPost;

/// Formats tried after RFC 2822 / RFC 3339, for dates that carry a numeric offset.
const OFFSET_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %B %Y %H:%M:%S %z",
    "%A, %d %B %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S %z",
];

/// Formats for dates without any zone; these are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S",
    "%a, %d %B %Y %H:%M:%S",
    "%A, %d %B %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%d %B %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%a, %d %b %Y", "%d %b %Y", "%B %d, %Y", "%Y/%m/%d"];

/// Map one feed item to a post for `feed_id`. Never fails.
///
/// Strings are trimmed; an empty description is stored as `None`, and an
/// unparsable `pubDate` leaves `published_at` unset rather than dropping the item.
pub fn normalize(feed_id: i64, item: &FeedItem, now: i64) -> NewPost {
    let description = item.description.trim();
    NewPost {
        feed_id,
        title: item.title.trim().to_string(),
        url: item.link.trim().to_string(),
        description: (!description.is_empty()).then(|| description.to_string()),
        published_at: parse_pub_date(&item.pub_date).map(|dt| dt.timestamp_millis()),
        created_at: now,
    }
}

/// Best-effort parse of an RSS `pubDate`.
///
/// Strict RFC 2822 first, then RFC 3339, then a list of variants seen in
/// the wild: textual zone abbreviations (`EST`, `CEST`), full month and day
/// names, ISO-like dates with a space separator, and bare dates.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // "Mon, 02 Jan 2006 15:04:05 CEST" -> numeric offset, then retry
    let (body, offset) = split_zone_abbreviation(s);
    if let Some(offset) = offset {
        return parse_naive(body).and_then(|naive| {
            offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
        });
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    parse_naive(s).map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Split a trailing alphabetic zone name off `s`, resolving it to an offset.
///
/// Unknown abbreviations resolve to `None` and leave `s` untouched.
fn split_zone_abbreviation(s: &str) -> (&str, Option<FixedOffset>) {
    let Some((body, zone)) = s.rsplit_once(' ') else {
        return (s, None);
    };
    if !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return (s, None);
    }

    let hours = match zone.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" | "WET" => 0,
        "BST" | "CET" | "WEST" => 1,
        "CEST" | "EET" => 2,
        "EEST" | "MSK" => 3,
        "IST" => return (body, FixedOffset::east_opt(5 * 3600 + 1800)),
        "JST" | "KST" => 9,
        "AEST" => 10,
        "AEDT" => 11,
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        _ => return (s, None),
    };
    (body, FixedOffset::east_opt(hours * 3600))
}
