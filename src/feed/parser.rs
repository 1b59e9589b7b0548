use html_escape::decode_html_entities;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use thiserror::Error;

/// An RSS document as fetched, with HTML entities already decoded in its text fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    pub title: String,
    pub description: String,
    /// Items in document order
    pub items: Vec<FeedItem>,
}

/// One `<item>` of an RSS channel. `pub_date` is the raw, unparsed string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Feed is not UTF-8 (declared encoding: {0})")]
    NotUtf8(String),
    #[error("Document ended inside <{0}>")]
    UnexpectedEof(String),
    #[error("Not an RSS document: no <channel> element")]
    MissingChannel,
}

// Wire shape: <rss><channel><title/><description/><item>...</item>*</channel></rss>
//
// Only unprefixed elements count. Extension elements that share a local name
// (itunes:title, media:description, dc:date, atom:link, ...) are skipped, and
// when a field repeats within one item the first occurrence wins.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    ChannelTitle,
    ChannelDescription,
    ItemTitle,
    ItemLink,
    ItemDescription,
    ItemPubDate,
}

impl Field {
    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Local name of an unprefixed element, `None` for `prefix:name`.
fn plain_name(e: &BytesStart<'_>) -> Option<Vec<u8>> {
    let name = e.name();
    name.prefix()
        .is_none()
        .then(|| name.local_name().as_ref().to_vec())
}

fn named(entry: &Option<Vec<u8>>, name: &[u8]) -> bool {
    entry.as_deref() == Some(name)
}

/// Which field an element opened under `stack` (parents only) feeds, if any.
fn field_for(stack: &[Option<Vec<u8>>], name: &[u8]) -> Option<Field> {
    let in_channel = stack.len() == 2 && named(&stack[1], b"channel");
    let in_item = stack.len() == 3 && named(&stack[1], b"channel") && named(&stack[2], b"item");

    match name {
        b"title" if in_channel => Some(Field::ChannelTitle),
        b"description" if in_channel => Some(Field::ChannelDescription),
        b"title" if in_item => Some(Field::ItemTitle),
        b"link" if in_item => Some(Field::ItemLink),
        b"description" if in_item => Some(Field::ItemDescription),
        b"pubDate" if in_item => Some(Field::ItemPubDate),
        _ => None,
    }
}

fn is_channel(stack: &[Option<Vec<u8>>], name: &[u8]) -> bool {
    stack.len() == 1 && name == b"channel"
}

fn is_item(stack: &[Option<Vec<u8>>], name: &[u8]) -> bool {
    stack.len() == 2 && named(&stack[1], b"channel") && name == b"item"
}

/// `encoding="..."` from the XML declaration, if there is one.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = String::from_utf8_lossy(&head[..end]);
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    Some(value[..value.find(quote)?].to_string())
}

fn text_of(e: &BytesText<'_>) -> String {
    // Entities the XML layer does not know (&nbsp;, ...) are left for the
    // HTML pass instead of failing the whole document.
    match e.unescape() {
        Ok(s) => s.into_owned(),
        Err(_) => String::from_utf8_lossy(&e[..]).into_owned(),
    }
}

/// Parse an RSS 2.0 body.
///
/// XML escapes are resolved by quick-xml; HTML entities left in the text after
/// that (`&amp;amp;`, `&#8217;` written inside CDATA, ...) are decoded here for
/// the channel title/description and every item title/description.
///
/// # Errors
///
/// Malformed or truncated XML, a body that is not UTF-8, or a document with
/// no `<channel>`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedDocument, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        ParseError::NotUtf8(declared_encoding(bytes).unwrap_or_else(|| "none".to_string()))
    })?;
    let text = text.trim_start_matches('\u{feff}');

    // SEC-002: quick-xml never expands <!ENTITY> declarations, so a hostile
    // DOCTYPE cannot pull in external content.
    let mut reader = Reader::from_str(text);

    let mut doc = FeedDocument::default();
    let mut stack: Vec<Option<Vec<u8>>> = Vec::new();
    let mut saw_channel = false;
    let mut channel_seen = 0u8;
    let mut item_seen = 0u8;
    // Field being read and the stack depth of its element
    let mut capture: Option<(Field, usize)> = None;
    let mut buf = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = plain_name(&e);
                if capture.is_none() {
                    if let Some(name) = name.as_deref() {
                        if is_channel(&stack, name) {
                            saw_channel = true;
                        } else if is_item(&stack, name) {
                            doc.items.push(FeedItem::default());
                            item_seen = 0;
                        } else if let Some(field) = field_for(&stack, name) {
                            let seen = match field {
                                Field::ChannelTitle | Field::ChannelDescription => channel_seen,
                                _ => item_seen,
                            };
                            if seen & field.bit() == 0 {
                                buf.clear();
                                capture = Some((field, stack.len() + 1));
                            }
                        }
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if capture.is_none() {
                    if let Some(name) = plain_name(&e).as_deref() {
                        if is_channel(&stack, name) {
                            saw_channel = true;
                        } else if is_item(&stack, name) {
                            doc.items.push(FeedItem::default());
                        }
                    }
                }
            }
            Event::Text(e) if capture.is_some() => buf.push_str(&text_of(&e)),
            Event::CData(e) if capture.is_some() => buf.push_str(&String::from_utf8_lossy(&e)),
            Event::End(_) => {
                if let Some((field, depth)) = capture {
                    if depth == stack.len() {
                        let value = buf.trim().to_string();
                        match field {
                            Field::ChannelTitle => doc.title = value,
                            Field::ChannelDescription => doc.description = value,
                            _ => {
                                if let Some(item) = doc.items.last_mut() {
                                    match field {
                                        Field::ItemTitle => item.title = value,
                                        Field::ItemLink => item.link = value,
                                        Field::ItemDescription => item.description = value,
                                        _ => item.pub_date = value,
                                    }
                                }
                            }
                        }
                        match field {
                            Field::ChannelTitle | Field::ChannelDescription => {
                                channel_seen |= field.bit()
                            }
                            _ => item_seen |= field.bit(),
                        }
                        capture = None;
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        let name = open
            .as_deref()
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_else(|| "extension element".to_string());
        return Err(ParseError::UnexpectedEof(name));
    }
    if !saw_channel {
        return Err(ParseError::MissingChannel);
    }

    doc.title = unescape(&doc.title);
    doc.description = unescape(&doc.description);
    for item in &mut doc.items {
        item.title = unescape(&item.title);
        item.description = unescape(&item.description);
    }
    Ok(doc)
}

fn unescape(s: &str) -> String {
    decode_html_entities(s).into_owned()
}
