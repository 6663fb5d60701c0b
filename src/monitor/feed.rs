//! RSS 2.0 / Atom feed parsing into post candidates.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use log::debug;

/// A post candidate parsed from a feed, before the diff step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub guid: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedKind {
    Rss,
    Atom,
}

// The feed element currently capturing text content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Title,
    Link,
    Guid,
    Author,
    Summary,
    Published,
}

/// Feeds disagree on date formats: RSS uses RFC 2822, Atom uses RFC 3339.
/// Try both, give up quietly otherwise.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value.trim()) {
        return Some(date.with_timezone(&Utc));
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(value.trim()) {
        return Some(date.with_timezone(&Utc));
    }

    None
}

/// Parse an RSS 2.0 or Atom document into post candidates.
///
/// Items without a title or a link are skipped, they can't be stored or
/// fingerprinted. Returns an error when the document isn't a feed at all, so
/// the caller can fall back to HTML scraping.
pub fn parse_feed(content: &str) -> Result<Vec<FeedItem>, anyhow::Error> {
    let mut reader = quick_xml::Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut kind: Option<FeedKind> = None;
    let mut items: Vec<FeedItem> = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut capture = Capture::None;
    let mut in_author = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();

                if kind.is_none() {
                    kind = match name {
                        b"rss" | b"channel" => Some(FeedKind::Rss),
                        b"feed" => Some(FeedKind::Atom),
                        _ => {
                            return Err(anyhow!(
                                "Not a feed document, the root element is {:?}",
                                String::from_utf8_lossy(name)
                            ))
                        }
                    };
                    continue;
                }

                match (kind, name) {
                    (Some(FeedKind::Rss), b"item") | (Some(FeedKind::Atom), b"entry") => {
                        current = Some(FeedItem::default());
                    }
                    _ => {}
                }

                let item = match current.as_mut() {
                    Some(item) => item,
                    None => continue,
                };

                capture = match name {
                    b"title" => Capture::Title,
                    b"link" => {
                        if kind == Some(FeedKind::Atom) {
                            // Atom links live in the href attribute.
                            if let Some(href) = link_href(&e) {
                                if item.link.is_empty() {
                                    item.link = href;
                                }
                            }
                            Capture::None
                        } else {
                            Capture::Link
                        }
                    }
                    b"guid" | b"id" => Capture::Guid,
                    b"author" | b"creator" => {
                        in_author = true;
                        if kind == Some(FeedKind::Rss) {
                            Capture::Author
                        } else {
                            Capture::None
                        }
                    }
                    b"name" if in_author => Capture::Author,
                    b"description" | b"summary" => Capture::Summary,
                    b"pubDate" | b"published" => Capture::Published,
                    b"updated" if item.published_at.is_none() => Capture::Published,
                    _ => Capture::None,
                };
            }
            Ok(quick_xml::events::Event::Empty(e)) => {
                let name = e.local_name();
                let name = name.as_ref();

                if name == b"link" {
                    if let Some(item) = current.as_mut() {
                        if let Some(href) = link_href(&e) {
                            if item.link.is_empty() {
                                item.link = href;
                            }
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::Text(e)) => {
                if let Some(item) = current.as_mut() {
                    let text = e.unescape().map(|t| t.to_string()).unwrap_or_default();
                    append_capture(item, capture, &text);
                }
            }
            Ok(quick_xml::events::Event::CData(e)) => {
                if let Some(item) = current.as_mut() {
                    let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                    append_capture(item, capture, &text);
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                let name = name.as_ref();

                capture = Capture::None;
                if name == b"author" || name == b"creator" {
                    in_author = false;
                }

                match (kind, name) {
                    (Some(FeedKind::Rss), b"item") | (Some(FeedKind::Atom), b"entry") => {
                        if let Some(item) = current.take() {
                            if item.title.is_empty() || item.link.is_empty() {
                                debug!("Skipping a feed item without title or link: {:?}", item);
                            } else {
                                items.push(item);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(anyhow!("Failed to parse the feed: {}", e));
            }
            _ => {}
        }
        buf.clear();
    }

    if kind.is_none() {
        return Err(anyhow!("The document has no feed root element"));
    }

    Ok(items)
}

// Atom <link rel="alternate" href="..."/>. Links without a rel are
// alternates per the Atom spec.
fn link_href(e: &quick_xml::events::BytesStart) -> Option<String> {
    let mut href = None;
    let mut rel_alternate = true;

    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"href" => {
                href = attr.unescape_value().ok().map(|v| v.to_string());
            }
            b"rel" => {
                let rel = attr.unescape_value().ok().unwrap_or_default();
                rel_alternate = rel == "alternate";
            }
            _ => {}
        }
    }

    if rel_alternate {
        href
    } else {
        None
    }
}

fn append_capture(item: &mut FeedItem, capture: Capture, text: &str) {
    match capture {
        Capture::Title => item.title.push_str(text),
        Capture::Link => item.link.push_str(text),
        Capture::Guid => {
            let guid = item.guid.get_or_insert_with(String::new);
            guid.push_str(text);
        }
        Capture::Author => {
            let author = item.author.get_or_insert_with(String::new);
            author.push_str(text);
        }
        Capture::Summary => {
            let summary = item.summary.get_or_insert_with(String::new);
            summary.push_str(text);
        }
        Capture::Published => {
            if item.published_at.is_none() {
                item.published_at = parse_date(text);
            }
        }
        Capture::None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Blog</title>
    <link>https://blog.example.com</link>
    <item>
      <title>Ownership &amp; Borrowing</title>
      <link>https://blog.example.com/ownership</link>
      <guid isPermaLink="false">urn:post:1</guid>
      <author>alice@example.com</author>
      <description><![CDATA[A tour of the <b>borrow checker</b>.]]></description>
      <pubDate>Tue, 04 Jun 2024 09:30:00 GMT</pubDate>
    </item>
    <item>
      <title>Second Post</title>
      <link>https://blog.example.com/second</link>
    </item>
    <item>
      <description>No title, no link, dropped.</description>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Feed</title>
  <entry>
    <title>Async in depth</title>
    <link rel="alternate" href="https://blog.example.com/async"/>
    <link rel="enclosure" href="https://blog.example.com/async.mp3"/>
    <id>tag:example.com,2024:async</id>
    <author><name>Bob</name></author>
    <summary>All about async.</summary>
    <published>2024-06-04T09:30:00Z</published>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss() {
        let items = parse_feed(RSS_SAMPLE).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title, "Ownership & Borrowing");
        assert_eq!(first.link, "https://blog.example.com/ownership");
        assert_eq!(first.guid.as_deref(), Some("urn:post:1"));
        assert_eq!(first.author.as_deref(), Some("alice@example.com"));
        assert_eq!(
            first.summary.as_deref(),
            Some("A tour of the <b>borrow checker</b>.")
        );
        assert_eq!(
            first.published_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 4, 9, 30, 0).unwrap())
        );

        let second = &items[1];
        assert_eq!(second.title, "Second Post");
        assert!(second.published_at.is_none());
    }

    #[test]
    fn test_parse_atom() {
        let items = parse_feed(ATOM_SAMPLE).unwrap();
        assert_eq!(items.len(), 1);

        let entry = &items[0];
        assert_eq!(entry.title, "Async in depth");
        // The enclosure link must not override the alternate link.
        assert_eq!(entry.link, "https://blog.example.com/async");
        assert_eq!(entry.guid.as_deref(), Some("tag:example.com,2024:async"));
        assert_eq!(entry.author.as_deref(), Some("Bob"));
        assert_eq!(
            entry.published_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 4, 9, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_not_a_feed() {
        let result = parse_feed("<html><body>Hello</body></html>");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("Tue, 04 Jun 2024 09:30:00 GMT").is_some());
        assert!(parse_date("2024-06-04T09:30:00+02:00").is_some());
        assert!(parse_date("last tuesday").is_none());
    }
}
