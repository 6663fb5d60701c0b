//! HTML fallback for blogs without a usable feed: feed autodiscovery and
//! article-link extraction from the blog's front page.

use crate::monitor::feed::FeedItem;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};
use log::debug;
use std::cell::RefCell;
use std::collections::HashSet;
use url::Url;

// Anchors whose text is one of these are navigation, not articles.
const NAV_TITLES: [&str; 10] = [
    "home",
    "about",
    "contact",
    "archive",
    "archives",
    "rss",
    "subscribe",
    "login",
    "read more",
    "continue reading",
];

fn resolve_url(page_url: &str, href: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    let resolved = base.join(href).ok()?;

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Find the feed url advertised by the page:
/// `<link rel="alternate" type="application/rss+xml|application/atom+xml" href="...">`.
/// The first matching link wins. Relative hrefs are resolved against the page url.
pub fn discover_feed_url(html: &str, page_url: &str) -> Option<String> {
    let found: RefCell<Option<String>> = RefCell::new(None);

    let handlers = vec![element!("link[rel]", |el| {
        if found.borrow().is_some() {
            return Ok(());
        }

        let rel = el.get_attribute("rel").unwrap_or_default().to_lowercase();
        if rel != "alternate" {
            return Ok(());
        }

        let content_type = el.get_attribute("type").unwrap_or_default().to_lowercase();
        if !(content_type.contains("rss") || content_type.contains("atom")) {
            return Ok(());
        }

        if let Some(href) = el.get_attribute("href") {
            *found.borrow_mut() = Some(href);
        }

        Ok(())
    })];

    let _ = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    );

    let href = found.into_inner()?;
    resolve_url(page_url, &href)
}

/// Extract article candidates from the blog page's anchors.
///
/// Heuristics: keep same-host links with a real path and a sentence-like
/// anchor text, drop navigation links. This is the last resort when a blog
/// has no feed, so precision beats recall.
pub fn extract_candidates(html: &str, page_url: &str) -> Vec<FeedItem> {
    // (href, accumulated anchor text), in document order.
    let anchors: RefCell<Vec<(String, String)>> = RefCell::new(Vec::new());

    let handlers = vec![
        element!("a[href]", |el| {
            let href = el.get_attribute("href").unwrap_or_default();
            anchors.borrow_mut().push((href, String::new()));
            Ok(())
        }),
        text!("a", |t| {
            if let Some(last) = anchors.borrow_mut().last_mut() {
                last.1.push_str(t.as_str());
            }
            Ok(())
        }),
    ];

    let _ = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    );

    let page_host = Url::parse(page_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()));

    let mut seen_links: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();

    for (href, raw_title) in anchors.into_inner() {
        if href.starts_with('#') {
            continue;
        }

        let link = match resolve_url(page_url, &href) {
            Some(link) => link,
            None => continue,
        };

        let parsed = match Url::parse(&link) {
            Ok(parsed) => parsed,
            Err(_) => continue,
        };

        // Stay on the blog's own host.
        if parsed.host_str().map(|h| h.to_string()) != page_host {
            continue;
        }

        // Skip the front page itself.
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        if segments.is_empty() {
            continue;
        }

        let title = raw_title.split_whitespace().collect::<Vec<&str>>().join(" ");
        if title.split_whitespace().count() < 3 {
            continue;
        }

        if NAV_TITLES.contains(&title.to_lowercase().as_str()) {
            continue;
        }

        if !seen_links.insert(link.clone()) {
            continue;
        }

        candidates.push(FeedItem {
            title,
            link,
            guid: None,
            author: None,
            summary: None,
            published_at: None,
        });
    }

    debug!(
        "Extracted {} article candidates from {}",
        candidates.len(),
        page_url
    );

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://blog.example.com/";

    #[test]
    fn test_discover_feed_url() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/style.css">
            <link rel="alternate" type="application/rss+xml" href="/feed.xml">
            <link rel="alternate" type="application/atom+xml" href="/atom.xml">
        </head><body></body></html>"#;

        assert_eq!(
            discover_feed_url(html, PAGE_URL),
            Some("https://blog.example.com/feed.xml".to_string())
        );
    }

    #[test]
    fn test_discover_feed_url_absolute() {
        let html = r#"<link rel="alternate" type="application/atom+xml" href="https://feeds.example.com/blog">"#;
        assert_eq!(
            discover_feed_url(html, PAGE_URL),
            Some("https://feeds.example.com/blog".to_string())
        );
    }

    #[test]
    fn test_discover_feed_url_missing() {
        let html = r#"<html><head><link rel="stylesheet" href="/style.css"></head></html>"#;
        assert_eq!(discover_feed_url(html, PAGE_URL), None);
    }

    #[test]
    fn test_extract_candidates() {
        let html = r##"<html><body>
            <nav>
                <a href="/">Home</a>
                <a href="/about">About</a>
                <a href="#top">Back to top</a>
            </nav>
            <main>
                <a href="/posts/understanding-lifetimes">Understanding lifetimes in Rust</a>
                <a href="/posts/understanding-lifetimes">Understanding lifetimes in Rust</a>
                <a href="https://other.example.net/posts/external">A post on another site</a>
                <a href="mailto:author@example.com">Mail the author here</a>
                <a href="/posts/async-pitfalls">Five async pitfalls to avoid</a>
            </main>
        </body></html>"##;

        let candidates = extract_candidates(html, PAGE_URL);
        let links: Vec<&str> = candidates.iter().map(|c| c.link.as_str()).collect();

        assert_eq!(
            links,
            vec![
                "https://blog.example.com/posts/understanding-lifetimes",
                "https://blog.example.com/posts/async-pitfalls",
            ]
        );
        assert_eq!(candidates[0].title, "Understanding lifetimes in Rust");
    }

    #[test]
    fn test_extract_candidates_short_titles_dropped() {
        let html = r#"<a href="/posts/first">Hi</a><a href="/posts/second">Older posts</a>"#;
        assert!(extract_candidates(html, PAGE_URL).is_empty());
    }
}
