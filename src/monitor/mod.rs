//! The blog monitor: a scheduled, single-pass batch job that fetches each
//! active blog's feed (or scrapes its page), diffs against already-seen
//! posts, classifies the new ones and inserts them.

pub mod classify;
pub mod feed;
pub mod scrape;

use crate::model::core::{Blog, BlogPost, UserTopic};
use crate::monitor::classify::ChatBot;
use crate::monitor::feed::FeedItem;
use futures::StreamExt;
use itertools::Itertools;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep};
use uuid::Uuid;

const USER_AGENT: &str = "knowledgebank/0.2 (+https://github.com/knowledgebank/knowledgebank)";

/// Tunables for one scan pass. All bounds are simple size/time limits, there
/// is no retry policy beyond the next scheduled pass.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How often the background monitor runs a full pass.
    pub interval: Duration,
    /// Blogs per batch within a pass.
    pub batch_size: usize,
    /// Fixed delay between batches.
    pub batch_delay: Duration,
    /// Per-request timeout.
    pub fetch_timeout: Duration,
    /// Response bodies are truncated at this size.
    pub max_fetch_bytes: usize,
    /// New posts accepted per blog per pass, newest first.
    pub max_posts_per_blog: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            interval: Duration::from_secs(1800),
            batch_size: 5,
            batch_delay: Duration::from_secs(2),
            fetch_timeout: Duration::from_secs(10),
            max_fetch_bytes: 2 * 1024 * 1024,
            max_posts_per_blog: 50,
        }
    }
}

impl MonitorConfig {
    /// Read the tunables from `MONITOR_*` environment variables, keeping the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = MonitorConfig::default();

        if let Some(v) = read_env_u64("MONITOR_INTERVAL_SECS") {
            config.interval = Duration::from_secs(v);
        }
        if let Some(v) = read_env_u64("MONITOR_BATCH_SIZE") {
            config.batch_size = v.max(1) as usize;
        }
        if let Some(v) = read_env_u64("MONITOR_BATCH_DELAY_SECS") {
            config.batch_delay = Duration::from_secs(v);
        }
        if let Some(v) = read_env_u64("MONITOR_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = Duration::from_secs(v.max(1));
        }
        if let Some(v) = read_env_u64("MONITOR_MAX_FETCH_BYTES") {
            config.max_fetch_bytes = v as usize;
        }
        if let Some(v) = read_env_u64("MONITOR_MAX_POSTS_PER_BLOG") {
            config.max_posts_per_blog = v as usize;
        }

        config
    }
}

fn read_env_u64(name: &str) -> Option<u64> {
    match std::env::var(name) {
        Ok(v) => match v.parse::<u64>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring {}={}, not a number.", name, v);
                None
            }
        },
        Err(_) => None,
    }
}

/// Run the monitor forever at the configured interval. A pass that is still
/// running when the next tick arrives makes that tick a no-op.
pub async fn run_monitor(pool: Arc<sqlx::PgPool>, config: MonitorConfig) {
    let mut ticker = interval(config.interval);
    let is_running = Arc::new(AtomicBool::new(false));

    loop {
        ticker.tick().await;

        if is_running.swap(true, Ordering::SeqCst) {
            warn!("The previous scan pass is still running, skip this round.");
            continue;
        }

        let pool = pool.clone();
        let config = config.clone();
        let is_running = is_running.clone();

        tokio::spawn(async move {
            match run_scan_pass(&pool, &config).await {
                Ok(new_posts) => {
                    debug!("Scan pass finished with {} new posts.", new_posts);
                }
                Err(e) => {
                    warn!("Scan pass failed: {}", e);
                }
            }
            is_running.store(false, Ordering::SeqCst);
        });
    }
}

/// One pass over all active blogs: fixed-size batches, sequential within a
/// batch, a fixed delay between batches. Per-blog failures are logged and
/// skipped. Returns the number of newly discovered posts.
pub async fn run_scan_pass(
    pool: &sqlx::PgPool,
    config: &MonitorConfig,
) -> Result<usize, anyhow::Error> {
    let pass_id = Uuid::new_v4();
    let blogs = Blog::get_active(pool).await?;
    let owner_count = blogs.iter().map(|b| b.owner.as_str()).unique().count();

    info!(
        "Scan pass {} started: {} active blogs from {} users.",
        pass_id,
        blogs.len(),
        owner_count
    );

    let mut total_new_posts = 0;
    for (batch_index, batch) in blogs.chunks(config.batch_size.max(1)).enumerate() {
        if batch_index > 0 {
            sleep(config.batch_delay).await;
        }

        for blog in batch {
            match scan_blog(pool, blog, config).await {
                Ok(new_posts) => {
                    if new_posts > 0 {
                        info!(
                            "Scan pass {}: found {} new posts for blog {} ({}).",
                            pass_id, new_posts, blog.id, blog.url
                        );
                    }
                    total_new_posts += new_posts;
                }
                Err(e) => {
                    warn!(
                        "Scan pass {}: failed to scan blog {} ({}): {}",
                        pass_id, blog.id, blog.url, e
                    );
                }
            }
        }
    }

    info!(
        "Scan pass {} finished: {} new posts.",
        pass_id, total_new_posts
    );

    Ok(total_new_posts)
}

/// Scan one blog: resolve its feed, fetch, parse, diff, classify, insert.
///
/// `last_checked_at` advances even on a failed fetch, so one dead blog
/// cannot monopolize the scan order.
pub async fn scan_blog(
    pool: &sqlx::PgPool,
    blog: &Blog,
    config: &MonitorConfig,
) -> Result<usize, anyhow::Error> {
    let result = scan_blog_inner(pool, blog, config).await;
    blog.update_last_checked(pool).await?;

    result
}

async fn scan_blog_inner(
    pool: &sqlx::PgPool,
    blog: &Blog,
    config: &MonitorConfig,
) -> Result<usize, anyhow::Error> {
    let client = reqwest::Client::builder()
        .timeout(config.fetch_timeout)
        .user_agent(USER_AGENT)
        .build()?;

    let candidates = fetch_candidates(pool, &client, blog, config).await?;
    if candidates.is_empty() {
        debug!("No candidates for blog {} ({}).", blog.id, blog.url);
        return Ok(0);
    }

    // Diff: drop everything we have already seen for this blog.
    let known = BlogPost::get_fingerprints(pool, blog.id).await?;
    let mut new_items: Vec<(FeedItem, String)> = Vec::new();
    for item in candidates {
        let fingerprint = BlogPost::compute_fingerprint(item.guid.as_deref(), &item.link);
        if known.contains(&fingerprint) {
            continue;
        }
        if new_items.iter().any(|(_, f)| f == &fingerprint) {
            continue;
        }
        new_items.push((item, fingerprint));
    }

    if new_items.len() > config.max_posts_per_blog {
        // Feeds are newest-first, keep the head.
        new_items.truncate(config.max_posts_per_blog);
    }

    if new_items.is_empty() {
        return Ok(0);
    }

    let topics = UserTopic::get_by_owner(pool, &blog.owner).await?;
    let chatbot = ChatBot::from_env();

    let mut inserted = 0;
    for (item, fingerprint) in new_items {
        let topic = classify::classify_post(
            &topics,
            &chatbot,
            &item.title,
            item.summary.as_deref(),
        );

        let post = BlogPost {
            id: 0,
            blog_id: blog.id,
            title: item.title,
            link: item.link,
            guid: item.guid,
            author: item.author,
            summary: item.summary,
            published_at: item.published_at,
            discovered_at: chrono::Utc::now(),
            topic: topic,
            fingerprint: fingerprint,
        };

        match post.insert(pool).await {
            Ok(_) => inserted += 1,
            Err(e) => {
                warn!(
                    "Failed to insert post '{}' for blog {}: {}",
                    post.title, blog.id, e
                );
            }
        }
    }

    Ok(inserted)
}

/// Resolve the blog into post candidates: feed first, HTML scraping second.
async fn fetch_candidates(
    pool: &sqlx::PgPool,
    client: &reqwest::Client,
    blog: &Blog,
    config: &MonitorConfig,
) -> Result<Vec<FeedItem>, anyhow::Error> {
    // A known feed url short-circuits autodiscovery.
    if let Some(feed_url) = &blog.feed_url {
        let content = fetch_bounded(client, feed_url, config.max_fetch_bytes).await?;
        match feed::parse_feed(&content) {
            Ok(items) if !items.is_empty() => return Ok(items),
            Ok(_) => {
                warn!(
                    "Feed {} of blog {} is empty, falling back to scraping the page.",
                    feed_url, blog.id
                );
            }
            Err(e) => {
                warn!(
                    "Feed {} of blog {} doesn't parse ({}), falling back to scraping the page.",
                    feed_url, blog.id, e
                );
            }
        }

        let page_html = fetch_bounded(client, &blog.url, config.max_fetch_bytes).await?;
        return Ok(scrape::extract_candidates(&page_html, &blog.url));
    }

    let page_html = fetch_bounded(client, &blog.url, config.max_fetch_bytes).await?;

    if let Some(feed_url) = scrape::discover_feed_url(&page_html, &blog.url) {
        debug!("Discovered feed {} for blog {}.", feed_url, blog.id);
        let content = fetch_bounded(client, &feed_url, config.max_fetch_bytes).await?;
        match feed::parse_feed(&content) {
            Ok(items) => {
                blog.update_feed_url(pool, &feed_url).await?;
                return Ok(items);
            }
            Err(e) => {
                warn!(
                    "Discovered feed {} for blog {} doesn't parse ({}), falling back to scraping.",
                    feed_url, blog.id, e
                );
            }
        }
    }

    Ok(scrape::extract_candidates(&page_html, &blog.url))
}

/// Fetch a url and return its body as text, truncated at `max_bytes`.
async fn fetch_bounded(
    client: &reqwest::Client,
    url: &str,
    max_bytes: usize,
) -> Result<String, anyhow::Error> {
    let response = client.get(url).send().await?.error_for_status()?;

    let mut body: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > max_bytes {
            body.extend_from_slice(&chunk[..max_bytes - body.len()]);
            warn!("Truncated the response from {} at {} bytes.", url, max_bytes);
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&body).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.max_posts_per_blog, 50);
        assert_eq!(config.max_fetch_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("MONITOR_BATCH_SIZE", "10");
        std::env::set_var("MONITOR_INTERVAL_SECS", "not-a-number");

        let config = MonitorConfig::from_env();
        assert_eq!(config.batch_size, 10);
        // The unparsable value keeps the default.
        assert_eq!(config.interval, Duration::from_secs(1800));

        std::env::remove_var("MONITOR_BATCH_SIZE");
        std::env::remove_var("MONITOR_INTERVAL_SECS");
    }
}
