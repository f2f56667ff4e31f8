use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::fetcher::FeedFetcher;
use crate::text::html_to_text;
use crate::types::{Article, FeedErrorKind, FeedFailure, PipelineError, Result};

/// How many feeds are fetched concurrently within one run. Feeds share
/// no mutable state; results are merged in feed encounter order.
const FEED_CONCURRENCY: usize = 4;

/// Everything one ingestion pass produced: the new articles, the feeds
/// that failed, and the timestamp the pass started at (which becomes
/// the cursor value if the run commits).
#[derive(Debug)]
pub struct IngestOutcome {
    pub articles: Vec<Article>,
    pub failures: Vec<FeedFailure>,
    pub fetched_at: DateTime<Utc>,
}

/// Seam between the composer and ingestion, so runs can be driven from
/// canned article sets in tests.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_new_articles(
        &self,
        feed_urls: &[String],
        since: Option<DateTime<Utc>>,
    ) -> IngestOutcome;
}

pub struct Ingestor {
    fetcher: FeedFetcher,
}

impl Ingestor {
    pub fn new(fetcher: FeedFetcher) -> Self {
        Self { fetcher }
    }

    async fn fetch_one(&self, url: &str, fetched_at: DateTime<Utc>) -> Result<Vec<Article>> {
        let body = self.fetcher.fetch(url).await?;
        parse_feed_articles(url, &body, fetched_at)
    }
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new(FeedFetcher::default())
    }
}

#[async_trait]
impl ArticleSource for Ingestor {
    /// Fetch and parse every feed independently; a failure on one feed
    /// never aborts the others. Entries pass the date filter only when
    /// `published_at > since` (strictly); with no cursor everything
    /// parseable is included.
    async fn fetch_new_articles(
        &self,
        feed_urls: &[String],
        since: Option<DateTime<Utc>>,
    ) -> IngestOutcome {
        let fetched_at = Utc::now();
        info!("Ingesting {} feeds (since: {:?})", feed_urls.len(), since);

        let results: Vec<(String, Result<Vec<Article>>)> = stream::iter(feed_urls.to_vec())
            .map(|url| async move {
                let result = self.fetch_one(&url, fetched_at).await;
                (url, result)
            })
            .buffered(FEED_CONCURRENCY)
            .collect()
            .await;

        let (articles, failures) = collect_new(results, since);
        info!(
            "Ingestion finished: {} new articles, {} failed feeds",
            articles.len(),
            failures.len()
        );

        IngestOutcome {
            articles,
            failures,
            fetched_at,
        }
    }
}

/// Merge per-feed results in feed encounter order: apply the date
/// filter, deduplicate across feeds by derived id (first occurrence
/// wins), and map errors to per-feed failure records.
fn collect_new(
    results: Vec<(String, Result<Vec<Article>>)>,
    since: Option<DateTime<Utc>>,
) -> (Vec<Article>, Vec<FeedFailure>) {
    let mut articles = Vec::new();
    let mut failures = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (url, result) in results {
        match result {
            Ok(parsed) => {
                for article in parsed {
                    if let Some(since) = since {
                        if article.published_at <= since {
                            continue;
                        }
                    }
                    if !seen_ids.insert(article.id.clone()) {
                        debug!("Skipping duplicate article: {}", article.id);
                        continue;
                    }
                    articles.push(article);
                }
            }
            Err(error) => {
                warn!("Feed {} failed: {}", url, error);
                let kind = match error {
                    PipelineError::Parse { .. } => FeedErrorKind::Parse,
                    _ => FeedErrorKind::Network,
                };
                failures.push(FeedFailure {
                    url,
                    kind,
                    message: error.to_string(),
                });
            }
        }
    }

    (articles, failures)
}

/// Parse one fetched feed body into normalized articles. Entries with
/// no link are skipped (they cannot be cited); entries with no date are
/// stamped with `fetched_at` rather than dropped.
pub fn parse_feed_articles(
    feed_url: &str,
    body: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<Article>> {
    let feed = parser::parse(body.as_bytes()).map_err(|e| PipelineError::Parse {
        url: feed_url.to_string(),
        message: e.to_string(),
    })?;

    let source_name = feed
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| feed_url.to_string());

    let mut articles = Vec::new();
    for entry in feed.entries {
        let link = match entry.links.first() {
            Some(link) => link.href.clone(),
            None => {
                debug!("Skipping entry without link in {}", feed_url);
                continue;
            }
        };

        let guid = if entry.id.is_empty() {
            None
        } else {
            Some(entry.id.as_str())
        };
        let id = Article::derive_id(feed_url, guid, &link);

        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());

        // Prefer full content over the summary, then reduce to text.
        let raw_content = entry
            .content
            .and_then(|c| c.body)
            .or_else(|| entry.summary.map(|s| s.content))
            .unwrap_or_default();
        let content = html_to_text(&raw_content);

        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(fetched_at);

        articles.push(Article {
            id,
            title,
            content,
            source_name: source_name.clone(),
            source_url: feed_url.to_string(),
            link,
            published_at,
        });
    }

    debug!("Parsed {} entries from {}", articles.len(), feed_url);
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED_URL: &str = "https://feed.example/rss";

    const RSS_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <item>
      <title>Dated story</title>
      <link>https://feed.example/dated</link>
      <guid>guid-dated</guid>
      <description>&lt;p&gt;Hello &lt;b&gt;world&lt;/b&gt;&lt;/p&gt;</description>
      <pubDate>Mon, 24 Aug 2026 08:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Undated story</title>
      <link>https://feed.example/undated</link>
      <description>No date on this one</description>
    </item>
  </channel>
</rss>"#;

    fn article(id: &str, published_at: DateTime<Utc>) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Article {}", id),
            content: "content".to_string(),
            source_name: "Test".to_string(),
            source_url: FEED_URL.to_string(),
            link: format!("https://feed.example/{}", id),
            published_at,
        }
    }

    #[test]
    fn parses_entries_and_reduces_html() {
        let fetched_at = Utc::now();
        let articles = parse_feed_articles(FEED_URL, RSS_BODY, fetched_at).unwrap();
        assert_eq!(articles.len(), 2);

        let dated = &articles[0];
        assert_eq!(dated.title, "Dated story");
        assert_eq!(dated.content, "Hello world");
        assert_eq!(dated.source_name, "Test Feed");
        assert_eq!(dated.id, format!("{}::guid-dated", FEED_URL));
        assert_eq!(
            dated.published_at,
            Utc.with_ymd_and_hms(2026, 8, 24, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn undated_entries_are_stamped_with_fetch_time() {
        let fetched_at = Utc::now();
        let articles = parse_feed_articles(FEED_URL, RSS_BODY, fetched_at).unwrap();
        assert_eq!(articles[1].published_at, fetched_at);
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        let result = parse_feed_articles(FEED_URL, "this is not a feed", Utc::now());
        assert!(matches!(result, Err(PipelineError::Parse { .. })));
    }

    #[test]
    fn date_filter_is_strict() {
        let since = Utc.with_ymd_and_hms(2026, 8, 24, 8, 0, 0).unwrap();
        let results = vec![(
            FEED_URL.to_string(),
            Ok(vec![
                article("old", since - chrono::Duration::hours(1)),
                article("boundary", since),
                article("new", since + chrono::Duration::hours(1)),
            ]),
        )];

        let (articles, failures) = collect_new(results, Some(since));
        assert!(failures.is_empty());
        let ids: Vec<&str> = articles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[test]
    fn absent_cursor_includes_everything() {
        let now = Utc::now();
        let results = vec![(
            FEED_URL.to_string(),
            Ok(vec![article("a", now), article("b", now)]),
        )];

        let (articles, _) = collect_new(results, None);
        assert_eq!(articles.len(), 2);
    }

    #[test]
    fn cross_feed_dedup_keeps_first_occurrence() {
        let now = Utc::now();
        let mut first = article("shared", now);
        first.title = "From feed one".to_string();
        let mut second = article("shared", now);
        second.title = "From feed two".to_string();

        let results = vec![
            ("https://one.example/rss".to_string(), Ok(vec![first])),
            ("https://two.example/rss".to_string(), Ok(vec![second])),
        ];

        let (articles, _) = collect_new(results, None);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "From feed one");
    }

    #[test]
    fn one_failed_feed_does_not_abort_the_rest() {
        let now = Utc::now();
        let results = vec![
            (
                "https://down.example/rss".to_string(),
                Err(PipelineError::Network {
                    url: "https://down.example/rss".to_string(),
                    message: "timed out".to_string(),
                }),
            ),
            (
                FEED_URL.to_string(),
                Ok(vec![article("a", now), article("b", now)]),
            ),
        ];

        let (articles, failures) = collect_new(results, None);
        assert_eq!(articles.len(), 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FeedErrorKind::Network);
        assert_eq!(failures[0].url, "https://down.example/rss");
    }
}
