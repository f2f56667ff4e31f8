use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::archive::Archive;
use crate::config::Config;
use crate::cursor::CursorStore;
use crate::ingest::{ArticleSource, Ingestor};
use crate::providers::Summarizer;
use crate::types::{Article, ArticleBrief, Editorial, EditorialSource, FeedFailure, PipelineError, Result};

const EDITORIAL_TITLE: &str = "Your Morning News";

/// Where a run currently is. Phases only move forward within a run;
/// `Done` and `Failed` are terminal until the next run resets to
/// `Fetching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching,
    Composing,
    Persisting,
    Done,
    Failed,
}

/// How one run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// No new articles since the cursor. Nothing was written.
    NothingToReport,
    /// An editorial was composed, archived, and the cursor advanced.
    Published { editorial: Editorial, path: PathBuf },
    /// The run stopped partway. The fetched articles (and the editorial,
    /// when composition succeeded but persistence did not) are returned
    /// so the caller can inspect or salvage them; the cursor was not
    /// advanced, so the next run re-covers the same window.
    Failed {
        error: PipelineError,
        articles: Vec<Article>,
        editorial: Option<Editorial>,
    },
}

/// Result of one run, including the per-feed failures that did not stop
/// it.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub failures: Vec<FeedFailure>,
    pub fetched_at: DateTime<Utc>,
}

/// Drives one end-to-end pass: fetch new articles, summarize each,
/// compose the editorial, archive it, and commit the fetch cursor.
/// At most one run is in flight at a time.
pub struct EditorialComposer {
    source: Box<dyn ArticleSource>,
    summarizer: Summarizer,
    cursor: CursorStore,
    archive: Archive,
    feeds: Vec<String>,
    since_override: Option<DateTime<Utc>>,
    in_flight: AtomicBool,
    phase: Mutex<RunPhase>,
}

/// Clears the in-flight flag when a run ends, including when the run's
/// future is dropped mid-await.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl EditorialComposer {
    pub fn new(
        source: Box<dyn ArticleSource>,
        summarizer: Summarizer,
        cursor: CursorStore,
        archive: Archive,
        feeds: Vec<String>,
        since_override: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            source,
            summarizer,
            cursor,
            archive,
            feeds,
            since_override,
            in_flight: AtomicBool::new(false),
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        for feed in &config.feeds {
            url::Url::parse(feed)?;
        }

        let summarizer = Summarizer::from_config(config)?;
        let cursor = CursorStore::new(config.cursor_path());
        let archive = Archive::new(config.editorials_dir())?;

        Ok(Self::new(
            Box::new(Ingestor::default()),
            summarizer,
            cursor,
            archive,
            config.feeds.clone(),
            config.since_override,
        ))
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_phase(&self, phase: RunPhase) {
        match self.phase.lock() {
            Ok(mut current) => *current = phase,
            Err(poisoned) => *poisoned.into_inner() = phase,
        }
    }

    fn fail(
        &self,
        error: PipelineError,
        articles: Vec<Article>,
        editorial: Option<Editorial>,
        failures: Vec<FeedFailure>,
        fetched_at: DateTime<Utc>,
    ) -> RunReport {
        error!("Run failed: {}", error);
        self.set_phase(RunPhase::Failed);
        RunReport {
            outcome: RunOutcome::Failed { error, articles, editorial },
            failures,
            fetched_at,
        }
    }

    /// Execute one run. Returns `RunInFlight` without side effects if a
    /// run is already active; every other failure mode is reported in
    /// the `RunOutcome`. The cursor advances only when the run commits
    /// (an editorial was archived, or there was genuinely nothing new).
    pub async fn run_once(&self) -> Result<RunReport> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::RunInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.set_phase(RunPhase::Fetching);
        let since = self
            .since_override
            .or_else(|| self.cursor.load())
            .unwrap_or_else(|| CursorStore::default_since(Utc::now()));
        info!("Run started, collecting articles published after {}", since);

        let outcome = self.source.fetch_new_articles(&self.feeds, Some(since)).await;
        let fetched_at = outcome.fetched_at;
        let failures = outcome.failures;
        let articles = outcome.articles;

        if articles.is_empty() {
            if failures.is_empty() {
                // Every feed answered and none had anything new; the
                // window up to fetched_at is settled.
                if let Err(error) = self.cursor.advance(fetched_at) {
                    return Ok(self.fail(error, Vec::new(), None, failures, fetched_at));
                }
            } else {
                // Some feeds failed, so "nothing new" is unproven; keep
                // the cursor where it is and retry the window next run.
                warn!(
                    "No new articles, but {} feeds failed; cursor not advanced",
                    failures.len()
                );
            }
            info!("Nothing to report");
            self.set_phase(RunPhase::Done);
            return Ok(RunReport {
                outcome: RunOutcome::NothingToReport,
                failures,
                fetched_at,
            });
        }

        self.set_phase(RunPhase::Composing);
        info!("Summarizing {} articles", articles.len());
        let mut briefs = Vec::with_capacity(articles.len());
        for article in &articles {
            let summary = self.summarizer.summarize_article(article).await;
            briefs.push(ArticleBrief {
                title: summary.title,
                summary: summary.summary,
                source_name: article.source_name.clone(),
                link: article.link.clone(),
            });
        }

        let body = match self.summarizer.compose_editorial(&briefs).await {
            Ok(body) => body,
            Err(error) => return Ok(self.fail(error, articles, None, failures, fetched_at)),
        };

        let editorial = Editorial {
            title: EDITORIAL_TITLE.to_string(),
            generated_at: Utc::now(),
            body,
            sources: briefs
                .iter()
                .map(|brief| EditorialSource {
                    title: brief.title.clone(),
                    source_name: brief.source_name.clone(),
                    link: brief.link.clone(),
                })
                .collect(),
            article_count: articles.len(),
        };

        self.set_phase(RunPhase::Persisting);
        let path = match self.archive.save(&editorial) {
            Ok(path) => path,
            Err(error) => {
                return Ok(self.fail(error, articles, Some(editorial), failures, fetched_at))
            }
        };
        if let Err(error) = self.cursor.advance(fetched_at) {
            return Ok(self.fail(error, articles, Some(editorial), failures, fetched_at));
        }

        info!(
            "Run finished: editorial from {} articles at {}",
            editorial.article_count,
            path.display()
        );
        self.set_phase(RunPhase::Done);
        Ok(RunReport {
            outcome: RunOutcome::Published { editorial, path },
            failures,
            fetched_at,
        })
    }
}
