use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized feed entry, created once per pipeline run and immutable
/// afterwards. Only derived editorials are persisted; articles live in
/// memory for the duration of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Stable identity derived from the feed URL plus the entry GUID
    /// (or the entry link when the feed omits GUIDs).
    pub id: String,
    pub title: String,
    /// Plain text. HTML is reduced before the article is constructed.
    pub content: String,
    pub source_name: String,
    pub source_url: String,
    pub link: String,
    /// Entries without a parseable date are stamped with the fetch time.
    pub published_at: DateTime<Utc>,
}

impl Article {
    pub fn derive_id(source_url: &str, guid: Option<&str>, link: &str) -> String {
        match guid {
            Some(guid) if !guid.is_empty() => format!("{}::{}", source_url, guid),
            _ => format!("{}::{}", source_url, link),
        }
    }
}

/// AI-enhanced title and summary for one article, produced by the
/// summarization layer and used to build the editorial prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleBrief {
    pub title: String,
    pub summary: String,
    pub source_name: String,
    pub link: String,
}

/// One attribution line in a finished editorial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorialSource {
    pub title: String,
    pub source_name: String,
    pub link: String,
}

/// The composed morning editorial. Created once per successful run,
/// persisted exactly once, and identified externally by `generated_at`
/// at minute resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Editorial {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub body: String,
    /// Ordered attribution, one entry per contributing article, in the
    /// order articles were supplied to composition.
    pub sources: Vec<EditorialSource>,
    pub article_count: usize,
}

/// Why a single feed failed during ingestion. Per-feed failures never
/// abort the run; they are collected and reported alongside results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedErrorKind {
    Network,
    Parse,
}

#[derive(Debug, Clone)]
pub struct FeedFailure {
    pub url: String,
    pub kind: FeedErrorKind,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("failed to parse feed {url}: {message}")]
    Parse { url: String, message: String },

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider returned no usable content")]
    EmptyResponse,

    #[error("archive write failed: {0}")]
    Persistence(String),

    #[error("fetch state unreadable: {0}")]
    StateCorruption(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("a pipeline run is already in flight")]
    RunInFlight,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
