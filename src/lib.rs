//! Feed aggregation with an AI morning editorial.
//!
//! One pipeline run fetches the subscribed RSS/Atom feeds, keeps the
//! articles published since the last committed run, summarizes each
//! through the configured AI backend, composes a single editorial from
//! the summaries, archives it as dated markdown, and only then advances
//! the persisted fetch cursor.

pub mod archive;
pub mod composer;
pub mod config;
pub mod cursor;
pub mod fetcher;
pub mod ingest;
pub mod prompt;
pub mod providers;
pub mod refresh;
pub mod text;
pub mod types;

pub use archive::{Archive, ArchiveEntry};
pub use composer::{EditorialComposer, RunOutcome, RunPhase, RunReport};
pub use config::{Config, ProviderKind};
pub use cursor::CursorStore;
pub use fetcher::{FeedFetcher, FetchSettings};
pub use ingest::{ArticleSource, IngestOutcome, Ingestor};
pub use prompt::{PromptEngine, PromptTemplate};
pub use providers::{SummaryProvider, Summarizer};
pub use refresh::RefreshPolicy;
pub use types::{
    Article, ArticleBrief, Editorial, EditorialSource, FeedErrorKind, FeedFailure, PipelineError,
    Result,
};
