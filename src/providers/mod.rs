mod local;
mod remote;
mod simple;

pub use local::LocalCliProvider;
pub use remote::{RemoteProvider, RemoteVendor};
pub use simple::SimpleProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{Config, ProviderKind};
use crate::prompt::{PromptEngine, PromptTemplate};
use crate::text::truncate_chars;
use crate::types::{Article, ArticleBrief, PipelineError, Result};

/// Raw backend output for one article, before the abstraction layer
/// clamps it.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleSummary {
    pub title: String,
    pub summary: String,
}

/// The capability set every summarization backend implements. Callers
/// go through [`Summarizer`] and never branch on which variant is
/// active.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether a `ProviderUnavailable` from this backend is worth one
    /// retry. True only for remote request/response backends, where the
    /// failure is plausibly transient.
    fn retries_on_unavailable(&self) -> bool {
        false
    }

    async fn summarize_article(&self, article: &Article) -> Result<ArticleSummary>;

    async fn compose_editorial(&self, briefs: &[ArticleBrief]) -> Result<String>;
}

/// Pull `TITLE:` / `SUMMARY:` lines out of a model response. Backends
/// share this because the format section asks every model for the same
/// two lines.
pub(crate) fn parse_title_summary(text: &str) -> (Option<String>, Option<String>) {
    let mut title = None;
    let mut summary = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("TITLE:") {
            title = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("SUMMARY:") {
            summary = Some(rest.trim().to_string());
        }
    }
    (title.filter(|t| !t.is_empty()), summary.filter(|s| !s.is_empty()))
}

/// The abstraction layer over the configured backend. Owns the output
/// contract: titles are clamped to `title_max` and summaries to
/// `summary_max` regardless of what the backend returned, remote
/// backends get exactly one retry on `ProviderUnavailable`, and an
/// empty editorial body is reported as `EmptyResponse`.
pub struct Summarizer {
    provider: Box<dyn SummaryProvider>,
    title_max: usize,
    summary_max: usize,
}

impl Summarizer {
    pub fn new(provider: Box<dyn SummaryProvider>, title_max: usize, summary_max: usize) -> Self {
        Self { provider, title_max, summary_max }
    }

    /// Build the backend the configuration selects, wired to a prompt
    /// engine carrying the merged templates and keywords.
    pub fn from_config(config: &Config) -> Result<Self> {
        let engine = Arc::new(PromptEngine::new(
            PromptTemplate::summary_default().with_overrides(&config.prompts.summary),
            PromptTemplate::editorial_default().with_overrides(&config.prompts.editorial),
            config.keywords.clone(),
            config.limits.content_truncation,
        ));
        let timeout = Duration::from_secs(config.provider_timeout_secs);

        let provider: Box<dyn SummaryProvider> = match config.provider {
            ProviderKind::Simple => Box::new(SimpleProvider::new(
                config.limits.summary_title_max,
                config.limits.summary_body_max,
            )),
            ProviderKind::Cli => {
                let command = config.cli.command.clone().ok_or_else(|| {
                    PipelineError::Config(
                        "provider = \"cli\" requires cli.command to be set".to_string(),
                    )
                })?;
                Box::new(LocalCliProvider::new(
                    command,
                    config.cli.args.clone(),
                    timeout,
                    engine,
                ))
            }
            kind => {
                let vendor = match kind {
                    ProviderKind::Openai => RemoteVendor::OpenAi,
                    ProviderKind::Anthropic => RemoteVendor::Anthropic,
                    ProviderKind::Gemini => RemoteVendor::Gemini,
                    ProviderKind::Mistral => RemoteVendor::Mistral,
                    _ => unreachable!("simple and cli handled above"),
                };
                let api_key = config.api_key_for(kind).ok_or_else(|| {
                    PipelineError::Config(format!(
                        "no API key configured for provider {:?}",
                        kind
                    ))
                })?;
                Box::new(RemoteProvider::new(
                    vendor,
                    api_key.to_string(),
                    timeout,
                    engine,
                ))
            }
        };

        info!("Summarization provider: {}", provider.name());
        Ok(Self::new(
            provider,
            config.limits.summary_title_max,
            config.limits.summary_body_max,
        ))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn clamp(&self, summary: ArticleSummary) -> ArticleSummary {
        ArticleSummary {
            title: truncate_chars(&summary.title, self.title_max),
            summary: truncate_chars(&summary.summary, self.summary_max),
        }
    }

    fn fallback(&self, article: &Article) -> ArticleSummary {
        self.clamp(ArticleSummary {
            title: article.title.clone(),
            summary: if article.content.is_empty() {
                "No summary available.".to_string()
            } else {
                article.content.clone()
            },
        })
    }

    /// Per-article summarization never fails the run: a backend error
    /// (after the retry policy) degrades to the deterministic
    /// truncation of the article's own fields.
    pub async fn summarize_article(&self, article: &Article) -> ArticleSummary {
        let mut retried = false;
        loop {
            match self.provider.summarize_article(article).await {
                Ok(summary) => return self.clamp(summary),
                Err(PipelineError::ProviderUnavailable(message))
                    if !retried && self.provider.retries_on_unavailable() =>
                {
                    warn!("Provider unavailable, retrying once: {}", message);
                    retried = true;
                }
                Err(error) => {
                    warn!(
                        "Summarization failed for {}, using fallback: {}",
                        article.id, error
                    );
                    return self.fallback(article);
                }
            }
        }
    }

    /// Editorial composition is all-or-nothing: `ProviderUnavailable`
    /// is retried once for remote backends and then propagated, and a
    /// blank body becomes `EmptyResponse`.
    pub async fn compose_editorial(&self, briefs: &[ArticleBrief]) -> Result<String> {
        let mut retried = false;
        loop {
            match self.provider.compose_editorial(briefs).await {
                Ok(body) => {
                    if body.trim().is_empty() {
                        return Err(PipelineError::EmptyResponse);
                    }
                    return Ok(body);
                }
                Err(PipelineError::ProviderUnavailable(message))
                    if !retried && self.provider.retries_on_unavailable() =>
                {
                    warn!("Provider unavailable, retrying once: {}", message);
                    retried = true;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
