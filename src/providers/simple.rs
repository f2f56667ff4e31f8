use async_trait::async_trait;

use super::{ArticleSummary, SummaryProvider};
use crate::text::truncate_chars;
use crate::types::{Article, ArticleBrief, Result};

/// Deterministic offline backend: first-N-characters transforms, no
/// network, no external process. Used for demos, tests, and as the
/// per-article fallback when a real provider call fails.
pub struct SimpleProvider {
    title_max: usize,
    summary_max: usize,
}

impl SimpleProvider {
    pub fn new(title_max: usize, summary_max: usize) -> Self {
        Self { title_max, summary_max }
    }
}

#[async_trait]
impl SummaryProvider for SimpleProvider {
    fn name(&self) -> &str {
        "simple"
    }

    async fn summarize_article(&self, article: &Article) -> Result<ArticleSummary> {
        let summary = if article.content.is_empty() {
            "No summary available.".to_string()
        } else {
            truncate_chars(&article.content, self.summary_max)
        };
        Ok(ArticleSummary {
            title: truncate_chars(&article.title, self.title_max),
            summary,
        })
    }

    async fn compose_editorial(&self, briefs: &[ArticleBrief]) -> Result<String> {
        let mut body = String::from("## Your Morning News Digest\n\n");
        body.push_str(&format!(
            "Here are the top stories from {} articles:\n\n",
            briefs.len()
        ));

        for (i, brief) in briefs.iter().take(5).enumerate() {
            body.push_str(&format!("**{}. {}**\n{}\n\n", i + 1, brief.title, brief.summary));
        }

        Ok(body.trim_end().to_string())
    }
}
