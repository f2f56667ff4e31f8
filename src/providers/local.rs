use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{parse_title_summary, ArticleSummary, SummaryProvider};
use crate::prompt::PromptEngine;
use crate::types::{Article, ArticleBrief, PipelineError, Result};

/// Backend that shells out to an external AI command line tool. The
/// combined instruction (system message folded into the user prompt,
/// since a CLI has no separate role channel) goes to stdin; stdout is
/// the result. Non-zero exit and wall-clock timeout both surface as
/// `ProviderUnavailable`, and are never retried: a CLI that just failed
/// is assumed to fail the same way again.
pub struct LocalCliProvider {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    engine: Arc<PromptEngine>,
}

impl LocalCliProvider {
    pub fn new(
        command: String,
        args: Vec<String>,
        timeout: Duration,
        engine: Arc<PromptEngine>,
    ) -> Self {
        Self { command, args, timeout, engine }
    }

    async fn run(&self, prompt: &str) -> Result<String> {
        debug!("Invoking {} ({} bytes of prompt)", self.command, prompt.len());

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PipelineError::ProviderUnavailable(format!(
                    "failed to start {}: {}",
                    self.command, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await.map_err(|e| {
                PipelineError::ProviderUnavailable(format!(
                    "failed to write prompt to {}: {}",
                    self.command, e
                ))
            })?;
            // Dropping stdin closes the pipe so the tool sees EOF.
        }

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(PipelineError::ProviderUnavailable(format!(
                    "{} failed: {}",
                    self.command, e
                )))
            }
            Err(_) => {
                return Err(PipelineError::ProviderUnavailable(format!(
                    "{} timed out after {:?}",
                    self.command, self.timeout
                )))
            }
        };

        if !output.status.success() {
            return Err(PipelineError::ProviderUnavailable(format!(
                "{} exited with {}",
                self.command, output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl SummaryProvider for LocalCliProvider {
    fn name(&self) -> &str {
        "cli"
    }

    async fn summarize_article(&self, article: &Article) -> Result<ArticleSummary> {
        let request = self.engine.summary_request(article);
        let text = self.run(&request.combined()).await?;

        let (title, summary) = parse_title_summary(&text);
        Ok(ArticleSummary {
            title: title.unwrap_or_else(|| article.title.clone()),
            summary: summary.unwrap_or_else(|| article.content.clone()),
        })
    }

    async fn compose_editorial(&self, briefs: &[ArticleBrief]) -> Result<String> {
        let request = self.engine.editorial_request(briefs);
        self.run(&request.combined()).await
    }
}
