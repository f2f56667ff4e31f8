use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::{parse_title_summary, ArticleSummary, SummaryProvider};
use crate::prompt::{PromptEngine, PromptRequest};
use crate::types::{Article, ArticleBrief, PipelineError, Result};

/// Token bound for one completion, sized for an 80-char title plus a
/// 200-char summary with headroom for the editorial.
const MAX_TOKENS: u32 = 1024;

/// Responses larger than this are rejected rather than buffered.
const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteVendor {
    OpenAi,
    Anthropic,
    Gemini,
    Mistral,
}

impl RemoteVendor {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-3.5-turbo",
            Self::Anthropic => "claude-3-haiku-20240307",
            Self::Gemini => "gemini-pro",
            Self::Mistral => "mistral-tiny",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Mistral => "mistral",
        }
    }
}

/// Request/response backend for the hosted AI APIs. One implementation
/// covers all four vendors; the vendor picks the endpoint, the auth
/// header, the body shape, and where the text lives in the response.
/// Transport failures, timeouts, oversized responses and non-2xx
/// statuses all map to `ProviderUnavailable`, which the summarization
/// layer retries exactly once.
pub struct RemoteProvider {
    vendor: RemoteVendor,
    api_key: String,
    model: String,
    client: Client,
    engine: Arc<PromptEngine>,
}

impl RemoteProvider {
    pub fn new(
        vendor: RemoteVendor,
        api_key: String,
        timeout: Duration,
        engine: Arc<PromptEngine>,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            vendor,
            api_key,
            model: vendor.default_model().to_string(),
            client,
            engine,
        }
    }

    fn unavailable(&self, message: impl std::fmt::Display) -> PipelineError {
        PipelineError::ProviderUnavailable(format!("{}: {}", self.vendor.label(), message))
    }

    async fn complete(&self, request: &PromptRequest) -> Result<String> {
        debug!("Requesting completion from {} ({})", self.vendor.label(), self.model);

        let http_request = match self.vendor {
            RemoteVendor::OpenAi | RemoteVendor::Mistral => {
                let base = match self.vendor {
                    RemoteVendor::OpenAi => "https://api.openai.com/v1/chat/completions",
                    _ => "https://api.mistral.ai/v1/chat/completions",
                };
                self.client
                    .post(base)
                    .bearer_auth(&self.api_key)
                    .json(&json!({
                        "model": self.model,
                        "max_tokens": MAX_TOKENS,
                        "temperature": 0.7,
                        "messages": [
                            { "role": "system", "content": request.system },
                            { "role": "user", "content": request.user },
                        ],
                    }))
            }
            RemoteVendor::Anthropic => self
                .client
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&json!({
                    "model": self.model,
                    "max_tokens": MAX_TOKENS,
                    "system": request.system,
                    "messages": [
                        { "role": "user", "content": request.user },
                    ],
                })),
            RemoteVendor::Gemini => {
                let url = format!(
                    "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
                    self.model, self.api_key
                );
                self.client.post(url).json(&json!({
                    "systemInstruction": { "parts": [{ "text": request.system }] },
                    "contents": [{ "parts": [{ "text": request.user }] }],
                    "generationConfig": { "maxOutputTokens": MAX_TOKENS },
                }))
            }
        };

        let response = http_request
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("HTTP {}", status)));
        }
        if let Some(length) = response.content_length() {
            if length > MAX_RESPONSE_BYTES {
                return Err(self.unavailable(format!("response too large: {} bytes", length)));
            }
        }

        let body: Value = response.json().await.map_err(|e| self.unavailable(e))?;
        let pointer = match self.vendor {
            RemoteVendor::OpenAi | RemoteVendor::Mistral => "/choices/0/message/content",
            RemoteVendor::Anthropic => "/content/0/text",
            RemoteVendor::Gemini => "/candidates/0/content/parts/0/text",
        };

        let text = body
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(|t| t.trim().to_string())
            .ok_or(PipelineError::EmptyResponse)?;

        if text.is_empty() {
            return Err(PipelineError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl SummaryProvider for RemoteProvider {
    fn name(&self) -> &str {
        self.vendor.label()
    }

    fn retries_on_unavailable(&self) -> bool {
        true
    }

    async fn summarize_article(&self, article: &Article) -> Result<ArticleSummary> {
        let request = self.engine.summary_request(article);
        let text = self.complete(&request).await?;

        // Providers that ignore the format instructions still yield a
        // usable result: fall back to the original fields and let the
        // clamping layer bound them.
        let (title, summary) = parse_title_summary(&text);
        Ok(ArticleSummary {
            title: title.unwrap_or_else(|| article.title.clone()),
            summary: summary.unwrap_or_else(|| article.content.clone()),
        })
    }

    async fn compose_editorial(&self, briefs: &[ArticleBrief]) -> Result<String> {
        let request = self.engine.editorial_request(briefs);
        self.complete(&request).await
    }
}
