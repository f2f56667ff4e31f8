use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::prompt::SlotOverrides;
use crate::types::{PipelineError, Result};

/// Which summarization backend drives the run. Backends are
/// interchangeable from the pipeline's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[clap(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Deterministic offline transform; demo/testing, never fails.
    Simple,
    Openai,
    Anthropic,
    Gemini,
    Mistral,
    /// External command line tool, prompt on stdin, result on stdout.
    Cli,
}

impl ProviderKind {
    /// Remote request/response backends get exactly one retry on
    /// transient failure; local and no-op backends get none.
    pub fn is_remote(self) -> bool {
        matches!(self, Self::Openai | Self::Anthropic | Self::Gemini | Self::Mistral)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub gemini: Option<String>,
    pub mistral: Option<String>,
}

impl ApiKeys {
    /// Environment variables fill any key the config file left unset.
    fn apply_env(&mut self) {
        let from_env = |var: &str| env::var(var).ok().filter(|v| !v.is_empty());
        self.openai = self.openai.take().or_else(|| from_env("OPENAI_API_KEY"));
        self.anthropic = self.anthropic.take().or_else(|| from_env("ANTHROPIC_API_KEY"));
        self.gemini = self.gemini.take().or_else(|| from_env("GEMINI_API_KEY"));
        self.mistral = self.mistral.take().or_else(|| from_env("MISTRAL_API_KEY"));
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliProviderConfig {
    /// Executable to invoke for `provider = "cli"`.
    pub command: Option<String>,
    pub args: Vec<String>,
}

/// Per-slot prompt overrides, merged over the built-in defaults at slot
/// granularity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub summary: SlotOverrides,
    pub editorial: SlotOverrides,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// `{content}` is truncated to this many characters before it is
    /// substituted into a prompt.
    pub content_truncation: usize,
    pub summary_title_max: usize,
    pub summary_body_max: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            content_truncation: 500,
            summary_title_max: 80,
            summary_body_max: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderKind,
    /// Subscribed feed URLs, in order. Supplied fresh to each run.
    pub feeds: Vec<String>,
    /// Optional topics the prompts steer the AI towards.
    pub keywords: Vec<String>,
    pub api_keys: ApiKeys,
    pub cli: CliProviderConfig,
    pub prompts: PromptConfig,
    pub limits: Limits,
    pub provider_timeout_secs: u64,
    /// Replaces the stored cursor for testing/backfill.
    pub since_override: Option<DateTime<Utc>>,
    /// Where the cursor file and editorial archive live. Defaults to the
    /// platform config directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Simple,
            feeds: vec![
                "https://news.ycombinator.com/rss".to_string(),
                "https://www.reddit.com/r/programming/.rss".to_string(),
                "https://github.blog/feed/".to_string(),
            ],
            keywords: Vec::new(),
            api_keys: ApiKeys::default(),
            cli: CliProviderConfig::default(),
            prompts: PromptConfig::default(),
            limits: Limits::default(),
            provider_timeout_secs: 30,
            since_override: None,
            data_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the first default
    /// location that exists, or fall back to the built-in defaults.
    /// API keys missing from the file are filled from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(PipelineError::Config(format!(
                        "config file not found: {}",
                        explicit.display()
                    )));
                }
                Some(explicit.to_path_buf())
            }
            None => Self::default_locations().into_iter().find(|p| p.exists()),
        };

        let mut config = match file {
            Some(file) => {
                info!("Loading configuration from {}", file.display());
                let raw = std::fs::read_to_string(&file)?;
                toml::from_str(&raw).map_err(|e| {
                    PipelineError::Config(format!("{}: {}", file.display(), e))
                })?
            }
            None => {
                debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.api_keys.apply_env();
        Ok(config)
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from("daybrew.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            locations.push(config_dir.join("daybrew").join("config.toml"));
        }
        locations
    }

    /// The API key for the configured remote provider, if any.
    pub fn api_key_for(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Openai => self.api_keys.openai.as_deref(),
            ProviderKind::Anthropic => self.api_keys.anthropic.as_deref(),
            ProviderKind::Gemini => self.api_keys.gemini.as_deref(),
            ProviderKind::Mistral => self.api_keys.mistral.as_deref(),
            ProviderKind::Simple | ProviderKind::Cli => None,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.data_dir {
            return dir.clone();
        }
        match dirs::config_dir() {
            Some(config_dir) => config_dir.join("daybrew"),
            None => {
                warn!("No platform config directory, keeping state in the working directory");
                PathBuf::from(".daybrew")
            }
        }
    }

    pub fn cursor_path(&self) -> PathBuf {
        self.data_dir().join("last_fetch.json")
    }

    pub fn editorials_dir(&self) -> PathBuf {
        self.data_dir().join("editorials")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_limits() {
        let config = Config::default();
        assert_eq!(config.limits.content_truncation, 500);
        assert_eq!(config.limits.summary_title_max, 80);
        assert_eq!(config.limits.summary_body_max, 200);
        assert_eq!(config.provider, ProviderKind::Simple);
        assert!(!config.feeds.is_empty());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "provider = \"anthropic\"\n\n[prompts.summary]\nuser_prompt = \"Short: {{title}}\""
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.provider, ProviderKind::Anthropic);
        assert_eq!(
            config.prompts.summary.user_prompt.as_deref(),
            Some("Short: {title}")
        );
        // Untouched sections stay at their defaults.
        assert!(config.prompts.summary.format_section.is_none());
        assert_eq!(config.limits.content_truncation, 500);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/daybrew.toml")));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn remote_detection() {
        assert!(ProviderKind::Openai.is_remote());
        assert!(ProviderKind::Gemini.is_remote());
        assert!(!ProviderKind::Simple.is_remote());
        assert!(!ProviderKind::Cli.is_remote());
    }
}
