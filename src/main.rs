use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use tracing::warn;

use daybrew::composer::{EditorialComposer, RunOutcome};
use daybrew::config::{Config, ProviderKind};
use daybrew::refresh::RefreshPolicy;
use daybrew::Archive;

#[derive(Parser)]
#[command(name = "daybrew", about = "RSS aggregation with an AI morning editorial", version)]
struct Cli {
    /// Path to a configuration file (default: ./daybrew.toml, then the
    /// platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch feeds and compose an editorial (the default)
    Run {
        /// Override the configured provider
        #[arg(long, value_enum)]
        provider: Option<ProviderKind>,

        /// Override the configured feed URLs
        #[arg(long = "feed")]
        feeds: Vec<String>,

        /// Only include articles published after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Only run when inside a scheduled refresh window
        #[arg(long)]
        scheduled: bool,
    },
    /// List archived editorials, newest first
    List,
    /// Print one archived editorial
    Show { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run {
        provider: None,
        feeds: Vec::new(),
        since: None,
        scheduled: false,
    }) {
        Command::Run { provider, feeds, since, scheduled } => {
            run(config, provider, feeds, since, scheduled).await
        }
        Command::List => list(config),
        Command::Show { path } => show(config, path),
    }
}

async fn run(
    mut config: Config,
    provider: Option<ProviderKind>,
    feeds: Vec<String>,
    since: Option<DateTime<Utc>>,
    scheduled: bool,
) -> Result<()> {
    if let Some(provider) = provider {
        config.provider = provider;
    }
    if !feeds.is_empty() {
        config.feeds = feeds;
    }
    if since.is_some() {
        config.since_override = since;
    }

    if scheduled {
        let policy = RefreshPolicy::default();
        let now = Local::now().naive_local();
        if !policy.is_within_window(now) {
            println!(
                "Outside the refresh window; next refresh at {}",
                policy.next_refresh(now).format("%Y-%m-%d %H:%M")
            );
            return Ok(());
        }
    }

    let composer = EditorialComposer::from_config(&config)?;
    let report = composer.run_once().await?;

    if !report.failures.is_empty() {
        warn!("{} of {} feeds failed", report.failures.len(), config.feeds.len());
        for failure in &report.failures {
            eprintln!("feed failed: {} ({})", failure.url, failure.message);
        }
    }

    match report.outcome {
        RunOutcome::NothingToReport => {
            println!("Nothing to report: no new articles since the last run.");
            Ok(())
        }
        RunOutcome::Published { editorial, path } => {
            println!("{}\n", editorial.body);
            println!(
                "Editorial from {} articles archived to {}",
                editorial.article_count,
                path.display()
            );
            Ok(())
        }
        RunOutcome::Failed { error, articles, .. } => {
            eprintln!(
                "Run failed after fetching {} articles: {}",
                articles.len(),
                error
            );
            Err(error.into())
        }
    }
}

fn list(config: Config) -> Result<()> {
    let archive = Archive::new(config.editorials_dir())?;
    let entries = archive.list()?;
    if entries.is_empty() {
        println!("No archived editorials.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.title,
            entry.path.display()
        );
    }
    Ok(())
}

fn show(config: Config, path: PathBuf) -> Result<()> {
    let archive = Archive::new(config.editorials_dir())?;
    print!("{}", archive.load(&path)?);
    Ok(())
}
