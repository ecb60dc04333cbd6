// Daily run: fetch -> filter -> drop already-notified -> summarize ->
// notify -> record in the ledger.
//
// Every stage degrades per item where it can (a failed source, a paper that
// can't be embedded, a summary that errors). The exceptions are the sink,
// whose failure fails the run and leaves the ledger untouched so the same
// papers are retried next time, and saving the ledger itself.

pub mod sources;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tracing::info;

use crate::config::{Config, SummaryBackend};
use crate::fetch::{fetch_all, DateWindow, PaperSource};
use crate::filter::embeddings::{Embedder, NoEmbedder, SentenceEmbedder};
use crate::filter::model::embedding_model_dir;
use crate::history::NotificationHistory;
use crate::notify::{DryRunSink, NotificationSink, SlackNotifier};
use crate::output::terminal;
use crate::papers::HasPaperId;
use crate::summarize::anthropic::AnthropicSummarizer;
use crate::summarize::bedrock::BedrockSummarizer;
use crate::summarize::{summarize_all, PlaceholderSummarizer, Summarizer};

/// Counts for one run, printed at the end whether or not it succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Unique papers returned by all sources.
    pub fetched: usize,
    /// Papers matching a topic or watched author.
    pub matched: usize,
    /// Matches not already in the ledger.
    pub new: usize,
    pub summarized: usize,
    pub summary_failures: usize,
    /// Papers delivered to the sink.
    pub notified: usize,
    /// Ledger entries removed by retention.
    pub pruned: usize,
}

/// The swappable parts of a run.
pub struct Collaborators<'a> {
    pub sources: Vec<Box<dyn PaperSource>>,
    pub embedder: &'a dyn Embedder,
    pub summarizer: &'a dyn Summarizer,
    pub sink: &'a dyn NotificationSink,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Don't touch the ledger.
    pub dry_run: bool,
    /// The run date: anchors the fetch window and ledger dates.
    pub today: NaiveDate,
    pub show_progress: bool,
}

impl RunOptions {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            today: Local::now().date_naive(),
            show_progress: true,
        }
    }
}

/// Checks made before any fetching. Outside dry-run mode Slack and a
/// summarization backend must be configured; the embedding model is
/// required whenever topics are.
pub fn preflight(config: &Config, dry_run: bool) -> Result<()> {
    if !dry_run {
        config.require_slack()?;
        config.require_summarizer()?;
    }
    config.require_model()
}

/// Run the pipeline with production collaborators built from `config`.
pub async fn run(config: &Config, dry_run: bool) -> Result<RunReport> {
    preflight(config, dry_run)?;

    let sources = sources::build_sources(config)?;

    let embedder: Box<dyn Embedder> = if config.keywords.topics.is_empty() {
        Box::new(NoEmbedder)
    } else {
        Box::new(SentenceEmbedder::load(&embedding_model_dir(
            &config.model_dir,
        ))?)
    };

    let summarizer: Box<dyn Summarizer> = match config.summary_backend() {
        SummaryBackend::Anthropic(key) => Box::new(AnthropicSummarizer::new(
            key,
            config.summary.model.clone(),
        )?),
        SummaryBackend::Bedrock => {
            println!("  Using AWS Bedrock");
            Box::new(BedrockSummarizer::from_env(config.summary.model.clone()).await)
        }
        SummaryBackend::Placeholder => {
            println!("  No ANTHROPIC_API_KEY: using placeholder summaries");
            Box::new(PlaceholderSummarizer)
        }
    };

    let sink: Box<dyn NotificationSink> = match (&config.slack_bot_token, dry_run) {
        (Some(token), false) => Box::new(SlackNotifier::new(
            token.clone(),
            config.slack.channel.clone(),
        )?),
        _ => Box::new(DryRunSink),
    };

    let parts = Collaborators {
        sources,
        embedder: embedder.as_ref(),
        summarizer: summarizer.as_ref(),
        sink: sink.as_ref(),
    };
    run_with(config, parts, &RunOptions::new(dry_run)).await
}

/// Run the pipeline with the given collaborators.
pub async fn run_with(
    config: &Config,
    parts: Collaborators<'_>,
    options: &RunOptions,
) -> Result<RunReport> {
    let mut report = RunReport::default();
    let window = DateWindow::days_back_from(options.today, config.search.days_back);

    terminal::display_watch_list(config, &window);

    // Step 1: fetch
    println!("\n[1/4] Fetching papers...");
    let papers = fetch_all(&parts.sources, &window).await;
    report.fetched = papers.len();
    println!("  Total papers fetched: {}", papers.len());

    if papers.is_empty() {
        println!("\nNo papers found.");
        return Ok(report);
    }

    // Step 2: filter, then drop anything already posted
    println!("\n[2/4] Filtering papers...");
    let verdicts = crate::filter::filter(
        parts.embedder,
        &papers,
        &config.keywords.topics,
        &config.keywords.authors,
        config.search.similarity_threshold,
    )?;
    report.matched = verdicts.len();

    let mut history = NotificationHistory::load(&config.history.path);
    let fresh = history.filter_new(verdicts);
    report.new = fresh.len();
    println!(
        "  Matched {} papers, {} not yet notified",
        report.matched, report.new
    );
    terminal::display_verdicts(&fresh);

    // Step 3: summarize
    println!("\n[3/4] Summarizing with {}...", parts.summarizer.name());
    let summaries = summarize_all(
        parts.summarizer,
        &fresh,
        config.summary.concurrency,
        options.show_progress && !fresh.is_empty(),
    )
    .await?;
    report.summarized = summaries.succeeded();
    report.summary_failures = summaries.failed();
    let items = summaries.into_items();

    // Step 4: notify, then record
    println!("\n[4/4] Sending notifications...");
    if let Err(e) = parts.sink.send(&items, config.slack.send_if_empty).await {
        terminal::display_report(&report);
        return Err(e.context("Failed to send notifications; ledger left unchanged"));
    }
    report.notified = items.len();

    if options.dry_run {
        info!("Dry run: notification history not updated");
    } else {
        history.mark_notified_on(items.iter().map(|i| i.paper_id()), options.today);
        report.pruned = history.prune_at(config.history.retention_days, options.today);
        history
            .save()
            .context("Notifications were sent but the history could not be saved")?;
    }

    info!(
        fetched = report.fetched,
        matched = report.matched,
        new = report.new,
        notified = report.notified,
        "Run complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(env: &[(&str, &str)]) -> Config {
        let mut config = Config::from_yaml("keywords:\n  authors: [\"Evan Eichler\"]\n").unwrap();
        config.apply_env(|key| {
            env.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        });
        config
    }

    #[test]
    fn bedrock_runs_without_anthropic_key() {
        let config = config(&[("SLACK_BOT_TOKEN", "xoxb-1"), ("USE_BEDROCK", "1")]);
        assert!(preflight(&config, false).is_ok());
    }

    #[test]
    fn direct_api_needs_its_key() {
        let config = config(&[("SLACK_BOT_TOKEN", "xoxb-1")]);
        let err = preflight(&config, false).unwrap_err().to_string();
        assert!(err.contains("ANTHROPIC_API_KEY"));
        assert!(err.contains("USE_BEDROCK"));
    }

    #[test]
    fn slack_is_required_even_with_bedrock() {
        let config = config(&[("USE_BEDROCK", "true")]);
        let err = preflight(&config, false).unwrap_err().to_string();
        assert!(err.contains("SLACK_BOT_TOKEN"));
    }

    #[test]
    fn dry_run_needs_no_credentials() {
        assert!(preflight(&config(&[]), true).is_ok());
    }
}
