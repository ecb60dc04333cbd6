// Configuration: watch list and schedule from YAML, secrets from the
// environment.
//
// The YAML file says what to watch (journals, topics, authors) and how
// (window, threshold, channel). Credentials never live in the file: they
// come from env vars, with .env loaded by dotenvy at startup.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::filter::topics::DEFAULT_SIMILARITY_THRESHOLD;
use crate::history::DEFAULT_RETENTION_DAYS;
use crate::papers::Source;
use crate::summarize::DEFAULT_CONCURRENCY;

/// Used when neither `--config` nor PAPERWATCH_CONFIG is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JournalsConfig {
    /// PubMed journal names, as accepted by the `[Journal]` search field.
    pub pubmed: Vec<String>,
    /// Preprint servers ("bioRxiv", "medRxiv").
    pub preprint: Vec<String>,
    /// Per-server category allow-lists. A server without an entry is
    /// fetched across all categories.
    pub preprint_categories: HashMap<String, Vec<String>>,
}

impl JournalsConfig {
    /// Configured preprint servers, with unknown names returned separately.
    pub fn preprint_servers(&self) -> (Vec<Source>, Vec<String>) {
        let mut servers = Vec::new();
        let mut unknown = Vec::new();
        for name in &self.preprint {
            match Source::preprint_server(name) {
                Some(s) if !servers.contains(&s) => servers.push(s),
                Some(_) => {}
                None => unknown.push(name.clone()),
            }
        }
        (servers, unknown)
    }

    /// Category allow-list for `server`; keys are matched case-insensitively.
    pub fn categories_for(&self, server: Source) -> &[String] {
        self.preprint_categories
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(server.as_str()))
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywordsConfig {
    /// Topic phrases, in display order.
    pub topics: Vec<String>,
    /// Watched authors, in either "First Last" or "Last, First" form.
    pub authors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub days_back: u32,
    pub similarity_threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            days_back: 1,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub channel: String,
    /// Post a "nothing new" message when a run finds no new matches.
    pub send_if_empty: bool,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            channel: "#research-papers".to_string(),
            send_if_empty: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: PathBuf,
    pub retention_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/notified_papers.json"),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Model id; the backend default when unset.
    pub model: Option<String>,
    pub concurrency: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            model: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Which summarization backend a run uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryBackend {
    /// Anthropic Messages API with this key.
    Anthropic(String),
    /// AWS Bedrock, credentials from the AWS provider chain.
    Bedrock,
    /// No credentials: placeholder summaries (dry runs only).
    Placeholder,
}

/// Central configuration: the parsed YAML file plus environment secrets.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub journals: JournalsConfig,
    pub keywords: KeywordsConfig,
    pub search: SearchConfig,
    pub slack: SlackConfig,
    pub history: HistoryConfig,
    pub summary: SummaryConfig,

    /// ANTHROPIC_API_KEY
    #[serde(skip)]
    pub anthropic_api_key: Option<String>,
    /// SLACK_BOT_TOKEN
    #[serde(skip)]
    pub slack_bot_token: Option<String>,
    /// USE_BEDROCK=1|true|yes: summarize through AWS Bedrock
    #[serde(skip)]
    pub use_bedrock: bool,
    /// PUBMED_API_KEY (optional; raises the NCBI rate limit)
    #[serde(skip)]
    pub pubmed_api_key: Option<String>,
    /// Directory holding the embedding model (PAPERWATCH_MODEL_DIR)
    #[serde(skip)]
    pub model_dir: PathBuf,
}

impl Config {
    /// `--config`, else PAPERWATCH_CONFIG, else [`DEFAULT_CONFIG_PATH`].
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        cli_path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os("PAPERWATCH_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load the YAML file at the resolved path and fill in secrets from the
    /// environment. A missing or invalid file is an error.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(cli_path);
        let text = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config file {}\n\
                 Pass --config or set PAPERWATCH_CONFIG.",
                path.display()
            )
        })?;

        let mut config = Self::from_yaml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Parse and validate the YAML part only. Secrets stay unset.
    pub fn from_yaml(text: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a map
        let mut config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).context("Failed to parse YAML")?
        };
        config.model_dir = crate::filter::model::default_model_dir();
        config.validate()?;
        Ok(config)
    }

    /// Fill secrets and overrides from `lookup` (the process environment in
    /// production). Empty values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        self.anthropic_api_key = get("ANTHROPIC_API_KEY");
        self.slack_bot_token = get("SLACK_BOT_TOKEN");
        self.pubmed_api_key = get("PUBMED_API_KEY");
        self.use_bedrock = get("USE_BEDROCK").is_some_and(|v| env_flag(&v));
        if let Some(dir) = get("PAPERWATCH_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
    }

    fn validate(&self) -> Result<()> {
        let threshold = self.search.similarity_threshold;
        // Scores are clamped to [0, 1], so a threshold at or below zero
        // would match every topic against every paper
        if !(threshold > 0.0 && threshold <= 1.0) {
            anyhow::bail!(
                "search.similarity_threshold must be greater than 0 and at most 1, got {threshold}"
            );
        }
        if self.slack.channel.trim().is_empty() {
            anyhow::bail!("slack.channel must not be empty");
        }
        Ok(())
    }

    /// Check that the Slack bot token is configured.
    pub fn require_slack(&self) -> Result<()> {
        if self.slack_bot_token.is_none() {
            anyhow::bail!(
                "SLACK_BOT_TOKEN not set. Add it to your .env file.\n\
                 Use --dry-run to print results without posting."
            );
        }
        Ok(())
    }

    /// Check that a summarization backend is usable: Bedrock (AWS
    /// credentials are resolved by the SDK at call time) or an Anthropic
    /// API key.
    pub fn require_summarizer(&self) -> Result<()> {
        if !self.use_bedrock && self.anthropic_api_key.is_none() {
            anyhow::bail!(
                "ANTHROPIC_API_KEY not set. Add it to your .env file,\n\
                 or set USE_BEDROCK=1 to use AWS Bedrock instead.\n\
                 Use --dry-run to run without summaries."
            );
        }
        Ok(())
    }

    /// Bedrock when requested, else the direct API when a key is set, else
    /// placeholder summaries.
    pub fn summary_backend(&self) -> SummaryBackend {
        match (&self.anthropic_api_key, self.use_bedrock) {
            (_, true) => SummaryBackend::Bedrock,
            (Some(key), false) => SummaryBackend::Anthropic(key.clone()),
            (None, false) => SummaryBackend::Placeholder,
        }
    }

    /// Topic matching needs the embedding model on disk.
    pub fn require_model(&self) -> Result<()> {
        if !self.keywords.topics.is_empty()
            && !crate::filter::model::embedding_files_present(&self.model_dir)
        {
            anyhow::bail!(
                "Embedding model not found in {}\n\
                 Run `paperwatch download-model` to download it.",
                self.model_dir.display()
            );
        }
        Ok(())
    }
}

/// Boolean env flag: "1", "true" or "yes" in any case.
fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
