// Anthropic Messages API summarizer.
//
// One request per paper. The system prompt asks for an English summary,
// the marker line, then a Japanese summary; Summary::from_response splits
// the two halves.
//
// API docs: https://docs.anthropic.com/en/api/messages

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{Summarizer, Summary};
use crate::output::truncate_chars;
use crate::papers::Paper;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
pub(super) const MAX_TOKENS: u32 = 5000;

/// Model used when the config doesn't name one.
pub const DEFAULT_MODEL: &str = "claude-opus-4-5-20251101";

/// Authors listed in the prompt before "...".
const PROMPT_AUTHOR_LIMIT: usize = 5;

pub(super) const SYSTEM_PROMPT: &str = "You summarize academic papers for researchers. \
Write the English summary first with the sections Background, Methods, Key Findings, \
Conclusions and Impact & Perspectives. Then write ---JAPANESE--- on its own line, \
followed by the same summary in Japanese. Keep technical terms in English where a \
Japanese rendering would be unclear.";

pub struct AnthropicSummarizer {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicSummarizer {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(180))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

/// The user turn for one paper.
pub fn build_prompt(paper: &Paper) -> String {
    let mut authors = paper
        .authors
        .iter()
        .take(PROMPT_AUTHOR_LIMIT)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if paper.authors.len() > PROMPT_AUTHOR_LIMIT {
        authors.push_str("...");
    }

    format!(
        "Please summarize the following paper in both English and Japanese.\n\n\
         Title: {}\n\nAuthors: {authors}\n\nJournal: {}\n\nAbstract:\n{}",
        paper.title, paper.journal, paper.abstract_text
    )
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    fn name(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, paper: &Paper) -> Result<Summary> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: build_prompt(paper),
            }],
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .context("Failed to call Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API returned {}: {}", status, truncate_chars(&body, 300));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic API response")?;

        let text = result.text();
        if text.trim().is_empty() {
            anyhow::bail!("Anthropic API returned no text content");
        }

        debug!(paper = %paper.id, chars = text.len(), "Summarized paper");
        Ok(Summary::from_response(&text))
    }
}

// --- Messages API request/response types ---

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

impl MessagesResponse {
    /// Concatenated text of all text blocks.
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect()
    }
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}
