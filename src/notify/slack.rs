// Slack sink: Block Kit messages via chat.postMessage.
//
// Layout: a dated header and count line, then per paper a linked title,
// journal and authors, match reason and the Japanese summary, each
// followed by a divider. Slack caps a message at 50 blocks and a section's
// text at 3000 characters, so long batches go out as several messages.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::NotificationSink;
use crate::output::truncate_chars;
use crate::summarize::SummarizedPaper;

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Blocks per chat.postMessage call.
pub const MAX_BLOCKS_PER_MESSAGE: usize = 50;

/// Characters allowed in a section block's text.
pub const SECTION_TEXT_LIMIT: usize = 3000;

/// Authors shown before "et al.".
const DISPLAY_AUTHORS: usize = 3;

/// Notification text for clients that can't render blocks.
const FALLBACK_TEXT: &str = "論文ピックアップ";

pub struct SlackNotifier {
    client: Client,
    token: String,
    channel: String,
}

impl SlackNotifier {
    pub fn new(token: String, channel: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            token,
            channel,
        })
    }

    async fn post_blocks(&self, blocks: &[Value]) -> Result<()> {
        let body = json!({
            "channel": self.channel,
            "text": FALLBACK_TEXT,
            "blocks": blocks,
        });

        let response = self
            .client
            .post(POST_MESSAGE_URL)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("Failed to call Slack API")?;

        let status = response.status();
        let payload = response
            .text()
            .await
            .context("Failed to read Slack API response")?;
        if !status.is_success() {
            anyhow::bail!("Slack API returned {status}: {}", truncate_chars(&payload, 300));
        }

        let parsed: SlackResponse =
            serde_json::from_str(&payload).context("Failed to parse Slack API response")?;
        if !parsed.ok {
            anyhow::bail!(
                "Slack API error: {}",
                parsed.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        debug!(channel = %self.channel, blocks = blocks.len(), "Posted Slack message");
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    async fn send(&self, items: &[SummarizedPaper<'_>], send_if_empty: bool) -> Result<()> {
        let today = Local::now().date_naive();
        let blocks = if items.is_empty() {
            if !send_if_empty {
                return Ok(());
            }
            empty_blocks(today)
        } else {
            message_blocks(items, today)
        };

        let chunks: Vec<&[Value]> = blocks.chunks(MAX_BLOCKS_PER_MESSAGE).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            self.post_blocks(chunk)
                .await
                .with_context(|| format!("Slack message {} of {} failed", i + 1, chunks.len()))?;
        }

        info!(
            channel = %self.channel,
            papers = items.len(),
            messages = chunks.len(),
            "Sent Slack notification"
        );
        Ok(())
    }
}

#[derive(Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

fn header_block(today: NaiveDate) -> Value {
    json!({
        "type": "header",
        "text": {
            "type": "plain_text",
            "text": format!("📖 本日の論文ピックアップ ({})", today.format("%Y年%m月%d日")),
            "emoji": true,
        },
    })
}

fn section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": {
            "type": "mrkdwn",
            "text": truncate_chars(text, SECTION_TEXT_LIMIT - 3),
        },
    })
}

fn divider() -> Value {
    json!({ "type": "divider" })
}

/// "A, B, C et al. (7 authors)"
pub fn format_authors(authors: &[String]) -> String {
    let shown = authors
        .iter()
        .take(DISPLAY_AUTHORS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if authors.len() > DISPLAY_AUTHORS {
        format!("{shown} et al. ({} authors)", authors.len())
    } else {
        shown
    }
}

/// Blocks for one paper: title link, context line, reason, summary, divider.
pub fn paper_blocks(item: &SummarizedPaper<'_>) -> Vec<Value> {
    let paper = item.paper;
    vec![
        section(&format!("*<{}|{}>*", paper.url(), paper.title)),
        json!({
            "type": "context",
            "elements": [{
                "type": "mrkdwn",
                "text": format!("📚 {} | 👤 {}", paper.journal, format_authors(&paper.authors)),
            }],
        }),
        section(&format!("🔍 *マッチ理由:* {}", item.match_reason)),
        section(&format!("📝 *要約:*\n{}", item.japanese())),
        divider(),
    ]
}

/// Full block list for a non-empty batch.
pub fn message_blocks(items: &[SummarizedPaper<'_>], today: NaiveDate) -> Vec<Value> {
    let mut blocks = vec![
        header_block(today),
        section(&format!("関連する論文が *{}件* 見つかりました。", items.len())),
        divider(),
    ];
    for item in items {
        blocks.extend(paper_blocks(item));
    }
    blocks
}

/// The "nothing new today" message.
pub fn empty_blocks(today: NaiveDate) -> Vec<Value> {
    vec![
        header_block(today),
        section("本日は関連する新着論文がありませんでした。"),
    ]
}
