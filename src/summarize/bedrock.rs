// AWS Bedrock summarizer over the Converse API.
//
// Same prompt and output format as the direct Anthropic backend. Selected
// with USE_BEDROCK=1; credentials and region come from the standard AWS
// provider chain (AWS_* env vars, ~/.aws profiles, instance roles), so no
// ANTHROPIC_API_KEY is needed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput, InferenceConfiguration, Message,
    SystemContentBlock,
};
use aws_sdk_bedrockruntime::Client;
use tracing::debug;

use super::anthropic::{build_prompt, MAX_TOKENS, SYSTEM_PROMPT};
use super::traits::{Summarizer, Summary};
use crate::papers::Paper;

/// Cross-region inference profile used when the config doesn't name a model.
pub const DEFAULT_MODEL: &str = "global.anthropic.claude-opus-4-5-20251101-v1:0";

pub struct BedrockSummarizer {
    client: Client,
    model: String,
}

impl BedrockSummarizer {
    /// Build a client from the ambient AWS configuration.
    pub async fn from_env(model: Option<String>) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::with_client(Client::new(&sdk_config), model)
    }

    pub fn with_client(client: Client, model: Option<String>) -> Self {
        Self {
            client,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

#[async_trait]
impl Summarizer for BedrockSummarizer {
    fn name(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, paper: &Paper) -> Result<Summary> {
        let message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(build_prompt(paper)))
            .build()
            .context("Failed to build Bedrock message")?;

        let response = self
            .client
            .converse()
            .model_id(&self.model)
            .system(SystemContentBlock::Text(SYSTEM_PROMPT.to_string()))
            .messages(message)
            .inference_config(
                InferenceConfiguration::builder()
                    .max_tokens(MAX_TOKENS as i32)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Bedrock Converse call failed: {}", DisplayErrorContext(&e)))?;

        let text = response_text(response.output());
        if text.trim().is_empty() {
            anyhow::bail!("Bedrock returned no text content");
        }

        debug!(paper = %paper.id, chars = text.len(), "Summarized paper via Bedrock");
        Ok(Summary::from_response(&text))
    }
}

/// Concatenated text blocks of an assistant reply; empty for anything else.
fn response_text(output: Option<&ConverseOutput>) -> String {
    match output {
        Some(ConverseOutput::Message(message)) => message
            .content()
            .iter()
            .filter_map(|block| block.as_text().ok())
            .map(String::as_str)
            .collect(),
        _ => String::new(),
    }
}
