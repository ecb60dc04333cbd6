// Summarizer trait: one paper in, a bilingual summary out.
//
// Production backends call the Anthropic Messages API directly or through
// AWS Bedrock. The placeholder backend lets dry runs exercise the rest of
// the pipeline without credentials.

use anyhow::Result;
use async_trait::async_trait;

use crate::papers::Paper;

/// Marker separating the English and Japanese halves of a model response.
pub const JAPANESE_MARKER: &str = "---JAPANESE---";

/// Shown in place of the Japanese half when the model omitted the marker.
pub const MISSING_JAPANESE: &str = "(日本語要約の生成に失敗しました)";

/// A paper summary in English and Japanese.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub english: String,
    pub japanese: String,
}

impl Summary {
    /// Split a raw model response on [`JAPANESE_MARKER`]. Without the marker
    /// the whole response is taken as English.
    pub fn from_response(text: &str) -> Self {
        match text.split_once(JAPANESE_MARKER) {
            Some((english, japanese)) => Self {
                english: english.trim().to_string(),
                japanese: japanese.trim().to_string(),
            },
            None => Self {
                english: text.trim().to_string(),
                japanese: MISSING_JAPANESE.to_string(),
            },
        }
    }
}

/// Produces a summary for a single paper. Implementations are called
/// concurrently, so they must be `Send + Sync`.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Human-readable backend name for progress output.
    fn name(&self) -> &str;

    async fn summarize(&self, paper: &Paper) -> Result<Summary>;
}

/// Summarizer for dry runs without an API key. Never calls out.
pub struct PlaceholderSummarizer;

#[async_trait]
impl Summarizer for PlaceholderSummarizer {
    fn name(&self) -> &str {
        "placeholder (dry run)"
    }

    async fn summarize(&self, _paper: &Paper) -> Result<Summary> {
        Ok(Summary {
            english: "(dry run: no summary generated)".to_string(),
            japanese: "(ドライラン: 要約は生成されません)".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_marker() {
        let s = Summary::from_response("## Background\nEnglish.\n---JAPANESE---\n## 背景\n日本語。\n");
        assert_eq!(s.english, "## Background\nEnglish.");
        assert_eq!(s.japanese, "## 背景\n日本語。");
    }

    #[test]
    fn only_first_marker_splits() {
        let s = Summary::from_response("en ---JAPANESE--- ja ---JAPANESE--- more");
        assert_eq!(s.english, "en");
        assert_eq!(s.japanese, "ja ---JAPANESE--- more");
    }

    #[test]
    fn missing_marker_keeps_english() {
        let s = Summary::from_response("  only english  ");
        assert_eq!(s.english, "only english");
        assert_eq!(s.japanese, MISSING_JAPANESE);
    }
}
