// Summarization: turning matched papers into bilingual summaries.
//
// Each paper is summarized independently. A failure becomes an Err value on
// that paper's entry and the rest carry on; the report counts failures so
// the run summary can show them.

pub mod anthropic;
pub mod bedrock;
pub mod traits;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::filter::FilterVerdict;
use crate::papers::{HasPaperId, Paper};
pub use traits::{PlaceholderSummarizer, Summarizer, Summary};

/// Default number of summaries requested at once.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// A matched paper with its summary outcome, ready for notification.
#[derive(Debug, Clone)]
pub struct SummarizedPaper<'a> {
    pub paper: &'a Paper,
    pub match_reason: String,
    /// The error message when summarization failed.
    pub summary: Result<Summary, String>,
}

impl SummarizedPaper<'_> {
    /// Japanese summary, or a placeholder when summarization failed.
    pub fn japanese(&self) -> &str {
        match &self.summary {
            Ok(s) => &s.japanese,
            Err(_) => "(要約の生成に失敗しました)",
        }
    }

    /// English summary, or a placeholder when summarization failed.
    pub fn english(&self) -> &str {
        match &self.summary {
            Ok(s) => &s.english,
            Err(_) => "(Failed to generate summary)",
        }
    }
}

impl HasPaperId for SummarizedPaper<'_> {
    fn paper_id(&self) -> &str {
        &self.paper.id
    }
}

/// Outcome of summarizing a batch, in input order.
#[derive(Debug, Default)]
pub struct SummaryReport<'a> {
    pub items: Vec<SummarizedPaper<'a>>,
}

impl<'a> SummaryReport<'a> {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.summary.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn into_items(self) -> Vec<SummarizedPaper<'a>> {
        self.items
    }
}

/// Summarize every verdict's paper, at most `concurrency` at a time.
/// Output order matches input order.
pub async fn summarize_all<'a>(
    summarizer: &dyn Summarizer,
    verdicts: &[FilterVerdict<'a>],
    concurrency: usize,
    show_progress: bool,
) -> Result<SummaryReport<'a>> {
    let pb = if show_progress {
        let pb = ProgressBar::new(verdicts.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  Summarizing [{bar:30}] {pos}/{len} ({eta})")
                .context("Invalid progress bar template")?,
        );
        Some(pb)
    } else {
        None
    };

    let items: Vec<SummarizedPaper<'a>> = stream::iter(verdicts.iter().map(|verdict| {
        let pb = pb.as_ref();
        async move {
            let paper: &'a Paper = verdict.paper;
            let summary = summarizer.summarize(paper).await.map_err(|e| {
                warn!(paper = %paper.id, error = %e, "Summarization failed, using placeholder");
                format!("{e:#}")
            });
            if let Some(pb) = pb {
                pb.inc(1);
            }
            SummarizedPaper {
                paper,
                match_reason: verdict.match_reason(),
                summary,
            }
        }
    }))
    .buffered(concurrency.max(1))
    .collect()
    .await;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    Ok(SummaryReport { items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::papers::Source;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, BTreeSet};

    fn paper(id: &str) -> Paper {
        Paper {
            id: id.to_string(),
            title: format!("Paper {id}"),
            authors: vec![],
            abstract_text: String::new(),
            journal: "Nature".to_string(),
            publication_date: String::new(),
            doi: None,
            source: Source::Pubmed,
        }
    }

    fn verdict(paper: &Paper) -> FilterVerdict<'_> {
        FilterVerdict {
            paper,
            matched_topics: vec!["pangenome".to_string()],
            matched_authors: BTreeSet::new(),
            topic_scores: BTreeMap::from([("pangenome".to_string(), 0.5)]),
        }
    }

    /// Fails for ids starting with "bad".
    struct Flaky;

    #[async_trait]
    impl Summarizer for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn summarize(&self, paper: &Paper) -> anyhow::Result<Summary> {
            if paper.id.starts_with("bad") {
                anyhow::bail!("rate limited");
            }
            Ok(Summary {
                english: format!("summary of {}", paper.id),
                japanese: format!("{} の要約", paper.id),
            })
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_rest() {
        let papers = vec![paper("1"), paper("bad-2"), paper("3")];
        let verdicts: Vec<_> = papers.iter().map(verdict).collect();

        let report = summarize_all(&Flaky, &verdicts, 2, false).await.unwrap();
        assert_eq!(report.items.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);

        let ids: Vec<&str> = report.items.iter().map(|i| i.paper_id()).collect();
        assert_eq!(ids, vec!["1", "bad-2", "3"]);

        let failed = &report.items[1];
        assert_eq!(failed.summary.as_ref().unwrap_err(), "rate limited");
        assert_eq!(failed.japanese(), "(要約の生成に失敗しました)");
        assert_eq!(report.items[2].english(), "summary of 3");
        assert_eq!(report.items[0].match_reason, "Topics: pangenome (0.50)");
    }

    #[tokio::test]
    async fn placeholder_never_fails() {
        let papers = vec![paper("1")];
        let verdicts: Vec<_> = papers.iter().map(verdict).collect();
        let report = summarize_all(&PlaceholderSummarizer, &verdicts, 0, false)
            .await
            .unwrap();
        assert_eq!(report.failed(), 0);
        assert!(report.items[0].japanese().contains("ドライラン"));
    }
}
