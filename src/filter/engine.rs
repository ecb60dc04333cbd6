// Filter engine: topic + author matching over a batch of papers.
//
// Produces one verdict per paper and keeps only papers that matched at least
// one topic or one watched author. Pure computation: no I/O beyond the
// embedder itself.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use tracing::{debug, info, warn};

use super::authors::WatchList;
use super::embeddings::Embedder;
use super::topics::{matched_topics, score_topics, TopicSession};
use crate::papers::{HasPaperId, Paper};

/// Why a paper was (or wasn't) selected.
#[derive(Debug, Clone)]
pub struct FilterVerdict<'a> {
    pub paper: &'a Paper,
    /// Matched topics in configured order.
    pub matched_topics: Vec<String>,
    /// Matched watch-list entries, as written in config, sorted.
    pub matched_authors: BTreeSet<String>,
    /// Similarity for every configured topic (empty when topic scoring was
    /// skipped for this paper).
    pub topic_scores: BTreeMap<String, f64>,
}

impl FilterVerdict<'_> {
    pub fn is_matched(&self) -> bool {
        !self.matched_topics.is_empty() || !self.matched_authors.is_empty()
    }

    /// Human-readable match reason, e.g.
    /// `Authors: Evan Eichler; Topics: pangenome (0.62)`.
    pub fn match_reason(&self) -> String {
        let mut reasons = Vec::new();
        if !self.matched_authors.is_empty() {
            let authors: Vec<&str> = self.matched_authors.iter().map(String::as_str).collect();
            reasons.push(format!("Authors: {}", authors.join(", ")));
        }
        if !self.matched_topics.is_empty() {
            let topics: Vec<String> = self
                .matched_topics
                .iter()
                .map(|t| {
                    let score = self.topic_scores.get(t).copied().unwrap_or(0.0);
                    format!("{t} ({score:.2})")
                })
                .collect();
            reasons.push(format!("Topics: {}", topics.join(", ")));
        }
        reasons.join("; ")
    }
}

impl HasPaperId for FilterVerdict<'_> {
    fn paper_id(&self) -> &str {
        &self.paper.id
    }
}

/// A prepared filter session: topic vectors cached, watch list normalized.
pub struct PaperFilter<'e> {
    embedder: &'e dyn Embedder,
    session: TopicSession,
    watch_list: WatchList,
    similarity_threshold: f64,
}

impl<'e> PaperFilter<'e> {
    /// Prepare a filter session. Fails only if the topic phrases can't be
    /// embedded.
    pub fn new(
        embedder: &'e dyn Embedder,
        topics: &[String],
        authors: &[String],
        similarity_threshold: f64,
    ) -> Result<Self> {
        Ok(Self {
            embedder,
            session: TopicSession::prepare(embedder, topics)?,
            watch_list: WatchList::new(authors),
            similarity_threshold,
        })
    }

    /// Evaluate one paper. A failure to embed this paper's text is logged
    /// and the paper is judged on its authors alone; it never affects other
    /// papers' verdicts.
    pub fn evaluate<'a>(&self, paper: &'a Paper) -> FilterVerdict<'a> {
        let topic_scores = match score_topics(self.embedder, &self.session, &paper.searchable_text())
        {
            Ok(scores) => scores,
            Err(e) => {
                warn!(paper = %paper.id, error = %e, "Failed to embed paper, matching on authors only");
                BTreeMap::new()
            }
        };

        let matched_topics = matched_topics(&self.session, &topic_scores, self.similarity_threshold);
        let matched_authors = self.watch_list.matches(&paper.authors);

        FilterVerdict {
            paper,
            matched_topics,
            matched_authors,
            topic_scores,
        }
    }

    /// Evaluate every paper and keep the matches, in input order.
    pub fn filter<'a>(&self, papers: &'a [Paper]) -> Vec<FilterVerdict<'a>> {
        let verdicts: Vec<FilterVerdict<'a>> = papers
            .iter()
            .map(|p| self.evaluate(p))
            .filter(|v| {
                if v.is_matched() {
                    debug!(paper = %v.paper.id, reason = %v.match_reason(), "Paper matched");
                }
                v.is_matched()
            })
            .collect();

        info!(
            papers = papers.len(),
            matched = verdicts.len(),
            "Filter pass complete"
        );
        verdicts
    }
}

/// One-shot filter: prepare a session and run it over `papers`.
pub fn filter<'a>(
    embedder: &dyn Embedder,
    papers: &'a [Paper],
    topics: &[String],
    authors: &[String],
    similarity_threshold: f64,
) -> Result<Vec<FilterVerdict<'a>>> {
    let paper_filter = PaperFilter::new(embedder, topics, authors, similarity_threshold)?;
    Ok(paper_filter.filter(papers))
}
