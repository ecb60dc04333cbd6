// Topic matching: cosine similarity between paper text and configured topics.
//
// Topic vectors are computed once per filter session and reused for every
// paper in the batch; each paper's title + abstract is embedded once.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::debug;

use super::embeddings::{cosine_similarity, Embedder};

/// Default minimum cosine similarity for a topic to count as matched.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.4;

/// Configured topics together with their cached embeddings.
///
/// Owned by whoever runs the filter pass and passed by reference into
/// scoring; there is no process-wide cache.
#[derive(Debug, Clone, Default)]
pub struct TopicSession {
    topics: Vec<String>,
    vectors: Vec<Vec<f64>>,
}

impl TopicSession {
    /// Embed every topic once. An empty topic list needs no model calls.
    pub fn prepare(embedder: &dyn Embedder, topics: &[String]) -> Result<Self> {
        if topics.is_empty() {
            return Ok(Self::default());
        }

        let vectors = embedder
            .embed(topics)
            .context("Failed to embed configured topics")?;
        if vectors.len() != topics.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} topics",
                vectors.len(),
                topics.len()
            );
        }

        debug!(topics = topics.len(), "Prepared topic embeddings");

        Ok(Self {
            topics: topics.to_vec(),
            vectors,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Topics in configured order.
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Score an already-embedded paper vector against every topic.
    pub fn score_vector(&self, paper_vector: &[f64]) -> BTreeMap<String, f64> {
        self.topics
            .iter()
            .zip(&self.vectors)
            .map(|(topic, v)| (topic.clone(), cosine_similarity(paper_vector, v)))
            .collect()
    }
}

/// Embed `paper_text` and score it against every topic in the session.
pub fn score_topics(
    embedder: &dyn Embedder,
    session: &TopicSession,
    paper_text: &str,
) -> Result<BTreeMap<String, f64>> {
    if session.is_empty() {
        return Ok(BTreeMap::new());
    }
    let paper_vector = embedder.embed_one(paper_text)?;
    Ok(session.score_vector(&paper_vector))
}

/// Topics whose score reaches `threshold`, in configured order.
pub fn matched_topics(
    session: &TopicSession,
    scores: &BTreeMap<String, f64>,
    threshold: f64,
) -> Vec<String> {
    session
        .topics()
        .iter()
        .filter(|t| scores.get(t.as_str()).is_some_and(|&s| s >= threshold))
        .cloned()
        .collect()
}
