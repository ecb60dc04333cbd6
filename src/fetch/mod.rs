// Paper sources: PubMed (E-utilities) and bioRxiv/medRxiv (api.biorxiv.org).
//
// Each source implements PaperSource. fetch_all runs them in turn; a source
// that fails is logged and skipped so the others still contribute.

pub mod biorxiv;
pub mod pubmed;
pub mod rate_limiter;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use tracing::{info, warn};

use crate::papers::Paper;

/// Inclusive publication-date window to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The `days_back` days before `today`, excluding today itself.
    /// `days_back == 0` means just today.
    pub fn days_back_from(today: NaiveDate, days_back: u32) -> Self {
        if days_back == 0 {
            return Self {
                start: today,
                end: today,
            };
        }
        let start = today
            .checked_sub_days(Days::new(u64::from(days_back)))
            .unwrap_or(NaiveDate::MIN);
        let end = today.pred_opt().unwrap_or(today);
        Self { start, end }
    }

    /// Window ending yesterday (local time).
    pub fn days_back(days_back: u32) -> Self {
        Self::days_back_from(Local::now().date_naive(), days_back)
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// A collaborator that produces papers for a date window.
///
/// Implementations must give every paper a stable `id` and must not return
/// two different papers under the same id.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Short name for logs and progress output.
    fn name(&self) -> String;

    async fn fetch(&self, window: &DateWindow) -> Result<Vec<Paper>>;
}

/// Fetch from every source, skipping sources that fail, then drop repeated
/// ids (first occurrence wins).
pub async fn fetch_all(sources: &[Box<dyn PaperSource>], window: &DateWindow) -> Vec<Paper> {
    let mut papers = Vec::new();

    for source in sources {
        let name = source.name();
        println!("Fetching from {name}...");
        match source.fetch(window).await {
            Ok(found) => {
                println!("  Found {} papers from {name}", found.len());
                info!(source = %name, count = found.len(), "Fetched papers");
                papers.extend(found);
            }
            Err(e) => {
                warn!(source = %name, error = %e, "Fetch failed, skipping source");
                println!("  Failed to fetch from {name}: {e:#}");
            }
        }
    }

    dedup_by_id(papers)
}

/// Keep the first paper for each id, preserving order.
pub fn dedup_by_id(papers: Vec<Paper>) -> Vec<Paper> {
    let mut seen = HashSet::new();
    papers
        .into_iter()
        .filter(|p| seen.insert(p.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::papers::Source;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn paper(id: &str, title: &str) -> Paper {
        Paper {
            id: id.to_string(),
            title: title.to_string(),
            authors: vec![],
            abstract_text: String::new(),
            journal: String::new(),
            publication_date: String::new(),
            doi: None,
            source: Source::Biorxiv,
        }
    }

    #[test]
    fn window_excludes_today() {
        let w = DateWindow::days_back_from(date("2025-06-10"), 1);
        assert_eq!(w.start, date("2025-06-09"));
        assert_eq!(w.end, date("2025-06-09"));

        let w = DateWindow::days_back_from(date("2025-03-02"), 7);
        assert_eq!(w.start, date("2025-02-23"));
        assert_eq!(w.end, date("2025-03-01"));
    }

    #[test]
    fn zero_days_back_is_today() {
        let w = DateWindow::days_back_from(date("2025-06-10"), 0);
        assert_eq!(w.start, date("2025-06-10"));
        assert_eq!(w.end, date("2025-06-10"));
    }

    #[test]
    fn dedup_keeps_first() {
        let papers = vec![paper("a", "first"), paper("b", "other"), paper("a", "second")];
        let deduped = dedup_by_id(papers);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "first");
        assert_eq!(deduped[1].id, "b");
    }

    struct Failing;

    #[async_trait]
    impl PaperSource for Failing {
        fn name(&self) -> String {
            "failing".to_string()
        }
        async fn fetch(&self, _window: &DateWindow) -> Result<Vec<Paper>> {
            anyhow::bail!("connection refused")
        }
    }

    struct Fixed(Vec<Paper>);

    #[async_trait]
    impl PaperSource for Fixed {
        fn name(&self) -> String {
            "fixed".to_string()
        }
        async fn fetch(&self, _window: &DateWindow) -> Result<Vec<Paper>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn failing_source_does_not_block_others() {
        let sources: Vec<Box<dyn PaperSource>> = vec![
            Box::new(Failing),
            Box::new(Fixed(vec![paper("1", "a"), paper("2", "b")])),
            Box::new(Fixed(vec![paper("2", "dup")])),
        ];
        let window = DateWindow::days_back_from(date("2025-06-10"), 1);
        let papers = fetch_all(&sources, &window).await;
        let ids: Vec<&str> = papers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
