// bioRxiv / medRxiv fetcher over api.biorxiv.org.
//
// GET /details/{server}/{start}/{end}/{cursor} returns up to 100 records per
// page. We page by cursor until messages[0].total is reached, a page comes
// back empty, or the per-server cap is hit.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{DateWindow, PaperSource};
use crate::papers::{Paper, Source};

const BASE_URL: &str = "https://api.biorxiv.org/details";

/// Most papers taken from one server per run.
pub const DEFAULT_MAX_RESULTS: usize = 2000;

/// Fetches recent preprints from one server, optionally restricted to a set
/// of subject categories.
pub struct BioRxivFetcher {
    client: reqwest::Client,
    server: Source,
    /// Lower-cased allow-list; empty means every category.
    categories: Vec<String>,
    max_results: usize,
}

impl BioRxivFetcher {
    pub fn new(server: Source, categories: &[String]) -> Result<Self> {
        anyhow::ensure!(
            server != Source::Pubmed,
            "BioRxivFetcher only serves preprint servers, not {server}"
        );

        let client = reqwest::Client::builder()
            .user_agent(concat!("paperwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            server,
            categories: categories.iter().map(|c| c.trim().to_lowercase()).collect(),
            max_results: DEFAULT_MAX_RESULTS,
        })
    }

    async fn fetch_page(&self, window: &DateWindow, cursor: usize) -> Result<DetailsPage> {
        let url = format!(
            "{BASE_URL}/{}/{}/{}/{cursor}",
            self.server.as_str(),
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d"),
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} API returned {status}: {body}", self.server);
        }

        response
            .json::<DetailsPage>()
            .await
            .with_context(|| format!("Failed to parse {} response", self.server))
    }
}

#[async_trait]
impl PaperSource for BioRxivFetcher {
    fn name(&self) -> String {
        if self.categories.is_empty() {
            self.server.to_string()
        } else {
            format!("{} ({})", self.server, self.categories.join(", "))
        }
    }

    async fn fetch(&self, window: &DateWindow) -> Result<Vec<Paper>> {
        let mut papers = Vec::new();
        let mut cursor = 0;

        while papers.len() < self.max_results {
            let page = self.fetch_page(window, cursor).await?;
            if page.collection.is_empty() {
                break;
            }

            let page_len = page.collection.len();
            let total = page.total();
            papers.extend(
                page.collection
                    .into_iter()
                    .filter(|item| self.accepts_category(&item.category))
                    .map(|item| item.into_paper(self.server))
                    .take(self.max_results - papers.len()),
            );

            cursor += page_len;
            debug!(server = %self.server, cursor, total = ?total, kept = papers.len(), "Preprint page");

            match total {
                Some(total) if cursor < total => {}
                _ => break,
            }
        }

        Ok(papers)
    }
}

impl BioRxivFetcher {
    fn accepts_category(&self, category: &str) -> bool {
        category_allowed(&self.categories, category)
    }
}

/// `allowed` must already be lower-cased.
fn category_allowed(allowed: &[String], category: &str) -> bool {
    allowed.is_empty() || allowed.contains(&category.trim().to_lowercase())
}

#[derive(Debug, Deserialize)]
struct DetailsPage {
    #[serde(default)]
    messages: Vec<PageMessage>,
    #[serde(default)]
    collection: Vec<PreprintRecord>,
}

impl DetailsPage {
    /// Total records in the window. The API sends this as a number on some
    /// endpoints and a string on others.
    fn total(&self) -> Option<usize> {
        match self.messages.first()?.total.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().map(|n| n as usize),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageMessage {
    #[serde(default)]
    total: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PreprintRecord {
    #[serde(default)]
    doi: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: String,
    #[serde(default, rename = "abstract")]
    abstract_text: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    category: String,
}

impl PreprintRecord {
    fn into_paper(self, server: Source) -> Paper {
        let authors = self
            .authors
            .split(';')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect();

        let journal = if self.category.is_empty() {
            server.as_str().to_string()
        } else {
            format!("{} ({})", server.as_str(), self.category)
        };

        Paper {
            id: self.doi.replace('/', "_"),
            title: self.title.trim().to_string(),
            authors,
            abstract_text: self.abstract_text.trim().to_string(),
            journal,
            publication_date: self.date,
            doi: Some(self.doi).filter(|d| !d.is_empty()),
            source: server,
        }
    }
}

/// Parse one details page into papers, applying a category allow-list
/// (case-insensitive; empty accepts everything).
pub fn parse_details_page(json: &str, server: Source, categories: &[String]) -> Result<Vec<Paper>> {
    let page: DetailsPage =
        serde_json::from_str(json).with_context(|| format!("Failed to parse {server} response"))?;
    let allowed: Vec<String> = categories.iter().map(|c| c.trim().to_lowercase()).collect();

    Ok(page
        .collection
        .into_iter()
        .filter(|item| category_allowed(&allowed, &item.category))
        .map(|item| item.into_paper(server))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
      "messages": [{"status": "ok", "interval": "2025-06-01:2025-06-01", "cursor": 0, "count": 3, "total": "3"}],
      "collection": [
        {"doi": "10.1101/2025.06.01.123456", "title": "Pangenome graphs ", "authors": "Williams, B.; Johnson, A.;",
         "author_corresponding": "Bob Williams", "date": "2025-06-01", "version": "1", "type": "new results",
         "category": "Genomics", "abstract": " Graphs. ", "server": "bioRxiv"},
        {"doi": "10.1101/2025.06.01.654321", "title": "Neurons", "authors": "Doe, J.",
         "date": "2025-06-01", "category": "neuroscience", "abstract": "Spikes."},
        {"doi": "10.1101/2025.06.01.000001", "title": "No category", "authors": "",
         "date": "2025-06-01", "category": "", "abstract": ""}
      ]
    }"#;

    #[test]
    fn parses_records() {
        let papers = parse_details_page(PAGE, Source::Biorxiv, &[]).unwrap();
        assert_eq!(papers.len(), 3);

        let p = &papers[0];
        assert_eq!(p.id, "10.1101_2025.06.01.123456");
        assert_eq!(p.doi.as_deref(), Some("10.1101/2025.06.01.123456"));
        assert_eq!(p.title, "Pangenome graphs");
        assert_eq!(p.authors, vec!["Williams, B.", "Johnson, A."]);
        assert_eq!(p.abstract_text, "Graphs.");
        assert_eq!(p.journal, "biorxiv (Genomics)");
        assert_eq!(p.source, Source::Biorxiv);

        assert!(papers[2].authors.is_empty());
        assert_eq!(papers[2].journal, "biorxiv");
    }

    #[test]
    fn category_filter_ignores_case() {
        let papers =
            parse_details_page(PAGE, Source::Biorxiv, &["genomics".to_string()]).unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Pangenome graphs");
    }

    #[test]
    fn total_accepts_string_or_number() {
        let page: DetailsPage = serde_json::from_str(PAGE).unwrap();
        assert_eq!(page.total(), Some(3));

        let page: DetailsPage =
            serde_json::from_str(r#"{"messages": [{"total": 250}], "collection": []}"#).unwrap();
        assert_eq!(page.total(), Some(250));

        let page: DetailsPage =
            serde_json::from_str(r#"{"messages": [{"status": "no posts found"}]}"#).unwrap();
        assert_eq!(page.total(), None);
    }

    #[test]
    fn pubmed_is_not_a_preprint_server() {
        assert!(BioRxivFetcher::new(Source::Pubmed, &[]).is_err());
    }

    #[test]
    fn name_lists_categories() {
        let fetcher =
            BioRxivFetcher::new(Source::Medrxiv, &["Epidemiology".to_string()]).unwrap();
        assert_eq!(fetcher.name(), "medrxiv (epidemiology)");
        assert!(fetcher.accepts_category("EPIDEMIOLOGY"));
        assert!(!fetcher.accepts_category("genetics"));
    }
}
