// PubMed fetcher over NCBI E-utilities.
//
//   esearch.fcgi (JSON) -> PMIDs for the configured journals and date window
//   efetch.fcgi  (XML)  -> article records, 200 PMIDs per request
//
// The efetch XML is walked with quick-xml, tracking the element path so
// that e.g. DOIs of cited references (PubmedData/ReferenceList) are not
// mistaken for the article's own DOI.

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use tracing::{debug, warn};

use super::rate_limiter::RateLimiter;
use super::{DateWindow, PaperSource};
use crate::papers::{Paper, Source};

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

/// Maximum PMIDs returned by one search.
pub const DEFAULT_MAX_RESULTS: usize = 500;

/// PMIDs per efetch request (keeps URLs well under NCBI's limits).
const EFETCH_BATCH_SIZE: usize = 200;

/// Fetches recent papers from a list of PubMed journals.
pub struct PubMedFetcher {
    client: reqwest::Client,
    api_key: Option<String>,
    journals: Vec<String>,
    max_results: usize,
    limiter: RateLimiter,
}

impl PubMedFetcher {
    pub fn new(journals: Vec<String>, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("paperwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let limiter = RateLimiter::for_ncbi(api_key.is_some());
        Ok(Self {
            client,
            api_key,
            journals,
            max_results: DEFAULT_MAX_RESULTS,
            limiter,
        })
    }

    /// Common query parameters, including the API key when configured.
    fn params(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut params = vec![("db", "pubmed".to_string())];
        params.extend_from_slice(extra);
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    async fn get_text(&self, url: &str, params: &[(&'static str, String)]) -> Result<String> {
        self.limiter.acquire().await;

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{url} returned {status}: {body}");
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read response from {url}"))
    }

    /// Search for PMIDs published in the window.
    pub async fn search(&self, window: &DateWindow) -> Result<Vec<String>> {
        let query = build_search_query(&self.journals, window);
        debug!(query = %query, "PubMed esearch");

        let params = self.params(&[
            ("term", query),
            ("retmax", self.max_results.to_string()),
            ("retmode", "json".to_string()),
            ("sort", "pub_date".to_string()),
        ]);
        let body = self.get_text(ESEARCH_URL, &params).await?;
        let parsed: ESearchResponse =
            serde_json::from_str(&body).context("Failed to parse esearch response")?;

        Ok(parsed.esearchresult.idlist)
    }

    /// Fetch and parse article records for the given PMIDs.
    pub async fn fetch_details(&self, pmids: &[String]) -> Result<Vec<Paper>> {
        let mut papers = Vec::with_capacity(pmids.len());

        for batch in pmids.chunks(EFETCH_BATCH_SIZE) {
            let params = self.params(&[("id", batch.join(",")), ("retmode", "xml".to_string())]);
            let xml = self.get_text(EFETCH_URL, &params).await?;
            let parsed = parse_pubmed_xml(&xml)?;
            debug!(requested = batch.len(), parsed = parsed.len(), "PubMed efetch batch");
            papers.extend(parsed);
        }

        Ok(papers)
    }
}

#[async_trait]
impl PaperSource for PubMedFetcher {
    fn name(&self) -> String {
        format!("PubMed ({} journals)", self.journals.len())
    }

    async fn fetch(&self, window: &DateWindow) -> Result<Vec<Paper>> {
        if self.journals.is_empty() {
            return Ok(Vec::new());
        }

        let pmids = self.search(window).await?;
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_details(&pmids).await
    }
}

/// `("Nature"[Journal] OR "Science"[Journal]) AND ("2025/06/01"[Date - Publication] : "2025/06/07"[Date - Publication])`
pub fn build_search_query(journals: &[String], window: &DateWindow) -> String {
    let journal_filter = journals
        .iter()
        .map(|j| format!("\"{j}\"[Journal]"))
        .collect::<Vec<_>>()
        .join(" OR ");

    format!(
        "({journal_filter}) AND (\"{}\"[Date - Publication] : \"{}\"[Date - Publication])",
        window.start.format("%Y/%m/%d"),
        window.end.format("%Y/%m/%d"),
    )
}

#[derive(Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// Per-article state while walking a <PubmedArticle>.
#[derive(Default)]
struct ArticleBuilder {
    pmid: Option<String>,
    title: String,
    /// (label, text) for each <AbstractText>
    abstract_parts: Vec<(Option<String>, String)>,
    authors: Vec<String>,
    fore_name: String,
    last_name: String,
    collective_name: String,
    journal: String,
    year: String,
    month: String,
    day: String,
    medline_date: String,
    doi: Option<String>,
    elocation_doi: Option<String>,
    /// Set while inside an <ArticleId IdType="doi"> or <ELocationID EIdType="doi">
    reading_doi: bool,
    doi_text: String,
}

impl ArticleBuilder {
    fn finish_author(&mut self) {
        let fore = squash(&self.fore_name);
        let last = squash(&self.last_name);
        let collective = squash(&self.collective_name);

        let name = match (fore.is_empty(), last.is_empty()) {
            (false, false) => format!("{fore} {last}"),
            (true, false) => last,
            _ => collective,
        };
        if !name.is_empty() {
            self.authors.push(name);
        }

        self.fore_name.clear();
        self.last_name.clear();
        self.collective_name.clear();
    }

    fn build(self) -> Option<Paper> {
        let id = squash(self.pmid.as_deref().unwrap_or_default());
        if id.is_empty() {
            return None;
        }

        let abstract_text = self
            .abstract_parts
            .iter()
            .map(|(label, text)| {
                let text = squash(text);
                match label {
                    Some(l) if !l.is_empty() => format!("{l}: {text}"),
                    _ => text,
                }
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let date_parts: Vec<String> = [&self.year, &self.month, &self.day]
            .iter()
            .map(|s| squash(s))
            .filter(|s| !s.is_empty())
            .collect();
        let publication_date = if date_parts.is_empty() {
            squash(&self.medline_date)
        } else {
            date_parts.join(" ")
        };

        Some(Paper {
            id,
            title: squash(&self.title),
            authors: self.authors,
            abstract_text,
            journal: squash(&self.journal),
            publication_date,
            doi: self.doi.or(self.elocation_doi).filter(|d| !d.is_empty()),
            source: Source::Pubmed,
        })
    }
}

/// Collapse runs of whitespace (inline markup leaves ragged spacing).
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn inside(stack: &[String], element: &str) -> bool {
    stack.iter().any(|s| s == element)
}

fn ends_with(stack: &[String], tail: &[&str]) -> bool {
    stack.len() >= tail.len()
        && stack[stack.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(a, b)| a == b)
}

/// Parse an efetch `<PubmedArticleSet>` document. Articles without a PMID
/// are skipped.
pub fn parse_pubmed_xml(xml: &str) -> Result<Vec<Paper>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<ArticleBuilder> = None;
    let mut papers = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("Malformed PubMed XML at byte {}", reader.buffer_position()))?;

        match event {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

                if name == "PubmedArticle" {
                    current = Some(ArticleBuilder::default());
                } else if let Some(article) = current.as_mut() {
                    match name.as_str() {
                        "AbstractText" if inside(&stack, "Abstract") => {
                            article
                                .abstract_parts
                                .push((attribute(e, "Label"), String::new()));
                        }
                        "ArticleId"
                            if ends_with(&stack, &["PubmedData", "ArticleIdList"])
                                && attribute(e, "IdType").as_deref() == Some("doi") =>
                        {
                            article.reading_doi = true;
                            article.doi_text.clear();
                        }
                        "ELocationID"
                            if ends_with(&stack, &["Article"])
                                && attribute(e, "EIdType").as_deref() == Some("doi") =>
                        {
                            article.reading_doi = true;
                            article.doi_text.clear();
                        }
                        _ => {}
                    }
                }

                stack.push(name);
            }

            Event::Text(ref e) => {
                if let Some(article) = current.as_mut() {
                    let text = e.unescape().context("Invalid text in PubMed XML")?;
                    append_text(article, &stack, &text);
                }
            }

            Event::CData(ref e) => {
                if let Some(article) = current.as_mut() {
                    let text = String::from_utf8_lossy(e).into_owned();
                    append_text(article, &stack, &text);
                }
            }

            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.pop();

                if let Some(article) = current.as_mut() {
                    match name.as_str() {
                        "Author" if ends_with(&stack, &["AuthorList"]) => article.finish_author(),
                        "ArticleId" | "ELocationID" if article.reading_doi => {
                            article.reading_doi = false;
                            let doi = squash(&article.doi_text);
                            if name == "ArticleId" {
                                article.doi.get_or_insert(doi);
                            } else {
                                article.elocation_doi.get_or_insert(doi);
                            }
                        }
                        "PubmedArticle" => {
                            if let Some(article) = current.take() {
                                match article.build() {
                                    Some(paper) => papers.push(paper),
                                    None => warn!("Skipping PubMed article without PMID"),
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }

            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    Ok(papers)
}

/// Route a text node to the field its element path belongs to.
fn append_text(article: &mut ArticleBuilder, stack: &[String], text: &str) {
    if article.reading_doi {
        article.doi_text.push_str(text);
    } else if ends_with(stack, &["MedlineCitation", "PMID"]) {
        if article.pmid.is_none() {
            article.pmid = Some(text.to_string());
        }
    } else if inside(stack, "ArticleTitle") {
        article.title.push_str(text);
    } else if inside(stack, "AbstractText") && inside(stack, "Abstract") {
        if let Some((_, part)) = article.abstract_parts.last_mut() {
            part.push_str(text);
        }
    } else if inside(stack, "AuthorList") && inside(stack, "Author") {
        if ends_with(stack, &["ForeName"]) {
            article.fore_name.push_str(text);
        } else if ends_with(stack, &["LastName"]) {
            article.last_name.push_str(text);
        } else if ends_with(stack, &["CollectiveName"]) {
            article.collective_name.push_str(text);
        }
    } else if ends_with(stack, &["Journal", "Title"]) {
        article.journal.push_str(text);
    } else if inside(stack, "PubDate") && inside(stack, "JournalIssue") {
        match stack.last().map(String::as_str) {
            Some("Year") => article.year.push_str(text),
            Some("Month") => article.month.push_str(text),
            Some("Day") => article.day.push_str(text),
            Some("MedlineDate") => article.medline_date.push_str(text),
            _ => {}
        }
    }
}
