// Paper records: the unit of work flowing through the pipeline.
//
// Papers are produced by the fetchers and never mutated afterwards. Every
// later stage (filter verdicts, summaries, the notification ledger) refers
// back to a paper by its stable `id`.

use serde::{Deserialize, Serialize};

/// Where a paper was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Pubmed,
    Biorxiv,
    Medrxiv,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Pubmed => "pubmed",
            Source::Biorxiv => "biorxiv",
            Source::Medrxiv => "medrxiv",
        }
    }

    /// Parse a preprint server name from config ("bioRxiv", "medrxiv", ...).
    /// PubMed is not a preprint server and is never returned here.
    pub fn preprint_server(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "biorxiv" => Some(Source::Biorxiv),
            "medrxiv" => Some(Source::Medrxiv),
            _ => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A research paper as fetched from PubMed or a preprint server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Stable identifier: the PMID for PubMed, the DOI with `/` replaced
    /// by `_` for preprints. Used as the notification ledger key.
    pub id: String,
    pub title: String,
    /// Display-form author names, in source order.
    pub authors: Vec<String>,
    pub abstract_text: String,
    pub journal: String,
    pub publication_date: String,
    pub doi: Option<String>,
    pub source: Source,
}

impl Paper {
    /// Link to the paper: the DOI resolver when a DOI is known, otherwise
    /// the PubMed landing page.
    pub fn url(&self) -> String {
        match &self.doi {
            Some(doi) if !doi.is_empty() => format!("https://doi.org/{doi}"),
            _ => format!("https://pubmed.ncbi.nlm.nih.gov/{}/", self.id),
        }
    }

    /// The text embedded for topic matching: title followed by abstract.
    pub fn searchable_text(&self) -> String {
        let title = self.title.trim();
        let abstract_text = self.abstract_text.trim();
        if abstract_text.is_empty() {
            title.to_string()
        } else {
            format!("{title} {abstract_text}")
        }
    }
}

/// Anything that can be keyed in the notification ledger.
pub trait HasPaperId {
    fn paper_id(&self) -> &str;
}

impl HasPaperId for Paper {
    fn paper_id(&self) -> &str {
        &self.id
    }
}

impl<T: HasPaperId + ?Sized> HasPaperId for &T {
    fn paper_id(&self) -> &str {
        (**self).paper_id()
    }
}
