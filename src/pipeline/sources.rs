// Source wiring: turn the journals section of the config into fetchers.

use anyhow::Result;
use tracing::warn;

use crate::config::Config;
use crate::fetch::biorxiv::BioRxivFetcher;
use crate::fetch::pubmed::PubMedFetcher;
use crate::fetch::PaperSource;

/// One PubMed fetcher (if any journals are listed) plus one fetcher per
/// known preprint server. Unknown server names are warned about and
/// skipped.
pub fn build_sources(config: &Config) -> Result<Vec<Box<dyn PaperSource>>> {
    let mut sources: Vec<Box<dyn PaperSource>> = Vec::new();

    if !config.journals.pubmed.is_empty() {
        sources.push(Box::new(PubMedFetcher::new(
            config.journals.pubmed.clone(),
            config.pubmed_api_key.clone(),
        )?));
    }

    let (servers, unknown) = config.journals.preprint_servers();
    for name in unknown {
        warn!(server = %name, "Unknown preprint server in config, skipping");
    }
    for server in servers {
        sources.push(Box::new(BioRxivFetcher::new(
            server,
            config.journals.categories_for(server),
        )?));
    }

    Ok(sources)
}
