//! Per-page indexing pipeline
//!
//! Each discovered page runs through one `PageIndexer` task: fetch, record
//! the page row, lemmatize title and body separately, bump per-site lemma
//! frequencies and write the rank postings.

use crate::error::Result;
use crate::fetch::Fetcher;
use crate::lemma::Lemmatizer;
use crate::parse::parse_page;
use crate::store::{Site, SiteStatus, Store};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Indexes one page at a time against the shared store
#[derive(Clone)]
pub struct PageIndexer {
    store: Store,
    fetcher: Arc<dyn Fetcher>,
    lemmatizer: Lemmatizer,
}

impl PageIndexer {
    pub fn new(store: Store, fetcher: Arc<dyn Fetcher>, lemmatizer: Lemmatizer) -> Self {
        Self {
            store,
            fetcher,
            lemmatizer,
        }
    }

    /// Index a single page of `site`. Fetch failures are recorded on the
    /// site and contained; they never abort sibling work.
    pub async fn index_page(&self, site: &Site, path: &str) -> Result<()> {
        if self.store.site_status(site.id).await? == SiteStatus::Failed {
            debug!("Site {} is cancelled, skipping {}", site.url, path);
            return Ok(());
        }

        let url = format!("{}{}", site.url, path);
        let fetched = match self.fetcher.fetch(&url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                self.store.set_last_error(site.id, &e.to_string()).await?;
                return Ok(());
            }
        };

        // Another task may have indexed this path concurrently; the first
        // insert wins and does the lemma work exactly once.
        let Some(page) = self
            .store
            .insert_page_if_absent(site.id, path, fetched.code as i64, &fetched.body)
            .await?
        else {
            debug!("Page already indexed: {}{}", site.url, path);
            return Ok(());
        };

        self.store.touch_site(site.id).await?;

        if !(200..300).contains(&fetched.code) {
            debug!("Skipping lemmas for {} (HTTP {})", url, fetched.code);
            return Ok(());
        }

        let parsed = parse_page(&fetched.body);
        let title_lemmas = self.lemmatizer.lemmas_of(&parsed.title);
        let body_lemmas = self.lemmatizer.lemmas_of(&parsed.body_text);

        let title_weight = self.store.get_field_weight("title").await?;
        let body_weight = self.store.get_field_weight("body").await?;

        let lemmas: BTreeSet<&str> = title_lemmas
            .keys()
            .chain(body_lemmas.keys())
            .map(String::as_str)
            .collect();

        for lemma_text in lemmas {
            let lemma = self.store.increment_lemma(site.id, lemma_text).await?;
            let rank = title_lemmas.get(lemma_text).copied().unwrap_or(0) as f32 * title_weight
                + body_lemmas.get(lemma_text).copied().unwrap_or(0) as f32 * body_weight;
            self.store.insert_posting(page.id, lemma.id, rank).await?;
        }

        debug!("Indexed {}{}", site.url, path);
        Ok(())
    }
}
