//! Query-time ranking and snippets
//!
//! Lemmatizes the query, prunes lemmas too common to discriminate,
//! intersects posting lists rarest-first, scores the surviving pages and
//! builds a highlighted snippet per result.

mod snippet;

pub use snippet::build_snippet;

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::lemma::Lemmatizer;
use crate::parse::parse_page;
use crate::store::{Lemma, Site, SiteStatus, Store};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// One ranked search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub site_url: String,
    pub site_name: String,
    pub path: String,
    pub title: String,
    pub snippet: String,
    pub relevance: f32,
}

/// Search engine over the shared store
#[derive(Clone)]
pub struct SearchEngine {
    store: Store,
    lemmatizer: Lemmatizer,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(store: Store, lemmatizer: Lemmatizer, config: SearchConfig) -> Self {
        Self {
            store,
            lemmatizer,
            config,
        }
    }

    /// Run a query against one site, or against every site when
    /// `site_url` is None. Results are ordered by relevance descending;
    /// `offset`/`limit` window the final list.
    pub async fn search(
        &self,
        query: &str,
        site_url: Option<&str>,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }

        let sites = self.sites_in_scope(site_url).await?;
        for site in &sites {
            if site.get_status()? == SiteStatus::Indexing {
                return Err(Error::IndexingInProgress(site.url.clone()));
            }
        }

        let scope_site_id = if site_url.is_some() {
            sites.first().map(|s| s.id)
        } else {
            None
        };
        let candidate_count = self.store.count_pages(scope_site_id).await?;

        let query_lemma_texts: Vec<String> =
            self.lemmatizer.lemmas_of(query).into_keys().collect();

        let mut hits = Vec::new();
        for site in &sites {
            self.search_site(site, &query_lemma_texts, candidate_count, &mut hits)
                .await?;
        }

        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let limit = limit.unwrap_or(self.config.default_limit);
        Ok(hits.into_iter().skip(offset).take(limit).collect())
    }

    async fn sites_in_scope(&self, site_url: Option<&str>) -> Result<Vec<Site>> {
        match site_url {
            Some(url) => {
                let site = self
                    .store
                    .get_site_by_url(url)
                    .await?
                    .ok_or_else(|| Error::SiteNotFound(url.to_string()))?;
                Ok(vec![site])
            }
            None => Ok(self.store.list_sites().await?),
        }
    }

    async fn search_site(
        &self,
        site: &Site,
        query_lemma_texts: &[String],
        candidate_count: i64,
        hits: &mut Vec<SearchHit>,
    ) -> Result<()> {
        let mut lemmas: Vec<Lemma> = Vec::new();
        for text in query_lemma_texts {
            // Lemmas unknown to this site contribute nothing
            if let Some(lemma) = self.store.get_lemma(site.id, text).await? {
                if self.is_discriminative(&lemma, candidate_count) {
                    lemmas.push(lemma);
                } else {
                    debug!(
                        "Dropping over-frequent lemma {:?} ({} of {} pages)",
                        lemma.lemma, lemma.frequency, candidate_count
                    );
                }
            }
        }

        if lemmas.is_empty() {
            return Ok(());
        }

        // Rarest first: the smallest posting list shrinks the candidate
        // set fastest
        lemmas.sort_by_key(|l| l.frequency);

        let mut page_ids: HashSet<i64> = self
            .store
            .page_ids_with_lemma(lemmas[0].id)
            .await?
            .into_iter()
            .collect();
        for lemma in &lemmas[1..] {
            let with_lemma: HashSet<i64> = self
                .store
                .page_ids_with_lemma(lemma.id)
                .await?
                .into_iter()
                .collect();
            page_ids.retain(|id| with_lemma.contains(id));
            if page_ids.is_empty() {
                return Ok(());
            }
        }

        let lemma_texts: Vec<String> = lemmas.iter().map(|l| l.lemma.clone()).collect();

        for page in self.store.list_pages(Some(site.id)).await? {
            if !page_ids.contains(&page.id) {
                continue;
            }

            let mut relevance = 0.0f32;
            for lemma in &lemmas {
                relevance += self
                    .store
                    .get_posting_rank(page.id, lemma.id)
                    .await?
                    .unwrap_or(0.0);
            }

            let parsed = parse_page(&page.content);
            let snippet = build_snippet(
                &parsed.body_text,
                &lemma_texts,
                self.lemmatizer.morphology().as_ref(),
                self.config.snippet_window,
            );

            hits.push(SearchHit {
                site_url: site.url.clone(),
                site_name: site.name.clone(),
                path: page.path.clone(),
                title: parsed.title,
                snippet,
                relevance,
            });
        }

        Ok(())
    }

    /// A lemma on nearly every page is useless for narrowing results
    fn is_discriminative(&self, lemma: &Lemma, candidate_count: i64) -> bool {
        let threshold =
            candidate_count as f32 * (self.config.max_lemma_frequency_percent / 100.0);
        (lemma.frequency as f32) < threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FakeFetcher;
    use crate::index::PageIndexer;
    use crate::morph::DictionaryMorphology;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn lemmatizer() -> Lemmatizer {
        let morph = DictionaryMorphology::from_entries([
            ("кот", "кот", "С мр"),
            ("кота", "кот", "С мр рд"),
            ("коты", "кот", "С мр мн"),
            ("сидел", "сидеть", "Г"),
            ("окне", "окно", "С ср"),
            ("окно", "окно", "С ср"),
            ("смотрел", "смотреть", "Г"),
            ("улицу", "улица", "С жр"),
            ("и", "и", "СОЮЗ"),
            ("на", "на", "ПРЕДЛ"),
        ]);
        Lemmatizer::new(Arc::new(morph))
    }

    async fn setup() -> (Store, Site, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Store::open(&tmp.path().join("test.db")).await.unwrap();
        let site = store.insert_site("https://example.ru", "Example").await.unwrap();
        store.set_site_status(site.id, SiteStatus::Indexed).await.unwrap();
        store.set_field_weight("title", 1.0).await.unwrap();
        store.set_field_weight("body", 0.8).await.unwrap();
        (store, site, tmp)
    }

    async fn index(store: &Store, site: &Site, path: &str, html: &str) {
        let url = format!("{}{}", site.url, path);
        let fetcher = Arc::new(FakeFetcher::new().with_page(&url, 200, html));
        let indexer = PageIndexer::new(store.clone(), fetcher, lemmatizer());
        indexer.index_page(site, path).await.unwrap();
    }

    fn engine(store: &Store) -> SearchEngine {
        SearchEngine::new(store.clone(), lemmatizer(), SearchConfig::default())
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (store, _site, _tmp) = setup().await;
        let result = engine(&store).search("  ", None, 0, None).await;
        assert!(matches!(result, Err(Error::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_search_refused_while_indexing() {
        let (store, site, _tmp) = setup().await;
        store.set_site_status(site.id, SiteStatus::Indexing).await.unwrap();

        let result = engine(&store)
            .search("кот", Some("https://example.ru"), 0, None)
            .await;
        assert!(matches!(result, Err(Error::IndexingInProgress(_))));

        // Unscoped search is refused too while any site indexes
        let result = engine(&store).search("кот", None, 0, None).await;
        assert!(matches!(result, Err(Error::IndexingInProgress(_))));
    }

    #[tokio::test]
    async fn test_unknown_site_rejected() {
        let (store, _site, _tmp) = setup().await;
        let result = engine(&store)
            .search("кот", Some("https://missing.ru"), 0, None)
            .await;
        assert!(matches!(result, Err(Error::SiteNotFound(_))));
    }

    #[tokio::test]
    async fn test_no_match_returns_empty_list() {
        let (store, site, _tmp) = setup().await;
        index(
            &store,
            &site,
            "/",
            "<html><title>окно</title><body>окно</body></html>",
        )
        .await;

        let hits = engine(&store)
            .search("кот", Some("https://example.ru"), 0, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_relevance_orders_results_descending() {
        let (store, site, _tmp) = setup().await;
        index(
            &store,
            &site,
            "/weak",
            "<html><title>окно</title><body>кот</body></html>",
        )
        .await;
        index(
            &store,
            &site,
            "/strong",
            "<html><title>кот</title><body>кот кота коты</body></html>",
        )
        .await;

        let hits = engine(&store)
            .search("кот", Some("https://example.ru"), 0, None)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].path, "/strong");
        assert!(hits[0].relevance > hits[1].relevance);
        assert_eq!(hits[0].site_name, "Example");
    }

    #[tokio::test]
    async fn test_intersection_requires_every_lemma() {
        let (store, site, _tmp) = setup().await;
        index(
            &store,
            &site,
            "/both",
            "<html><title>кот</title><body>кот сидел на окне</body></html>",
        )
        .await;
        index(
            &store,
            &site,
            "/cat-only",
            "<html><title>кот</title><body>кот</body></html>",
        )
        .await;

        let hits = engine(&store)
            .search("кот окно", Some("https://example.ru"), 0, None)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "/both");
    }

    #[tokio::test]
    async fn test_over_frequent_lemma_is_pruned() {
        let (store, site, _tmp) = setup().await;
        // 100 pages, a lemma on 96 of them: above the 95% cutoff
        for i in 0..100 {
            store
                .insert_page_if_absent(site.id, &format!("/p{}", i), 200, "")
                .await
                .unwrap();
        }
        for _ in 0..96 {
            store.increment_lemma(site.id, "кот").await.unwrap();
        }

        let hits = engine(&store)
            .search("кот", Some("https://example.ru"), 0, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_snippet_emphasizes_query_word() {
        let (store, site, _tmp) = setup().await;
        index(
            &store,
            &site,
            "/",
            "<html><title>Кот</title>\
             <body>Кот сидел на окне и смотрел на улицу</body></html>",
        )
        .await;

        let hits = engine(&store)
            .search("кот", Some("https://example.ru"), 0, None)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits[0].snippet.contains("<b>Кот</b>"), "snippet: {}", hits[0].snippet);
        assert_eq!(hits[0].title, "Кот");
    }

    #[tokio::test]
    async fn test_offset_and_limit_window() {
        let (store, site, _tmp) = setup().await;
        for i in 0..5 {
            let body = vec!["кот"; i + 1].join(" ");
            index(
                &store,
                &site,
                &format!("/p{}", i),
                &format!("<html><title>окно</title><body>{}</body></html>", body),
            )
            .await;
        }

        let all = engine(&store)
            .search("кот", Some("https://example.ru"), 0, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 5);

        let windowed = engine(&store)
            .search("кот", Some("https://example.ru"), 1, Some(2))
            .await
            .unwrap();
        assert_eq!(windowed.len(), 2);
        assert_eq!(windowed[0].path, all[1].path);
        assert_eq!(windowed[1].path, all[2].path);
    }
}
