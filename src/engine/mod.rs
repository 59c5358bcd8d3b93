//! Crawl supervision
//!
//! `CrawlSupervisor` owns the operations the outer API layer consumes:
//! starting and stopping crawls, single-page reindexing, search and
//! statistics. It also runs the completion watcher: a site that has been
//! INDEXING without a heartbeat refresh for the configured idle window is
//! declared INDEXED. There is no explicit join over the fan-out of
//! page-index tasks; the stale-heartbeat heuristic is the completion
//! signal.

use crate::config::Config;
use crate::crawl::SiteCrawler;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::index::PageIndexer;
use crate::lemma::Lemmatizer;
use crate::search::{SearchEngine, SearchHit};
use crate::store::{SiteStatus, Store};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Aggregate index statistics
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total: TotalStatistics,
    pub detailed: Vec<SiteStatistics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalStatistics {
    pub sites: i64,
    pub pages: i64,
    pub lemmas: i64,
    pub is_indexing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteStatistics {
    pub url: String,
    pub name: String,
    pub status: String,
    pub status_time: String,
    pub last_error: Option<String>,
    pub pages: i64,
    pub lemmas: i64,
}

/// Orchestrates one crawler per configured site
pub struct CrawlSupervisor {
    config: Config,
    store: Store,
    fetcher: Arc<dyn Fetcher>,
    lemmatizer: Lemmatizer,
    search: SearchEngine,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CrawlSupervisor {
    pub fn new(
        config: Config,
        store: Store,
        fetcher: Arc<dyn Fetcher>,
        lemmatizer: Lemmatizer,
    ) -> Self {
        let search = SearchEngine::new(store.clone(), lemmatizer.clone(), config.search.clone());
        Self {
            config,
            store,
            fetcher,
            lemmatizer,
            search,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start a full crawl of every configured site. Refused while any
    /// site is already being indexed. Clears all previously indexed data.
    pub async fn start_crawl(&self) -> Result<()> {
        for site in self.store.list_sites().await? {
            if site.get_status()? == SiteStatus::Indexing {
                return Err(Error::AlreadyIndexing);
            }
        }

        self.store.reset().await?;
        self.seed_fields().await?;

        for site_config in &self.config.sites {
            let site = self
                .store
                .insert_site(&site_config.url, &site_config.name)
                .await?;
            self.store
                .set_site_status(site.id, SiteStatus::Indexing)
                .await?;
            let site = self.store.get_site(site.id).await?.ok_or_else(|| {
                Error::Other(format!("site vanished during start: {}", site_config.url))
            })?;

            info!("Starting crawl of {}", site.url);

            let crawler = SiteCrawler::new(
                self.store.clone(),
                self.fetcher.clone(),
                PageIndexer::new(
                    self.store.clone(),
                    self.fetcher.clone(),
                    self.lemmatizer.clone(),
                ),
                site.clone(),
                &self.config.crawl,
            );
            let store = self.store.clone();

            let task = tokio::spawn(async move {
                if let Err(e) = crawler.crawl("/").await {
                    warn!("Crawl of {} failed: {}", site.url, e);
                    let _ = store.set_last_error(site.id, &e.to_string()).await;
                }
                crawler.wait_for_index_tasks().await;
            });
            self.tasks.lock().await.push(task);
        }

        Ok(())
    }

    /// Cancel all crawling: FAILED status is the cooperative stop signal
    /// observed by in-flight crawlers and indexers
    pub async fn stop_crawl(&self) -> Result<()> {
        for site in self.store.list_sites().await? {
            self.store.set_site_status(site.id, SiteStatus::Failed).await?;
            self.store
                .set_last_error(site.id, "Indexing stopped by user")
                .await?;
        }
        info!("Crawl stop requested");
        Ok(())
    }

    /// Re-index a single page. The URL must belong to one of the
    /// configured sites; an existing page row for the path is replaced.
    pub async fn index_single_page(&self, url: &str) -> Result<()> {
        let sites = self.store.list_sites().await?;
        let Some(site) = sites.into_iter().find(|s| url.starts_with(&s.url)) else {
            return Err(Error::PageOutsideSites(url.to_string()));
        };

        let mut path = url[site.url.len()..].to_string();
        if path.is_empty() {
            path = "/".to_string();
        }

        self.seed_fields().await?;

        if let Some(page) = self.store.get_page(site.id, &path).await? {
            self.store.delete_page(page.id).await?;
        }

        let indexer = PageIndexer::new(
            self.store.clone(),
            self.fetcher.clone(),
            self.lemmatizer.clone(),
        );
        let store = self.store.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = indexer.index_page(&site, &path).await {
                warn!("Indexing {}{} failed: {}", site.url, path, e);
                let _ = store.set_last_error(site.id, &e.to_string()).await;
            }
        });
        self.tasks.lock().await.push(task);

        Ok(())
    }

    /// Run a query; see `SearchEngine::search`
    pub async fn search(
        &self,
        query: &str,
        site_url: Option<&str>,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        self.search.search(query, site_url, offset, limit).await
    }

    /// Index totals plus a per-site breakdown
    pub async fn statistics(&self) -> Result<Statistics> {
        let sites = self.store.list_sites().await?;

        let mut detailed = Vec::with_capacity(sites.len());
        let mut is_indexing = false;
        for site in &sites {
            if site.get_status()? == SiteStatus::Indexing {
                is_indexing = true;
            }
            detailed.push(SiteStatistics {
                url: site.url.clone(),
                name: site.name.clone(),
                status: site.status.clone(),
                status_time: site.status_time.clone(),
                last_error: site.last_error.clone(),
                pages: self.store.count_pages(Some(site.id)).await?,
                lemmas: self.store.count_lemmas(Some(site.id)).await?,
            });
        }

        Ok(Statistics {
            total: TotalStatistics {
                sites: sites.len() as i64,
                pages: self.store.count_pages(None).await?,
                lemmas: self.store.count_lemmas(None).await?,
                is_indexing,
            },
            detailed,
        })
    }

    /// One completion pass: INDEXING sites whose heartbeat is older than
    /// the idle window are declared INDEXED
    pub async fn check_completions(&self) -> Result<()> {
        let idle_window =
            chrono::Duration::seconds(self.config.crawl.idle_window_secs as i64);
        completion_pass(&self.store, idle_window).await
    }

    /// Background watcher polling all INDEXING sites at a fixed interval
    pub fn spawn_completion_watcher(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        let poll = Duration::from_secs(self.config.crawl.heartbeat_poll_secs.max(1));
        let idle_window =
            chrono::Duration::seconds(self.config.crawl.idle_window_secs as i64);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll);
            loop {
                ticker.tick().await;
                if let Err(e) = completion_pass(&store, idle_window).await {
                    warn!("Completion check failed: {}", e);
                }
            }
        })
    }

    /// Await every crawl and single-page task dispatched so far
    pub async fn wait_for_tasks(&self) {
        let tasks = {
            let mut guard = self.tasks.lock().await;
            std::mem::take(&mut *guard)
        };
        for task in tasks {
            let _ = task.await;
        }
    }

    /// True while any site is INDEXING
    pub async fn is_indexing(&self) -> Result<bool> {
        for site in self.store.list_sites().await? {
            if site.get_status()? == SiteStatus::Indexing {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn seed_fields(&self) -> Result<()> {
        self.store
            .set_field_weight("title", self.config.weights.title)
            .await?;
        self.store
            .set_field_weight("body", self.config.weights.body)
            .await?;
        Ok(())
    }
}

async fn completion_pass(store: &Store, idle_window: chrono::Duration) -> Result<()> {
    for site in store.list_sites().await? {
        if site.get_status()? != SiteStatus::Indexing {
            continue;
        }
        if Utc::now() - site.heartbeat()? >= idle_window {
            info!("Site {} is idle, declaring INDEXED", site.url);
            store.set_site_status(site.id, SiteStatus::Indexed).await?;
        }
    }
    Ok(())
}
