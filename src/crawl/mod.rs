//! Site crawling
//!
//! One `SiteCrawler` per site walks same-site links depth-first starting
//! from the root path. Every newly discovered path is handed to a
//! fire-and-forget `PageIndexer` task so link discovery is never blocked by
//! page processing; a semaphore caps how many of those run at once.
//! Cancellation is cooperative: the site status is re-read before every
//! step and a FAILED site unwinds the whole traversal.

use crate::config::CrawlConfig;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::index::PageIndexer;
use crate::parse::parse_page;
use crate::store::{Site, SiteStatus, Store};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Crawler state for one site
pub struct SiteCrawler {
    store: Store,
    fetcher: Arc<dyn Fetcher>,
    indexer: PageIndexer,
    site: Site,
    request_delay: Duration,
    permits: Arc<Semaphore>,
    // Guards the DFS against link cycles; authoritative dedupe is the store
    scheduled: Mutex<HashSet<String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SiteCrawler {
    pub fn new(
        store: Store,
        fetcher: Arc<dyn Fetcher>,
        indexer: PageIndexer,
        site: Site,
        config: &CrawlConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            indexer,
            site,
            request_delay: Duration::from_millis(config.request_delay_ms),
            permits: Arc::new(Semaphore::new(config.max_concurrent_pages)),
            scheduled: Mutex::new(HashSet::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Walk the site depth-first from `start_path`, dispatching an indexing
    /// task for every page seen for the first time
    pub async fn crawl(&self, start_path: &str) -> Result<()> {
        info!("Crawling {} from {}", self.site.url, start_path);
        self.crawl_branch(start_path.to_string()).await
    }

    /// Await all page-index tasks dispatched so far. Completion of the
    /// crawl as a whole is still declared by the heartbeat watcher.
    pub async fn wait_for_index_tasks(&self) {
        let tasks = {
            let mut guard = self.tasks.lock().await;
            std::mem::take(&mut *guard)
        };
        for task in tasks {
            let _ = task.await;
        }
    }

    fn crawl_branch(&self, path: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.store.site_status(self.site.id).await? == SiteStatus::Failed {
                debug!("Crawl of {} cancelled, dropping branch {}", self.site.url, path);
                return Ok(());
            }

            // Politeness delay bounds the request rate to the host
            tokio::time::sleep(self.request_delay).await;

            {
                let mut scheduled = self.scheduled.lock().await;
                if !scheduled.insert(path.clone()) {
                    return Ok(());
                }
            }
            if self.store.page_exists(self.site.id, &path).await? {
                return Ok(());
            }

            self.dispatch_index(path.clone()).await;

            // Fetch again for link discovery only; an unreachable page ends
            // this branch but siblings keep crawling
            let url = format!("{}{}", self.site.url, path);
            let fetched = match self.fetcher.fetch(&url).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    warn!("Failed to fetch {}: {}", url, e);
                    self.store.set_last_error(self.site.id, &e.to_string()).await?;
                    return Ok(());
                }
            };

            for link in parse_page(&fetched.body).links {
                self.crawl_branch(link).await?;
            }

            Ok(())
        })
    }

    /// Fire-and-forget page indexing, bounded by the semaphore
    async fn dispatch_index(&self, path: String) {
        let indexer = self.indexer.clone();
        let store = self.store.clone();
        let site = self.site.clone();
        let permits = self.permits.clone();

        let task = tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            if let Err(e) = indexer.index_page(&site, &path).await {
                warn!("Indexing {}{} failed: {}", site.url, path, e);
                let _ = store.set_last_error(site.id, &e.to_string()).await;
            }
        });

        self.tasks.lock().await.push(task);
    }
}
