//! Page fetching
//!
//! `Fetcher` is the seam between the engine and the network: the crawler
//! and indexer only see status code and body. `HttpFetcher` is the real
//! implementation; tests substitute an in-memory fake.

use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// A fetched page: HTTP status plus raw body
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub code: u16,
    pub body: String,
}

/// Transport capability used by the crawler and the page indexer
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL. Transport failures (connect/timeout) are errors;
    /// non-success HTTP statuses are returned as data.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// reqwest-backed fetcher with the configured user agent and referrer
pub struct HttpFetcher {
    client: Client,
    referrer: String,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Fetch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            referrer: config.referrer.clone(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::REFERER, &self.referrer)
            .send()
            .await?;

        let code = response.status().as_u16();
        let body = response.text().await?;

        Ok(FetchedPage { code, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fetcher for tests

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned pages by full URL; URLs registered as failing return
    /// a transport error, unknown URLs a 404
    pub struct FakeFetcher {
        pages: HashMap<String, (u16, String)>,
        failing: Vec<String>,
        hits: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self {
                pages: HashMap::new(),
                failing: Vec::new(),
                hits: Mutex::new(Vec::new()),
            }
        }

        pub fn with_page(mut self, url: &str, code: u16, body: &str) -> Self {
            self.pages.insert(url.to_string(), (code, body.to_string()));
            self
        }

        pub fn with_failure(mut self, url: &str) -> Self {
            self.failing.push(url.to_string());
            self
        }

        /// URLs fetched so far, in order
        pub fn hits(&self) -> Vec<String> {
            self.hits.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            self.hits.lock().unwrap().push(url.to_string());

            if self.failing.iter().any(|u| u == url) {
                return Err(Error::Fetch(format!("connection refused: {}", url)));
            }

            match self.pages.get(url) {
                Some((code, body)) => Ok(FetchedPage {
                    code: *code,
                    body: body.clone(),
                }),
                None => Ok(FetchedPage {
                    code: 404,
                    body: String::new(),
                }),
            }
        }
    }
}
