//! Index storage using SQLite
//!
//! This module handles all persistence:
//! - Sites (crawl lifecycle status and heartbeat)
//! - Pages (fetched documents, unique per site and path)
//! - Lemmas (per-site document frequency counters)
//! - Postings (page-lemma rank entries)
//! - Fields (title/body weights)

mod schema;

pub use schema::*;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Crawl lifecycle status of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SiteStatus {
    NotIndexed,
    Indexing,
    Indexed,
    Failed,
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteStatus::NotIndexed => write!(f, "NOT_INDEXED"),
            SiteStatus::Indexing => write!(f, "INDEXING"),
            SiteStatus::Indexed => write!(f, "INDEXED"),
            SiteStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for SiteStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NOT_INDEXED" => Ok(SiteStatus::NotIndexed),
            "INDEXING" => Ok(SiteStatus::Indexing),
            "INDEXED" => Ok(SiteStatus::Indexed),
            "FAILED" => Ok(SiteStatus::Failed),
            _ => Err(Error::Other(format!("Unknown site status: {}", s))),
        }
    }
}

/// A configured site under crawl
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: String,
    pub status_time: String,
    pub last_error: Option<String>,
}

impl Site {
    pub fn get_status(&self) -> Result<SiteStatus> {
        self.status.parse()
    }

    /// Parse the heartbeat timestamp
    pub fn heartbeat(&self) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.status_time)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::Other(format!("bad status_time on site {}: {}", self.url, e)))
    }
}

/// A fetched page
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub site_id: i64,
    pub path: String,
    pub code: i64,
    pub content: String,
}

/// A per-site lemma with its document frequency
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lemma {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    pub frequency: i64,
}

/// A posting: the weighted strength of one lemma on one page
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Posting {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    pub rank: f32,
}

/// Index database handle
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open the database, creating the file and schema when missing
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10))
            .foreign_keys(true);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Initialize the database schema
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Drop all rows from every table; runs when a new crawl begins
    pub async fn reset(&self) -> Result<()> {
        debug!("Clearing site, page, lemma and posting tables");
        // Cascades remove pages, lemmas and postings
        sqlx::query("DELETE FROM sites").execute(&self.pool).await?;
        sqlx::query("DELETE FROM fields").execute(&self.pool).await?;
        Ok(())
    }

    // ===== Site operations =====

    /// Create a site row with status NOT_INDEXED
    pub async fn insert_site(&self, url: &str, name: &str) -> Result<Site> {
        let site = sqlx::query_as::<_, Site>(
            r#"
            INSERT INTO sites (url, name, status, status_time)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(url)
        .bind(name)
        .bind(SiteStatus::NotIndexed.to_string())
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(site)
    }

    pub async fn get_site(&self, id: i64) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    pub async fn get_site_by_url(&self, url: &str) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    pub async fn list_sites(&self) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>("SELECT * FROM sites ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(sites)
    }

    /// Set a site's status, refreshing the heartbeat
    pub async fn set_site_status(&self, id: i64, status: SiteStatus) -> Result<()> {
        sqlx::query("UPDATE sites SET status = ?, status_time = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Refresh a site's heartbeat timestamp
    pub async fn touch_site(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE sites SET status_time = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the most recent error observed for a site
    pub async fn set_last_error(&self, id: i64, error: &str) -> Result<()> {
        sqlx::query("UPDATE sites SET last_error = ? WHERE id = ?")
            .bind(error)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Fresh read of a site's status; cancellation poll for in-flight work
    pub async fn site_status(&self, id: i64) -> Result<SiteStatus> {
        let status: String = sqlx::query_scalar("SELECT status FROM sites WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        status.parse()
    }

    // ===== Page operations =====

    /// Insert a page unless one already exists for (site, path).
    /// Returns None when another writer got there first.
    pub async fn insert_page_if_absent(
        &self,
        site_id: i64,
        path: &str,
        code: i64,
        content: &str,
    ) -> Result<Option<Page>> {
        let page = sqlx::query_as::<_, Page>(
            r#"
            INSERT INTO pages (site_id, path, code, content)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(site_id, path) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(site_id)
        .bind(path)
        .bind(code)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(page)
    }

    pub async fn get_page(&self, site_id: i64, path: &str) -> Result<Option<Page>> {
        let page =
            sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE site_id = ? AND path = ?")
                .bind(site_id)
                .bind(path)
                .fetch_optional(&self.pool)
                .await?;
        Ok(page)
    }

    pub async fn page_exists(&self, site_id: i64, path: &str) -> Result<bool> {
        let row: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM pages WHERE site_id = ? AND path = ?")
                .bind(site_id)
                .bind(path)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Pages of one site, or of all sites when `site_id` is None
    pub async fn list_pages(&self, site_id: Option<i64>) -> Result<Vec<Page>> {
        let pages = match site_id {
            Some(id) => {
                sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE site_id = ? ORDER BY id")
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, Page>("SELECT * FROM pages ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(pages)
    }

    pub async fn count_pages(&self, site_id: Option<i64>) -> Result<i64> {
        let count: i64 = match site_id {
            Some(id) => sqlx::query_scalar("SELECT COUNT(*) FROM pages WHERE site_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
            None => sqlx::query_scalar("SELECT COUNT(*) FROM pages")
                .fetch_one(&self.pool)
                .await?,
        };
        Ok(count)
    }

    /// Delete a page and its postings (used by single-page reindex)
    pub async fn delete_page(&self, page_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(page_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Lemma operations =====

    /// Atomically create a lemma with frequency 1 or increment an existing
    /// one. SQLite serializes writers, so concurrent indexers cannot lose
    /// an increment.
    pub async fn increment_lemma(&self, site_id: i64, lemma: &str) -> Result<Lemma> {
        let lemma = sqlx::query_as::<_, Lemma>(
            r#"
            INSERT INTO lemmas (site_id, lemma, frequency)
            VALUES (?, ?, 1)
            ON CONFLICT(site_id, lemma) DO UPDATE SET frequency = frequency + 1
            RETURNING *
            "#,
        )
        .bind(site_id)
        .bind(lemma)
        .fetch_one(&self.pool)
        .await?;
        Ok(lemma)
    }

    pub async fn get_lemma(&self, site_id: i64, lemma: &str) -> Result<Option<Lemma>> {
        let lemma =
            sqlx::query_as::<_, Lemma>("SELECT * FROM lemmas WHERE site_id = ? AND lemma = ?")
                .bind(site_id)
                .bind(lemma)
                .fetch_optional(&self.pool)
                .await?;
        Ok(lemma)
    }

    pub async fn count_lemmas(&self, site_id: Option<i64>) -> Result<i64> {
        let count: i64 = match site_id {
            Some(id) => sqlx::query_scalar("SELECT COUNT(*) FROM lemmas WHERE site_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
            None => sqlx::query_scalar("SELECT COUNT(*) FROM lemmas")
                .fetch_one(&self.pool)
                .await?,
        };
        Ok(count)
    }

    // ===== Posting operations =====

    /// Record a posting; duplicate (page, lemma) pairs are ignored
    pub async fn insert_posting(&self, page_id: i64, lemma_id: i64, rank: f32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO postings (page_id, lemma_id, rank)
            VALUES (?, ?, ?)
            ON CONFLICT(page_id, lemma_id) DO NOTHING
            "#,
        )
        .bind(page_id)
        .bind(lemma_id)
        .bind(rank)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_posting_rank(&self, page_id: i64, lemma_id: i64) -> Result<Option<f32>> {
        let rank: Option<f32> =
            sqlx::query_scalar("SELECT rank FROM postings WHERE page_id = ? AND lemma_id = ?")
                .bind(page_id)
                .bind(lemma_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(rank)
    }

    /// IDs of all pages that carry a posting for the given lemma
    pub async fn page_ids_with_lemma(&self, lemma_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT page_id FROM postings WHERE lemma_id = ?")
            .bind(lemma_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    // ===== Field operations =====

    /// Upsert a field weight (title/body)
    pub async fn set_field_weight(&self, name: &str, weight: f32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fields (name, weight)
            VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET weight = excluded.weight
            "#,
        )
        .bind(name)
        .bind(weight)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_field_weight(&self, name: &str) -> Result<f32> {
        let weight: Option<f32> = sqlx::query_scalar("SELECT weight FROM fields WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        weight.ok_or_else(|| Error::Other(format!("field weight not seeded: {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_store() -> (Store, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Store::open(&tmp.path().join("test.db")).await.unwrap();
        (store, tmp)
    }

    #[tokio::test]
    async fn test_site_lifecycle() {
        let (store, _tmp) = setup_test_store().await;

        let site = store.insert_site("https://example.ru", "Example").await.unwrap();
        assert_eq!(site.get_status().unwrap(), SiteStatus::NotIndexed);

        store.set_site_status(site.id, SiteStatus::Indexing).await.unwrap();
        assert_eq!(store.site_status(site.id).await.unwrap(), SiteStatus::Indexing);

        store.set_last_error(site.id, "connection refused").await.unwrap();
        let loaded = store.get_site(site.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_error.as_deref(), Some("connection refused"));
        assert!(loaded.heartbeat().is_ok());
    }

    #[tokio::test]
    async fn test_page_insert_is_idempotent() {
        let (store, _tmp) = setup_test_store().await;
        let site = store.insert_site("https://example.ru", "Example").await.unwrap();

        let first = store
            .insert_page_if_absent(site.id, "/", 200, "<html></html>")
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .insert_page_if_absent(site.id, "/", 200, "<html>other</html>")
            .await
            .unwrap();
        assert!(second.is_none());

        assert_eq!(store.count_pages(Some(site.id)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_page_insert_yields_one_row() {
        let (store, _tmp) = setup_test_store().await;
        let site = store.insert_site("https://example.ru", "Example").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let site_id = site.id;
            handles.push(tokio::spawn(async move {
                store
                    .insert_page_if_absent(site_id, "/race", 200, "body")
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.count_pages(Some(site.id)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lemma_increment_is_atomic() {
        let (store, _tmp) = setup_test_store().await;
        let site = store.insert_site("https://example.ru", "Example").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            let site_id = site.id;
            handles.push(tokio::spawn(async move {
                store.increment_lemma(site_id, "кот").await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let lemma = store.get_lemma(site.id, "кот").await.unwrap().unwrap();
        assert_eq!(lemma.frequency, 10);
    }

    #[tokio::test]
    async fn test_postings_and_cascade() {
        let (store, _tmp) = setup_test_store().await;
        let site = store.insert_site("https://example.ru", "Example").await.unwrap();
        let page = store
            .insert_page_if_absent(site.id, "/", 200, "body")
            .await
            .unwrap()
            .unwrap();
        let lemma = store.increment_lemma(site.id, "кот").await.unwrap();

        store.insert_posting(page.id, lemma.id, 4.4).await.unwrap();
        assert_eq!(
            store.get_posting_rank(page.id, lemma.id).await.unwrap(),
            Some(4.4)
        );
        assert_eq!(store.page_ids_with_lemma(lemma.id).await.unwrap(), vec![page.id]);

        // Deleting the page removes its postings
        store.delete_page(page.id).await.unwrap();
        assert_eq!(store.get_posting_rank(page.id, lemma.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let (store, _tmp) = setup_test_store().await;
        let site = store.insert_site("https://example.ru", "Example").await.unwrap();
        store
            .insert_page_if_absent(site.id, "/", 200, "body")
            .await
            .unwrap();
        store.increment_lemma(site.id, "кот").await.unwrap();
        store.set_field_weight("title", 1.0).await.unwrap();

        store.reset().await.unwrap();

        assert!(store.list_sites().await.unwrap().is_empty());
        assert_eq!(store.count_pages(None).await.unwrap(), 0);
        assert_eq!(store.count_lemmas(None).await.unwrap(), 0);
        assert!(store.get_field_weight("title").await.is_err());
    }
}
