//! Default values for configuration

/// Default user agent sent with every fetch
pub fn default_user_agent() -> String {
    format!("sitesearch/{} (Site Indexer)", env!("CARGO_PKG_VERSION"))
}

/// Default referrer header
pub fn default_referrer() -> String {
    "https://www.google.com".to_string()
}

/// Default inter-request politeness delay in milliseconds
pub fn default_request_delay_ms() -> u64 {
    500
}

/// Default fetch timeout in seconds
pub fn default_fetch_timeout_secs() -> u64 {
    15
}

/// Default cap on concurrent page-index tasks per site
pub fn default_max_concurrent_pages() -> usize {
    8
}

/// Default heartbeat poll interval in seconds
pub fn default_heartbeat_poll_secs() -> u64 {
    30
}

/// Default idle window after which an INDEXING site is declared INDEXED
pub fn default_idle_window_secs() -> u64 {
    300
}

/// Default weight for lemmas found in the page title
pub fn default_title_weight() -> f32 {
    1.0
}

/// Default weight for lemmas found in the page body
pub fn default_body_weight() -> f32 {
    0.8
}

/// Lemmas present on more than this fraction of pages are dropped from
/// queries as non-discriminative
pub fn default_max_lemma_frequency_percent() -> f32 {
    95.0
}

/// Default number of search results per request
pub fn default_search_limit() -> usize {
    20
}

/// Default tokens of context on each side of the snippet anchor word
pub fn default_snippet_window() -> usize {
    15
}

/// Default database file
pub fn default_db_file() -> std::path::PathBuf {
    std::path::PathBuf::from("sitesearch.db")
}
