//! sitesearch: a site-scoped Russian full-text search engine
//!
//! Crawls configured sites, lemmatizes page titles and bodies into a
//! weighted inverted index stored in SQLite, and answers free-text queries
//! with ranked, snippet-highlighted results.

pub mod config;
pub mod crawl;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod index;
pub mod lemma;
pub mod morph;
pub mod parse;
pub mod search;
pub mod store;
