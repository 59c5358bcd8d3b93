//! sitesearch CLI entry point

use clap::{Parser, Subcommand};
use sitesearch::{
    config::Config,
    engine::{CrawlSupervisor, Statistics},
    error::Result,
    fetch::HttpFetcher,
    lemma::Lemmatizer,
    morph::DictionaryMorphology,
    search::SearchHit,
    store::Store,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sitesearch")]
#[command(version, about = "Site crawler and Russian full-text search engine", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "sitesearch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl and index every configured site, then wait for completion
    Crawl,

    /// Stop a running crawl (marks every site FAILED)
    Stop,

    /// Re-index a single page of a configured site
    IndexPage {
        /// Full page URL
        url: String,
    },

    /// Search the index
    Search {
        /// The search query
        query: String,

        /// Restrict to one site by root URL
        #[arg(short, long)]
        site: Option<String>,

        /// Skip this many results
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show index statistics and per-site status
    Status,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::load(&cli.config)?;

    // A missing dictionary is fatal: nothing can be lemmatized without it
    let morph = Arc::new(DictionaryMorphology::load(&config.dictionary_file)?);
    let lemmatizer = Lemmatizer::new(morph);

    let store = Store::open(&config.db_file).await?;
    let fetcher = Arc::new(HttpFetcher::new(&config.crawl)?);
    let supervisor = Arc::new(CrawlSupervisor::new(config, store, fetcher, lemmatizer));

    match cli.command {
        Commands::Crawl => {
            supervisor.start_crawl().await?;
            let watcher = supervisor.spawn_completion_watcher();

            // The watcher flips idle sites to INDEXED; wait for all of
            // them to settle
            while supervisor.is_indexing().await? {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            watcher.abort();
            supervisor.wait_for_tasks().await;

            let stats = supervisor.statistics().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("✓ Crawl finished");
                print_statistics(&stats);
            }
        }

        Commands::Stop => {
            supervisor.stop_crawl().await?;
            println!("✓ Stop requested; in-flight tasks will unwind shortly");
        }

        Commands::IndexPage { url } => {
            supervisor.index_single_page(&url).await?;
            supervisor.wait_for_tasks().await;
            println!("✓ Indexed {}", url);
        }

        Commands::Search {
            query,
            site,
            offset,
            limit,
        } => {
            let hits = supervisor
                .search(&query, site.as_deref(), offset, limit)
                .await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No pages found for this query");
            } else {
                print_search_hits(&hits);
            }
        }

        Commands::Status => {
            let stats = supervisor.statistics().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_statistics(&stats);
            }
        }
    }

    Ok(())
}

fn print_search_hits(hits: &[SearchHit]) {
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.3}] {}{}", i + 1, hit.relevance, hit.site_url, hit.path);
        if !hit.title.is_empty() {
            println!("   {}", hit.title);
        }
        if !hit.snippet.is_empty() {
            println!("   {}", hit.snippet);
        }
    }
}

fn print_statistics(stats: &Statistics) {
    println!(
        "Sites: {}  Pages: {}  Lemmas: {}  Indexing: {}",
        stats.total.sites, stats.total.pages, stats.total.lemmas, stats.total.is_indexing
    );
    for site in &stats.detailed {
        println!(
            "  {} ({}): {} — {} pages, {} lemmas{}",
            site.url,
            site.name,
            site.status,
            site.pages,
            site.lemmas,
            site.last_error
                .as_ref()
                .map(|e| format!(", last error: {}", e))
                .unwrap_or_default()
        );
    }
}
