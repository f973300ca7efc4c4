use anyhow::Result;
use bookpitch::catalog::{cover_url, CoverSize};
use bookpitch::config::{find_config_file, load_config, Config};
use bookpitch::models::BookMetadata;
use bookpitch::{BookResolver, BookStore, Catalog, OpenLibrarySource};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Bookpitch - search the Open Library catalog and resolve selections to
/// canonical book records
#[derive(Parser, Debug)]
#[command(name = "bookpitch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search Open Library and resolve books into the local store", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file path (overrides configuration)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the catalog and print the result list
    Search {
        /// Free-text author/title query
        query: String,
    },

    /// Search the catalog, pick one result and resolve it into the store
    Add {
        /// Free-text author/title query
        query: String,

        /// 1-based index of the result to resolve
        #[arg(long, default_value_t = 1)]
        pick: usize,
    },

    /// Print a stored book by its slug
    Show {
        /// Slug of the book, e.g. "the-lean-startup"
        slug: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("bookpitch={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = if let Some(config_path) = &cli.config {
        load_config(config_path)?
    } else if let Some(config_path) = find_config_file() {
        tracing::info!("Using config file: {}", config_path.display());
        load_config(&config_path)?
    } else {
        Config::default()
    };

    if let Some(db) = cli.db {
        config.store.db_path = db;
    }

    let catalog: Arc<dyn Catalog> =
        Arc::new(OpenLibrarySource::with_base_url(&config.catalog.api_base));

    match cli.command {
        Commands::Search { query } => {
            let entries = catalog.search(&query, &CancellationToken::new()).await?;
            print_entries(&entries);
        }
        Commands::Add { query, pick } => {
            let entries = catalog.search(&query, &CancellationToken::new()).await?;
            if entries.is_empty() {
                println!("No results for \"{}\"", query);
                return Ok(());
            }
            print_entries(&entries);

            let entry = entries
                .get(pick.saturating_sub(1))
                .ok_or_else(|| anyhow::anyhow!("--pick {} is out of range", pick))?;

            let store = BookStore::open(&config.store.db_path).await?;
            let resolver = BookResolver::new(Arc::clone(&catalog), store);

            let metadata = BookMetadata::new(&entry.title, &entry.author, &entry.key)
                .cover_url(cover_url(entry.cover_id, CoverSize::Medium))
                .published_year(entry.first_publish_year);

            match resolver.resolve(metadata).await {
                Ok(book) => {
                    println!();
                    println!("Resolved: {} by {}", book.title, book.author);
                    println!("  id:    {}", book.id);
                    println!("  slug:  {}", book.slug);
                    if let Some(key) = &book.open_library_key {
                        println!("  key:   {}", key);
                    }
                    if let Some(year) = book.published_year {
                        println!("  year:  {}", year);
                    }
                    if let Some(cover) = &book.cover_url {
                        println!("  cover: {}", cover);
                    }
                }
                Err(err) => {
                    eprintln!("Resolution failed: {}", err);
                    std::process::exit(1);
                }
            }
        }
        Commands::Show { slug } => {
            let store = BookStore::open(&config.store.db_path).await?;
            match store.find_by_slug(&slug).await? {
                Some(book) => {
                    println!("{} by {}", book.title, book.author);
                    if let Some(year) = book.published_year {
                        println!("  year:  {}", year);
                    }
                    if let Some(key) = &book.open_library_key {
                        println!("  key:   {}", key);
                    }
                    if let Some(description) = &book.description {
                        println!();
                        println!("{}", description);
                    }
                }
                None => {
                    println!("No book with slug \"{}\"", slug);
                }
            }
        }
    }

    Ok(())
}

fn print_entries(entries: &[bookpitch::CatalogEntry]) {
    if entries.is_empty() {
        println!("No results.");
        return;
    }

    for (index, entry) in entries.iter().enumerate() {
        let year = entry
            .first_publish_year
            .map(|y| format!(" ({})", y))
            .unwrap_or_default();
        println!("{:2}. {} - {}{}", index + 1, entry.title, entry.author, year);
        if let Some(cover) = cover_url(entry.cover_id, CoverSize::Small) {
            println!("      cover: {}", cover);
        }
    }
}
