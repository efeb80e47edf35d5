//! adcopy CLI - webpage to ad copy
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments, wiring the service together and handling top-level errors.

use adcopy::agent::AzureCompletionClient;
use adcopy::{
    fetcher, server, AdCopyRequest, AdCopyService, CacheStore, Config, CopyGenerator, PageLoader,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "adcopy")]
#[command(author, version, about = "Generate ad copy from a webpage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve {
        /// Address to listen on, overrides the config file
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Generate ad copy for one website and print it
    Generate {
        /// Website to advertise
        website: String,
        /// Show the scraped record instead of generating copy
        #[arg(long)]
        raw: bool,
    },
    /// List cached websites
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Commands::Serve { addr: None }) {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or(config.server.addr);
            let service = build_service(&config)?;
            server::start_server(Arc::new(service), addr).await?;
        }
        Commands::Generate { website, raw: true } => {
            let loader = build_loader(&config)?;
            let page = loader.prepare(&website).await?;
            let record = &page.record;

            println!("=== {} ===\n", record.title);
            println!("Website: {}", record.website);
            println!("Description: {}", record.meta_description);
            println!("Source: {}", if page.from_cache { "cache" } else { "scrape" });
            println!("\nKeywords:");
            for (token, count) in record.keywords.iter().flatten() {
                println!("  {:>4}  {}", count, token);
            }
        }
        Commands::Generate { website, raw: false } => {
            let service = build_service(&config)?;
            let request = AdCopyRequest {
                website,
                brief: None,
            };
            println!("{}", service.generate(&request).await?);
        }
        Commands::List => {
            let cache = CacheStore::open(&config.cache.path);
            let records = cache
                .list()
                .with_context(|| format!("reading cache {}", config.cache.path.display()))?;

            if records.is_empty() {
                println!("No cached websites found.");
            } else {
                println!("Cached websites ({}):\n", records.len());
                for record in records {
                    match record.cached_at {
                        Some(at) => println!("📄 {} ({})", record.title, at.format("%Y-%m-%d %H:%M")),
                        None => println!("📄 {}", record.title),
                    }
                    println!("   {}", record.website);
                    if !record.meta_description.is_empty() {
                        println!("   {}", record.meta_description);
                    }
                    println!();
                }
            }
        }
    }

    Ok(())
}

/// Validate configuration and assemble the service
fn build_service(config: &Config) -> anyhow::Result<AdCopyService> {
    config.validate().context("invalid configuration")?;

    let fetcher = fetcher::from_config(&config.fetch).context("building HTTP client")?;
    let client = AzureCompletionClient::new(&config.generation)?;
    let cache = CacheStore::open(&config.cache.path);
    tracing::info!("Using cache file {}", config.cache.path.display());

    Ok(AdCopyService::new(
        fetcher,
        cache,
        CopyGenerator::new(Arc::new(client)),
    ))
}

/// Scrape-only wiring for `generate --raw`; needs no completion credentials
fn build_loader(config: &Config) -> anyhow::Result<PageLoader> {
    config.validate_fetch().context("invalid configuration")?;

    let fetcher = fetcher::from_config(&config.fetch).context("building HTTP client")?;
    Ok(PageLoader::new(fetcher, CacheStore::open(&config.cache.path)))
}
