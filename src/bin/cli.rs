//! `truthlens` command-line front end.
//!
//! Runs knowledge searches, claim verification and document lookups
//! against the built-in providers. Results go to stdout (plain text or
//! JSON with `--json`); all tracing output goes to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use truthlens::{AppConfig, build_manager, init_logging};
use truthlens_knowledge::{
    ClaimVerificationResult, KnowledgeManager, KnowledgeProviderResult, SearchOptions,
};

#[derive(Debug, Parser)]
#[command(name = "truthlens", version, about = "Knowledge search and claim verification")]
struct Cli {
    /// Config file (defaults to ~/.config/truthlens/config.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search every enabled provider and print the merged results.
    Search {
        /// Search query.
        query: String,
        /// Maximum number of documents.
        #[arg(long)]
        limit: Option<usize>,
        /// ISO 639 language code.
        #[arg(long)]
        language: Option<String>,
        /// Drop documents whose provider reliability is below this.
        #[arg(long)]
        min_reliability: Option<f64>,
        /// Bypass the result cache.
        #[arg(long)]
        refresh: bool,
    },
    /// Verify one or more factual claims.
    Verify {
        /// Claims to verify.
        #[arg(required = true)]
        claims: Vec<String>,
    },
    /// Fetch one document by id.
    Document {
        /// Provider-scoped document id.
        id: String,
        /// Provider to ask first.
        #[arg(long)]
        provider: Option<String>,
    },
    /// Show provider and cache statistics.
    Stats,
    /// Write the default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::InitConfig { force } = &cli.command {
        init_logging(None);
        return write_default_config(cli.config.clone(), *force);
    }

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_logging(config.log_filter.as_deref());
    let manager = build_manager(&config)?;

    let outcome = run(&manager, cli.command, cli.json).await;
    manager.flush_cache();
    outcome
}

async fn run(manager: &KnowledgeManager, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Search {
            query,
            limit,
            language,
            min_reliability,
            refresh,
        } => {
            let options = SearchOptions {
                limit,
                language,
                min_reliability,
                ..Default::default()
            };
            let result = manager.search_with(&query, &options, refresh).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_search(&result);
            }
        }
        Command::Verify { claims } => {
            let results = manager.verify_claims(&claims).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                results.iter().for_each(print_verification);
            }
        }
        Command::Document { id, provider } => {
            let doc = manager.get_document(&id, provider.as_deref()).await?;
            match (doc, json) {
                (Some(doc), true) => println!("{}", serde_json::to_string_pretty(&doc)?),
                (Some(doc), false) => {
                    println!("{}", doc.title);
                    if let Some(url) = &doc.url {
                        println!("{url}");
                    }
                    println!();
                    println!("{}", doc.content);
                }
                (None, _) => anyhow::bail!("document {id} not found"),
            }
        }
        Command::Stats => {
            let stats = manager.get_statistics();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("enabled providers: {}", stats.enabled_providers.join(", "));
                println!("cache entries:     {}", stats.cache_size);
                println!(
                    "cache hit rate:    {:.1}% ({} hits, {} misses)",
                    stats.cache.hit_rate * 100.0,
                    stats.cache.hits,
                    stats.cache.misses
                );
                for info in &stats.provider_info {
                    println!(
                        "  {} ({}): base reliability {:.2}, rate limit {}ms",
                        info.name,
                        info.kind,
                        info.base_reliability,
                        info.rate_limit.as_millis()
                    );
                }
            }
        }
        Command::InitConfig { .. } => anyhow::bail!("init-config runs without a manager"),
    }
    Ok(())
}

fn write_default_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(AppConfig::default_config_path);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    AppConfig::default().save_to_file(&path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn print_search(result: &KnowledgeProviderResult) {
    let meta = &result.search_metadata;
    println!(
        "{} results for {:?} from {} in {}ms{}",
        meta.total_results,
        meta.query,
        meta.providers.join(", "),
        meta.search_time_ms,
        if meta.cached { " (cached)" } else { "" }
    );
    if !meta.failed_providers.is_empty() {
        println!("failed providers: {}", meta.failed_providers.join(", "));
    }
    println!("overall reliability: {:.2}", result.reliability.overall_score);
    for (i, doc) in result.documents.iter().enumerate() {
        println!();
        println!(
            "{}. {} [{}]",
            i + 1,
            doc.title,
            doc.metadata.provider.as_deref().unwrap_or("?")
        );
        if let Some(url) = &doc.url {
            println!("   {url}");
        }
        let snippet = doc.content.chars().take(200).collect::<String>();
        if !snippet.is_empty() {
            println!("   {}", snippet.replace('\n', " "));
        }
    }
}

fn print_verification(result: &ClaimVerificationResult) {
    println!(
        "{:<13} {:.2}  {}",
        result.verification.to_string(),
        result.confidence,
        result.claim
    );
    println!("              {}", result.explanation);
}
