// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Set up logging (diagnostics go to stderr)
// 2. Parse command-line arguments using clap
// 3. Parse the seed URL; a bad seed stops everything right here
// 4. Run the crawl and print the report
// 5. Exit with proper code (0 = crawl finished, 1 = could not start,
//    2 = bad arguments, set by clap)
// =============================================================================

mod cli;
mod crawl;
mod error;
mod fetch;
mod html;
mod mirror;
mod url;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::Cli;
use crawl::CrawlReport;
use fetch::SchemeTransport;
use tracing_subscriber::EnvFilter;
use url::UrlRecord;

#[tokio::main]
async fn main() {
    init_tracing();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

// RUST_LOG overrides the default filter, e.g. RUST_LOG=mirror_crawl=debug
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "mirror_crawl=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let seed = UrlRecord::parse(&cli.url)
        .with_context(|| format!("invalid seed URL '{}'", cli.url))?;
    if seed.is_relative() {
        bail!("seed URL must be absolute (e.g. http://{}/)", cli.url);
    }

    let config = cli.crawl_config();
    tracing::debug!(?config, "crawl configuration");

    let transport = SchemeTransport::new(config.timeout).context("could not set up the HTTP client")?;
    let report = crawl::crawl(transport, &seed, &config).await?;

    print_report(&report, &config.mirror_root, cli.json)?;
    Ok(0)
}

// Prints the report either as JSON or as a short summary
fn print_report(report: &CrawlReport, root: &std::path::Path, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for failure in &report.failures {
        println!("  failed  {}  ({})", failure.url, failure.reason);
    }

    println!();
    println!("Summary:");
    println!("   Fetched: {}", report.pages.len());
    println!("   Saved:   {} (under {})", report.saved(), root.display());
    println!("   Failed:  {}", report.failures.len());
    println!("   Skipped (too deep): {}", report.skipped_depth);
    if report.abandoned > 0 {
        println!("   Abandoned (stopped early): {}", report.abandoned);
    }
    Ok(())
}
