// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// The only required argument is the seed URL. Everything else has a default,
// so `mirror-crawl http://example.com/` is a complete invocation. When the
// URL is missing, clap prints a usage line and exits with a non-zero code.
// =============================================================================

use crate::crawl::{
    CrawlConfig, DEFAULT_MAX_DEPTH, DEFAULT_QUEUE_CAPACITY, DEFAULT_TIMEOUT_SECS, DEFAULT_WORKERS,
};
use crate::fetch::DEFAULT_MAX_REDIRECTS;
use crate::mirror::DEFAULT_MIRROR_ROOT;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

// #[derive(Parser)] tells clap to generate the parsing code from this struct
#[derive(Parser, Debug)]
#[command(
    name = "mirror-crawl",
    version,
    about = "Crawl a website and mirror its pages to a local directory",
    long_about = "mirror-crawl starts from one URL, follows href links up to a depth limit \
                  with a pool of workers, and writes every fetched page under <output>/<host>/<path>. \
                  Links inside saved HTML pages are rewritten to point into the mirror."
)]
pub struct Cli {
    /// URL to start crawling from (e.g., http://example.com/)
    pub url: String,

    /// Number of workers fetching pages in parallel
    #[arg(
        long,
        default_value_t = DEFAULT_WORKERS,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub workers: usize,

    /// Maximum link depth from the starting page (0 = only the starting page)
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: u32,

    /// How many discovered pages may wait in the work queue
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Redirects followed per page before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
    pub max_redirects: u32,

    /// Directory the mirror is written to
    #[arg(long, short, default_value = DEFAULT_MIRROR_ROOT)]
    pub output: PathBuf,

    /// Per-page timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Stop the whole crawl after this many seconds
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Print the crawl report as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            workers: self.workers,
            max_depth: self.max_depth,
            queue_capacity: self.queue_capacity.max(1),
            max_redirects: self.max_redirects,
            mirror_root: self.output.clone(),
            timeout: Duration::from_secs(self.timeout),
            deadline: self.deadline.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["mirror-crawl", "http://example.com/"]).unwrap();
        let config = cli.crawl_config();

        assert_eq!(cli.url, "http://example.com/");
        assert_eq!(config.workers, 4);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.max_redirects, 3);
        assert_eq!(config.mirror_root, PathBuf::from("downloads"));
        assert_eq!(config.deadline, None);
        assert!(!cli.json);
    }

    #[test]
    fn test_missing_url_is_an_error() {
        assert!(Cli::try_parse_from(["mirror-crawl"]).is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(Cli::try_parse_from(["mirror-crawl", "http://a.com/", "--workers", "0"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "mirror-crawl",
            "http://a.com/",
            "--workers",
            "8",
            "--max-depth",
            "1",
            "-o",
            "site",
            "--deadline",
            "60",
            "--json",
        ])
        .unwrap();
        let config = cli.crawl_config();

        assert_eq!(config.workers, 8);
        assert_eq!(config.max_depth, 1);
        assert_eq!(config.mirror_root, PathBuf::from("site"));
        assert_eq!(config.deadline, Some(Duration::from_secs(60)));
        assert!(cli.json);
    }
}
