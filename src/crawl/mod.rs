// src/crawl/mod.rs
// =============================================================================
// This module runs the crawl itself.
//
// Submodules:
// - queue: the bounded work queue and its termination rule
// - visited: which URLs have already been scheduled
// - pool: the workers that drain the queue
// - report: what each worker did, merged into one report
//
// Rust concepts:
// - Arc: shared ownership of the crawl state across worker tasks
// - tokio::spawn: every worker runs as its own task on the multi-thread
//   runtime, so workers make progress in parallel
// =============================================================================

mod pool;
mod queue;
mod report;
mod visited;

pub use pool::crawl;
pub use report::CrawlReport;

use crate::fetch::DEFAULT_MAX_REDIRECTS;
use crate::mirror::DEFAULT_MIRROR_ROOT;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_MAX_DEPTH: u32 = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub use queue::DEFAULT_QUEUE_CAPACITY;

// Settings for one crawl
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub workers: usize,
    // Pages deeper than this many hops from the seed are not fetched
    pub max_depth: u32,
    pub queue_capacity: usize,
    pub max_redirects: u32,
    pub mirror_root: PathBuf,
    // Per fetch: connect, send and read together
    pub timeout: Duration,
    // Whole crawl; None means run until the work runs out
    pub deadline: Option<Duration>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_depth: DEFAULT_MAX_DEPTH,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            mirror_root: PathBuf::from(DEFAULT_MIRROR_ROOT),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            deadline: None,
        }
    }
}
