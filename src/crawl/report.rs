// src/crawl/report.rs
// =============================================================================
// What happened during a crawl.
//
// Each worker keeps its own list of outcomes and hands it back when it
// exits, so recording needs no locking. The pool merges the lists into one
// CrawlReport, which main.rs prints as a summary or as JSON.
// =============================================================================

use serde::Serialize;
use std::path::PathBuf;

// A page that was fetched (whatever its status code)
#[derive(Debug, Clone, Serialize)]
pub struct PageOutcome {
    pub url: String,
    /// Differs from `url` when redirects were followed
    pub final_url: String,
    pub redirects: u32,
    pub depth: u32,
    pub status: u16,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
    pub links_enqueued: usize,
}

// A task that produced nothing
#[derive(Debug, Clone, Serialize)]
pub struct FailureOutcome {
    pub url: String,
    pub depth: u32,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Fetched(PageOutcome),
    Failed(FailureOutcome),
    // Past the depth limit, completed without a fetch
    SkippedDepth,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    pub pages: Vec<PageOutcome>,
    pub failures: Vec<FailureOutcome>,
    pub skipped_depth: usize,
    // Queued tasks dropped by an early stop (Ctrl-C or deadline)
    pub abandoned: usize,
}

impl CrawlReport {
    pub fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Fetched(page) => self.pages.push(page),
            TaskOutcome::Failed(failure) => self.failures.push(failure),
            TaskOutcome::SkippedDepth => self.skipped_depth += 1,
        }
    }

    // Pages that made it to disk
    pub fn saved(&self) -> usize {
        self.pages.iter().filter(|p| p.saved_to.is_some()).count()
    }
}

impl FromIterator<TaskOutcome> for CrawlReport {
    fn from_iter<I: IntoIterator<Item = TaskOutcome>>(iter: I) -> Self {
        let mut report = CrawlReport::default();
        for outcome in iter {
            report.record(outcome);
        }
        report
    }
}
