// src/crawl/visited.rs
// =============================================================================
// The set of URLs that have already been scheduled.
//
// try_claim() checks and inserts under ONE lock acquisition. Checking with
// contains() and then inserting under a second lock would let two workers
// both see "not visited" and both schedule the same page.
// =============================================================================

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    // Returns true if this call claimed the URL, false if someone else
    // claimed it first
    pub fn try_claim(&self, url: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(url) {
            return false;
        }
        seen.insert(url.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
