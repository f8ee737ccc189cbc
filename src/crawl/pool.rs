// src/crawl/pool.rs
// =============================================================================
// The worker pool.
//
// Each worker loops:
//   dequeue -> depth check -> fetch -> save -> (HTML only) extract links
//   -> claim each new link and enqueue it -> complete the task
//
// Workers share one Crawl value (queue, visited set, mirror, transport)
// through an Arc handed to them when they are spawned. They stop only when
// dequeue() says the queue is closed, which happens once the last pending
// task completes.
//
// A failed fetch or save only affects its own task. The task is still
// completed, otherwise the pending count would never reach zero.
// =============================================================================

use super::queue::{CrawlTask, WorkQueue};
use super::report::{CrawlReport, FailureOutcome, PageOutcome, TaskOutcome};
use super::visited::VisitedSet;
use super::CrawlConfig;
use crate::fetch::{fetch, Fetched, Transport};
use crate::html::extract_links;
use crate::mirror::{local_path, Mirror};
use crate::url::UrlRecord;
use anyhow::{Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

// State shared by every worker in one crawl
struct Crawl<T> {
    queue: WorkQueue,
    visited: VisitedSet,
    mirror: Mirror,
    transport: T,
    max_depth: u32,
    max_redirects: u32,
}

// Completes the task when dropped, so even a panicking worker doesn't leave
// the pending count stuck above zero
struct CompleteOnDrop<'a> {
    queue: &'a WorkQueue,
    task: &'a CrawlTask,
}

impl Drop for CompleteOnDrop<'_> {
    fn drop(&mut self) {
        self.queue.complete(self.task);
    }
}

// Tells the queue this worker no longer drains it, so the workers that are
// left don't wait on a full queue for a consumer that is gone
struct LeaveOnDrop<'a>(&'a WorkQueue);

impl Drop for LeaveOnDrop<'_> {
    fn drop(&mut self) {
        self.0.consumer_exited();
    }
}

struct Worker<T> {
    id: usize,
    crawl: Arc<Crawl<T>>,
}

impl<T: Transport> Worker<T> {
    async fn run(self) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::new();
        let _leave = LeaveOnDrop(&self.crawl.queue);
        tracing::debug!("worker started");

        while let Ok(task) = self.crawl.queue.dequeue().await {
            let _complete = CompleteOnDrop {
                queue: &self.crawl.queue,
                task: &task,
            };
            outcomes.push(self.process(&task).await);
        }

        tracing::debug!(id = self.id, tasks = outcomes.len(), "worker finished");
        outcomes
    }

    async fn process(&self, task: &CrawlTask) -> TaskOutcome {
        let crawl = &self.crawl;

        if task.depth > crawl.max_depth {
            tracing::debug!(url = %task.url, depth = task.depth, "skipping, past max depth");
            return TaskOutcome::SkippedDepth;
        }

        let failed = |reason: String| {
            TaskOutcome::Failed(FailureOutcome {
                url: task.url.clone(),
                depth: task.depth,
                reason,
            })
        };

        let url = match UrlRecord::parse(&task.url) {
            Ok(url) if !url.is_relative() => url,
            Ok(_) => return failed("no host to fetch from".to_string()),
            Err(e) => {
                tracing::warn!(url = %task.url, error = %e, "skipping unparseable URL");
                return failed(e.to_string());
            }
        };

        tracing::info!(
            url = %task.url,
            depth = task.depth,
            parent = task.parent_url.as_deref().unwrap_or("-"),
            "processing"
        );

        let fetched = match fetch(&crawl.transport, &url, crawl.max_redirects).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(url = %task.url, error = %e, "failed to download");
                return failed(e.to_string());
            }
        };

        let is_html = fetched.response.is_html();
        let file = local_path(fetched.url.host(), fetched.url.path());
        let saved_to = match crawl.mirror.save(&file, &fetched.response.body, is_html).await {
            Ok(path) => {
                tracing::info!(path = %path.display(), "saved");
                Some(path)
            }
            Err(e) => {
                // The body is still in memory, so its links are still usable
                tracing::warn!(url = %task.url, error = %e, "failed to save");
                None
            }
        };

        let links_enqueued = if is_html {
            self.schedule_links(task, &fetched).await
        } else {
            0
        };

        TaskOutcome::Fetched(PageOutcome {
            url: task.url.clone(),
            final_url: fetched.url.to_string(),
            redirects: fetched.redirects,
            depth: task.depth,
            status: fetched.response.status,
            bytes: fetched.response.body.len(),
            saved_to,
            links_enqueued,
        })
    }

    // Claims and enqueues every new link on the page; returns how many
    // were enqueued
    async fn schedule_links(&self, task: &CrawlTask, fetched: &Fetched) -> usize {
        let crawl = &self.crawl;

        // Links past the limit are never claimed, so a shorter path found
        // later can still schedule them
        if task.depth + 1 > crawl.max_depth {
            tracing::debug!(url = %task.url, "max depth reached, not following links");
            return 0;
        }

        let mut enqueued = 0;
        for link in extract_links(&fetched.response.body, &fetched.url) {
            if !crawl.visited.try_claim(&link) {
                tracing::debug!(url = %link, "already visited");
                continue;
            }

            tracing::info!(url = %link, depth = task.depth + 1, "found new URL");
            if crawl.queue.enqueue(task.child(link)).await.is_err() {
                // Only possible after an early close()
                tracing::warn!(url = %task.url, "work queue closed, dropping remaining links");
                break;
            }
            enqueued += 1;
        }

        enqueued
    }
}

// Crawls from `seed` until no work is left and returns what happened
//
// Fails only if the mirror root can't be created; everything after that is
// reported per page.
pub async fn crawl<T>(transport: T, seed: &UrlRecord, config: &CrawlConfig) -> Result<CrawlReport>
where
    T: Transport + 'static,
{
    let mirror = Mirror::new(&config.mirror_root);
    mirror
        .create_root()
        .await
        .context("could not create the mirror directory")?;

    let workers = config.workers.max(1);
    let crawl = Arc::new(Crawl {
        queue: WorkQueue::new(config.queue_capacity).with_consumers(workers),
        visited: VisitedSet::new(),
        mirror,
        transport,
        max_depth: config.max_depth,
        max_redirects: config.max_redirects,
    });

    // The seed is claimed too, so pages linking back to it don't refetch it
    let seed = seed.to_string();
    crawl.visited.try_claim(&seed);
    tracing::info!(url = %seed, "adding initial URL");
    crawl.queue.enqueue(CrawlTask::seed(seed)).await?;

    let stopper = tokio::spawn(stop_early(Arc::clone(&crawl), config.deadline));

    tracing::info!(workers, "starting worker pool");
    let handles: Vec<_> = (0..workers)
        .map(|id| {
            let worker = Worker {
                id,
                crawl: Arc::clone(&crawl),
            };
            tokio::spawn(worker.run().instrument(tracing::info_span!("worker", id)))
        })
        .collect();

    let mut report: CrawlReport = join_all(handles)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(outcomes) => Some(outcomes),
            Err(e) => {
                tracing::error!(error = %e, "worker panicked");
                None
            }
        })
        .flatten()
        .collect();

    // A stopper that already fired still hands back its count after abort()
    stopper.abort();
    report.abandoned = stopper.await.unwrap_or_default();

    tracing::info!(
        pages = report.pages.len(),
        failures = report.failures.len(),
        visited = crawl.visited.len(),
        "all workers finished"
    );
    tracing::debug!(
        pending = crawl.queue.pending(),
        queued = crawl.queue.len(),
        closed = crawl.queue.is_closed(),
        "work queue state at exit"
    );
    Ok(report)
}

// Closes the queue on Ctrl-C or when the deadline passes; returns how many
// queued tasks were dropped. Aborted once the crawl ends on its own.
async fn stop_early<T>(crawl: Arc<Crawl<T>>, deadline: Option<Duration>) -> usize {
    let expired = async {
        match deadline {
            Some(deadline) => tokio::time::sleep(deadline).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        // If the handler can't be installed this branch is disabled
        Ok(()) = tokio::signal::ctrl_c() => tracing::warn!("interrupted, stopping crawl"),
        _ = expired => tracing::warn!("deadline reached, stopping crawl"),
    }

    let dropped = crawl.queue.close();
    tracing::warn!(dropped, "work queue closed early");
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::MemoryTransport;
    use std::collections::HashSet;

    fn config(root: &std::path::Path, workers: usize, max_depth: u32) -> CrawlConfig {
        CrawlConfig {
            workers,
            max_depth,
            mirror_root: root.to_path_buf(),
            ..CrawlConfig::default()
        }
    }

    fn url(raw: &str) -> UrlRecord {
        UrlRecord::parse(raw).unwrap()
    }

    // Runs a crawl with a deadline, so a termination bug fails instead of hanging
    async fn run(transport: MemoryTransport, seed: &str, config: CrawlConfig) -> (CrawlReport, Vec<String>) {
        let transport = Arc::new(transport);
        let report = tokio::time::timeout(
            Duration::from_secs(10),
            crawl(Arc::clone(&transport), &url(seed), &config),
        )
        .await
        .expect("crawl did not terminate")
        .unwrap();
        (report, transport.hits())
    }

    fn files_under(root: &std::path::Path) -> Vec<String> {
        let mut files = Vec::new();
        let mut dirs = vec![root.to_path_buf()];
        while let Some(dir) = dirs.pop() {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    dirs.push(path);
                } else {
                    let relative = path.strip_prefix(root).unwrap();
                    files.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        files.sort();
        files
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_spellings_fetch_once() {
        let dir = tempfile::tempdir().unwrap();
        let site = MemoryTransport::new()
            .html(
                "http://example.com/",
                r#"<a href="/about">About</a> <a href="http://example.com/about">About again</a>"#,
            )
            .html("http://example.com/about", "<p>about us</p>");

        let (report, hits) = run(site, "http://example.com/", config(dir.path(), 4, 3)).await;

        let about_fetches = hits.iter().filter(|h| *h == "http://example.com/about").count();
        assert_eq!(about_fetches, 1);
        assert_eq!(hits.len(), 2);
        assert_eq!(report.pages.len(), 2);
        assert_eq!(
            files_under(dir.path()),
            vec!["example.com/about", "example.com/index.html"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_last_task_with_many_children() {
        // Every page up to /b is the only pending task when processed; /b
        // then fans out. An unsound shutdown check would lose the children.
        for _ in 0..25 {
            let dir = tempfile::tempdir().unwrap();
            let children: String = (0..8)
                .map(|i| format!(r#"<a href="/c{}">c</a>"#, i))
                .collect();
            let site = MemoryTransport::new()
                .html("http://a.com/", r#"<a href="/a">a</a>"#)
                .html("http://a.com/a", r#"<a href="/b">b</a>"#)
                .html("http://a.com/b", &children);

            let (report, hits) = run(site, "http://a.com/", config(dir.path(), 4, 3)).await;

            assert_eq!(hits.len(), 11);
            for i in 0..8 {
                assert!(hits.contains(&format!("http://a.com/c{}", i)));
            }
            assert_eq!(report.pages.len(), 11);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_processes_exactly_reachable_set() {
        // "/" -> l1-{0,1,2}; l1-i -> l2-i, l2-(i+1) and back to "/";
        // l2-j -> l3-j which lies past the depth limit
        let mut site = MemoryTransport::new().html(
            "http://a.com/",
            r#"<a href="/l1-0">0</a><a href="/l1-1">1</a><a href="/l1-2">2</a>"#,
        );
        for i in 0..3 {
            site = site.html(
                &format!("http://a.com/l1-{}", i),
                &format!(r#"<a href="/l2-{}">x</a><a href="/l2-{}">y</a><a href="/">home</a>"#, i, i + 1),
            );
        }
        for j in 0..4 {
            site = site.html(
                &format!("http://a.com/l2-{}", j),
                &format!(r#"<a href="/l3-{}">deeper</a>"#, j),
            );
        }

        let dir = tempfile::tempdir().unwrap();
        let (report, hits) = run(site, "http://a.com/", config(dir.path(), 4, 2)).await;

        let expected: HashSet<String> = ["/", "/l1-0", "/l1-1", "/l1-2", "/l2-0", "/l2-1", "/l2-2", "/l2-3"]
            .iter()
            .map(|p| format!("http://a.com{}", p))
            .collect();
        let fetched: HashSet<String> = hits.iter().cloned().collect();

        assert_eq!(fetched, expected);
        assert_eq!(hits.len(), expected.len(), "a URL was fetched twice");
        assert!(report.failures.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_depth_zero_fetches_only_seed() {
        let dir = tempfile::tempdir().unwrap();
        let site = MemoryTransport::new()
            .html("http://a.com/", r#"<a href="/x">x</a>"#)
            .html("http://a.com/x", "x");

        let (report, hits) = run(site, "http://a.com/", config(dir.path(), 2, 0)).await;
        assert_eq!(hits, vec!["http://a.com/"]);
        assert_eq!(report.pages[0].links_enqueued, 0);
    }

    #[tokio::test]
    async fn test_task_past_depth_is_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let crawl = Arc::new(Crawl {
            queue: WorkQueue::new(10).with_consumers(1),
            visited: VisitedSet::new(),
            mirror: Mirror::new(dir.path()),
            transport: MemoryTransport::new().html("http://a.com/deep", r#"<a href="/more">m</a>"#),
            max_depth: 3,
            max_redirects: 3,
        });

        let task = CrawlTask {
            url: "http://a.com/deep".to_string(),
            parent_url: Some("http://a.com/".to_string()),
            depth: 4,
        };
        crawl.queue.enqueue(task).await.unwrap();

        let worker = Worker {
            id: 0,
            crawl: Arc::clone(&crawl),
        };
        let outcomes = worker.run().await;

        assert!(matches!(outcomes.as_slice(), [TaskOutcome::SkippedDepth]));
        assert!(crawl.transport.hits().is_empty());
        assert!(crawl.queue.is_closed());
        assert_eq!(crawl.visited.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_do_not_stop_the_crawl() {
        let dir = tempfile::tempdir().unwrap();
        let site = MemoryTransport::new()
            .html(
                "http://a.com/",
                r#"<a href="/broken">b</a><a href="/fine">f</a><a href="/loop">l</a>"#,
            )
            .raw("http://a.com/broken", b"not http")
            .redirect("http://a.com/loop", "/loop")
            .html("http://a.com/fine", "ok");

        let (report, _) = run(site, "http://a.com/", config(dir.path(), 3, 3)).await;

        let mut failed: Vec<&str> = report.failures.iter().map(|f| f.url.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["http://a.com/broken", "http://a.com/loop"]);
        assert!(report.pages.iter().any(|p| p.url == "http://a.com/fine"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_save_failure_still_schedules_links() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the seed's file should go makes its save fail
        std::fs::create_dir_all(dir.path().join("a.com/index.html")).unwrap();

        let site = MemoryTransport::new()
            .html("http://a.com/", r#"<a href="/next">n</a>"#)
            .html("http://a.com/next", "next");

        let (report, hits) = run(site, "http://a.com/", config(dir.path(), 2, 3)).await;

        assert!(hits.contains(&"http://a.com/next".to_string()));
        let seed = report.pages.iter().find(|p| p.url == "http://a.com/").unwrap();
        assert_eq!(seed.saved_to, None);
        assert_eq!(seed.links_enqueued, 1);
        assert_eq!(report.saved(), 1);
        assert!(dir.path().join("a.com/next").is_file());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_worker_does_not_stall_a_full_queue() {
        // Blows up on one URL and serves the rest from memory
        struct PanicsOn {
            site: MemoryTransport,
            url: &'static str,
        }

        impl Transport for PanicsOn {
            async fn send(&self, url: &UrlRecord) -> Result<crate::fetch::Response, crate::error::FetchError> {
                if url.to_string() == self.url {
                    panic!("transport failure on {}", self.url);
                }
                self.site.send(url).await
            }
        }

        // The worker that takes /boom dies; the one left has to push /hub's
        // children through a queue of capacity 1 on its own
        let links: String = (0..5).map(|i| format!(r#"<a href="/p{}">p</a>"#, i)).collect();
        let transport = Arc::new(PanicsOn {
            site: MemoryTransport::new()
                .html("http://a.com/", r#"<a href="/boom">b</a><a href="/hub">h</a>"#)
                .html("http://a.com/hub", &links),
            url: "http://a.com/boom",
        });

        let dir = tempfile::tempdir().unwrap();
        let config = CrawlConfig {
            queue_capacity: 1,
            ..config(dir.path(), 2, 3)
        };
        let report = tokio::time::timeout(
            Duration::from_secs(10),
            crawl(Arc::clone(&transport), &url("http://a.com/"), &config),
        )
        .await
        .expect("crawl stalled after a worker panicked")
        .unwrap();

        let hits = transport.site.hits();
        for i in 0..5 {
            assert!(hits.contains(&format!("http://a.com/p{}", i)));
        }
        assert!(report.pages.iter().any(|p| p.url == "http://a.com/hub"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_tiny_queue_still_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let links: String = (0..40).map(|i| format!(r#"<a href="/p{}">p</a>"#, i)).collect();
        let mut site = MemoryTransport::new().html("http://a.com/", &links);
        for i in 0..40 {
            // Every page links to every other page
            site = site.html(&format!("http://a.com/p{}", i), &links);
        }

        let config = CrawlConfig {
            queue_capacity: 1,
            ..config(dir.path(), 2, 3)
        };
        let (report, hits) = run(site, "http://a.com/", config).await;

        assert_eq!(hits.len(), 41);
        assert_eq!(report.pages.len(), 41);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_deadline_stops_an_endless_site() {
        // Every page links to two new pages, forever
        struct Endless;

        impl Transport for Endless {
            async fn send(&self, url: &UrlRecord) -> Result<crate::fetch::Response, crate::error::FetchError> {
                tokio::time::sleep(Duration::from_millis(5)).await;
                let body = format!(
                    r#"<a href="/{0}-l">l</a><a href="/{0}-r">r</a>"#,
                    url.path()
                );
                let raw = format!("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n{}", body);
                crate::fetch::Response::parse(raw.into_bytes())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let config = CrawlConfig {
            deadline: Some(Duration::from_millis(300)),
            ..config(dir.path(), 4, 64)
        };

        let report = tokio::time::timeout(
            Duration::from_secs(10),
            crawl(Endless, &url("http://a.com/"), &config),
        )
        .await
        .expect("deadline should stop the crawl")
        .unwrap();

        assert!(!report.pages.is_empty());
        assert!(report.abandoned > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_redirected_page_saved_under_final_path() {
        let dir = tempfile::tempdir().unwrap();
        let site = MemoryTransport::new()
            .redirect("http://a.com/", "/home")
            .html("http://a.com/home", r#"<a href="/next">n</a>"#)
            .raw(
                "http://a.com/next",
                b"HTTP/1.1 200 OK\r\nContent-Type: image/png\r\n\r\n\x89PNG",
            );

        let (report, _) = run(site, "http://a.com/", config(dir.path(), 2, 3)).await;

        assert_eq!(files_under(dir.path()), vec!["a.com/home", "a.com/next"]);
        let seed = report.pages.iter().find(|p| p.url == "http://a.com/").unwrap();
        assert_eq!(seed.final_url, "http://a.com/home");
        assert_eq!(seed.redirects, 1);
        assert_eq!(std::fs::read(dir.path().join("a.com/next")).unwrap(), b"\x89PNG");
    }
}
