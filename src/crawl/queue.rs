// src/crawl/queue.rs
// =============================================================================
// The bounded work queue shared by all workers, and the rule that decides
// when the crawl is over.
//
// How termination works:
// - A "pending" counter counts tasks that exist but aren't finished yet
//   (waiting in the queue or being worked on).
// - enqueue() bumps it in the same critical section that stores the task.
// - A worker calls complete() only AFTER it has enqueued every child of the
//   task. So a child is always counted before its parent stops being counted.
// - complete() decrements the counter, and when it reaches zero it closes
//   the queue in the same critical section and wakes everyone up.
//
// Looking at "queue is empty and nobody is busy" is not enough: a worker can
// be between finishing a page and enqueueing its links at exactly that
// moment. The counter can't miss that, because the page is still pending.
//
// Workers never read the counter themselves. They find out the crawl is
// over when dequeue() returns QueueClosed.
//
// Rust concepts:
// - std::sync::Mutex: guards the queue state; never held across an .await
// - tokio::sync::Notify: lets async tasks sleep until something changes
// - VecDeque: FIFO buffer with cheap push_back / pop_front
// =============================================================================

use crate::error::QueueClosed;
use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

// One unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: String,
    // The page this URL was found on; None for the seed
    pub parent_url: Option<String>,
    // Link hops from the seed (the seed is depth 0)
    pub depth: u32,
}

impl CrawlTask {
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parent_url: None,
            depth: 0,
        }
    }

    // A link found on this task's page
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parent_url: Some(self.url.clone()),
            depth: self.depth + 1,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    items: VecDeque<CrawlTask>,
    pending: usize,
    closed: bool,
    // Producers currently parked in enqueue() on a full queue
    blocked_producers: usize,
    // Workers still draining the queue
    consumers: usize,
}

#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<State>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            capacity: capacity.max(1),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    // Tells the queue how many workers drain it.
    //
    // Workers are producers too. If every one of them is stuck in enqueue()
    // on a full queue, nobody is left to dequeue, so in that case the task
    // is admitted past capacity instead of waiting forever.
    pub fn with_consumers(mut self, consumers: usize) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .consumers = consumers;
        self
    }

    // A worker stopped draining the queue (it panicked, or the crawl is
    // over). Parked producers re-check whether anyone is left to make room.
    pub fn consumer_exited(&self) {
        {
            let mut state = self.lock();
            state.consumers = state.consumers.saturating_sub(1);
        }
        self.not_full.notify_waiters();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Adds a task, waiting while the queue is full
    //
    // The task counts as pending from the moment it is stored.
    pub async fn enqueue(&self, task: CrawlTask) -> Result<(), QueueClosed> {
        let mut task = Some(task);
        let mut parked = false;

        loop {
            // Register for wakeups before looking at the state, so a
            // notification between the check and the await isn't lost
            let mut notified = pin!(self.not_full.notified());
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    if parked {
                        state.blocked_producers -= 1;
                    }
                    return Err(QueueClosed);
                }

                let others_parked = state.blocked_producers - usize::from(parked);
                let has_room = state.items.len() < self.capacity;
                let nobody_can_drain = others_parked + 1 >= state.consumers;

                if has_room || nobody_can_drain {
                    if parked {
                        state.blocked_producers -= 1;
                    }
                    if let Some(task) = task.take() {
                        state.items.push_back(task);
                        state.pending += 1;
                    }
                    drop(state);
                    self.not_empty.notify_one();
                    return Ok(());
                }

                if !parked {
                    state.blocked_producers += 1;
                    parked = true;
                }
            }

            notified.await;
        }
    }

    // Takes the oldest task, waiting while the queue is empty
    //
    // Returns QueueClosed once the queue is closed and empty; that is the
    // signal for a worker to exit.
    pub async fn dequeue(&self) -> Result<CrawlTask, QueueClosed> {
        loop {
            let mut notified = pin!(self.not_empty.notified());
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(task) = state.items.pop_front() {
                    drop(state);
                    self.not_full.notify_one();
                    return Ok(task);
                }
                if state.closed {
                    return Err(QueueClosed);
                }
            }

            notified.await;
        }
    }

    // Marks a dequeued task as finished, including all of its enqueues
    //
    // When this was the last pending task the queue closes.
    pub fn complete(&self, task: &CrawlTask) {
        let mut state = self.lock();
        debug_assert!(state.pending > 0, "complete() without a pending task");
        state.pending = state.pending.saturating_sub(1);
        tracing::trace!(url = %task.url, pending = state.pending, "task complete");

        if state.pending == 0 && !state.closed {
            state.closed = true;
            drop(state);
            tracing::debug!("no pending tasks left, closing work queue");
            self.wake_all();
        }
    }

    // Stops the crawl early: queued tasks are dropped, nothing new is
    // accepted, and every waiting worker wakes up. Tasks already being
    // processed finish normally. Returns how many queued tasks were dropped.
    pub fn close(&self) -> usize {
        let dropped = {
            let mut state = self.lock();
            state.closed = true;
            let dropped = state.items.len();
            state.items.clear();
            state.pending -= dropped;
            dropped
        };
        self.wake_all();
        dropped
    }

    fn wake_all(&self) {
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    pub fn pending(&self) -> usize {
        self.lock().pending
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
