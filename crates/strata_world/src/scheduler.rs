//! # Cooperative Scheduler
//!
//! Keyed, prioritized work that runs a slice at a time inside the host's
//! frame loop.
//!
//! ## Model
//!
//! - Every task has a string key. Enqueueing under a pending key replaces
//!   the old task (latest intent wins).
//! - Lower priority values run first; ties run in enqueue order.
//! - [`CooperativeScheduler::pump`] runs tasks until the queue is empty or
//!   the frame budget is spent, and always runs at least one.
//! - Cancelled tasks stay in the heap and are skipped when popped.
//!
//! Tasks receive the context they mutate plus the scheduler itself, so a
//! stage can enqueue its follow-up stage.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use tracing::warn;

use crate::error::TaskResult;
use crate::Instant;

/// A unit of scheduled work.
pub type Task<C> = Box<dyn FnOnce(&mut C, &mut CooperativeScheduler<C>) -> TaskResult>;

/// How much time one pump may spend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameBudget {
    /// The host reported this much idle time.
    Idle(Duration),
    /// No idle information: use the configured fallback budget.
    Fallback,
}

/// Outcome of one pump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Tasks invoked (including failures).
    pub executed: usize,
    /// Tasks that returned an error.
    pub failed: usize,
    /// Cancelled or superseded heap entries discarded.
    pub skipped: usize,
    /// Tasks still pending afterwards.
    pub remaining: usize,
    /// Pump was refused because one was already running.
    pub reentrant: bool,
}

struct Pending<C> {
    key: String,
    task: Task<C>,
}

/// Single-threaded cooperative work queue over a context `C`.
pub struct CooperativeScheduler<C> {
    heap: BinaryHeap<Reverse<(u32, u64)>>,
    pending: HashMap<u64, Pending<C>>,
    by_key: HashMap<String, u64>,
    next_seq: u64,
    running: bool,
    fallback_budget: Duration,
    total_executed: u64,
    total_failed: u64,
}

impl<C> CooperativeScheduler<C> {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new(fallback_budget: Duration) -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
            by_key: HashMap::new(),
            next_seq: 0,
            running: false,
            fallback_budget,
            total_executed: 0,
            total_failed: 0,
        }
    }

    /// Queues `task` under `key`, replacing any pending task with that key.
    pub fn enqueue<F>(&mut self, key: impl Into<String>, priority: u32, task: F)
    where
        F: FnOnce(&mut C, &mut Self) -> TaskResult + 'static,
    {
        let key = key.into();
        let seq = self.next_seq;
        self.next_seq += 1;

        if let Some(old) = self.by_key.insert(key.clone(), seq) {
            self.pending.remove(&old);
        }
        self.pending.insert(
            seq,
            Pending {
                key,
                task: Box::new(task),
            },
        );
        self.heap.push(Reverse((priority, seq)));
    }

    /// Cancels the pending task under `key`. Returns `true` if one existed.
    pub fn cancel(&mut self, key: &str) -> bool {
        let cancelled = self
            .by_key
            .remove(key)
            .and_then(|seq| self.pending.remove(&seq))
            .is_some();
        self.compact();
        cancelled
    }

    /// Cancels every pending task whose key starts with `prefix`.
    ///
    /// Returns how many were cancelled.
    pub fn cancel_by_prefix(&mut self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .by_key
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &keys {
            if let Some(seq) = self.by_key.remove(key) {
                self.pending.remove(&seq);
            }
        }
        self.compact();
        keys.len()
    }

    fn compact(&mut self) {
        if self.pending.is_empty() {
            self.heap.clear();
        }
    }

    /// Returns `true` if a task is pending under `key`.
    #[must_use]
    pub fn is_pending(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Number of pending tasks.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if the host should pump again.
    #[inline]
    #[must_use]
    pub fn needs_pump(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Tasks run since creation.
    #[must_use]
    pub const fn total_executed(&self) -> u64 {
        self.total_executed
    }

    /// Tasks failed since creation.
    #[must_use]
    pub const fn total_failed(&self) -> u64 {
        self.total_failed
    }

    /// Runs pending tasks in priority order within `budget`.
    ///
    /// A task calling `pump` on the scheduler it was handed gets a report
    /// with `reentrant` set and nothing runs.
    pub fn pump(&mut self, ctx: &mut C, budget: FrameBudget) -> PumpReport {
        let mut report = PumpReport::default();
        if self.running {
            report.reentrant = true;
            report.remaining = self.pending.len();
            return report;
        }
        self.running = true;

        let limit = match budget {
            FrameBudget::Idle(d) => d,
            FrameBudget::Fallback => self.fallback_budget,
        };
        let start = Instant::now();

        while report.executed == 0 || start.elapsed() < limit {
            let Some(Reverse((_, seq))) = self.heap.pop() else {
                break;
            };
            let Some(Pending { key, task }) = self.pending.remove(&seq) else {
                report.skipped += 1;
                continue;
            };
            // Unindexed before running: a task may re-enqueue its own key
            self.by_key.remove(&key);

            report.executed += 1;
            self.total_executed += 1;
            if let Err(e) = task(ctx, self) {
                report.failed += 1;
                self.total_failed += 1;
                warn!(task = %key, error = %e, "scheduled task failed");
            }
        }

        self.running = false;
        report.remaining = self.pending.len();
        report
    }

    /// Runs everything, ignoring budgets. For preloading and tests.
    pub fn drain(&mut self, ctx: &mut C) -> PumpReport {
        let mut total = PumpReport::default();
        while self.needs_pump() {
            let report = self.pump(ctx, FrameBudget::Idle(Duration::MAX));
            total.executed += report.executed;
            total.failed += report.failed;
            total.skipped += report.skipped;
            if report.reentrant {
                total.reentrant = true;
                break;
            }
        }
        total.remaining = self.pending.len();
        total
    }
}
