//! Bounded-concurrency worker pool.
//!
//! Tasks are pulled lazily from an iterator so that no more than
//! `concurrency` futures exist at once: file contents are only read by
//! tasks that are actually running, and each request's timeout window
//! starts when the request does.

use std::future::Future;
use std::num::NonZeroUsize;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

/// Counters describing one [`WorkerPool::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub started: usize,
    pub peak_in_flight: usize,
}

/// Runs futures from a task source with at most `concurrency` in flight.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: NonZeroUsize,
}

impl WorkerPool {
    pub fn new(concurrency: NonZeroUsize) -> Self {
        Self { concurrency }
    }

    /// Drives every task the source yields.
    ///
    /// Returns once the source is exhausted and every started task has
    /// settled. Task outputs are discarded: a task handles its own failure,
    /// and a failed task never stops the pool from pulling the next one.
    pub async fn run<I>(&self, tasks: I) -> PoolReport
    where
        I: IntoIterator,
        I::Item: Future,
    {
        let mut tasks = tasks.into_iter().fuse();
        let mut in_flight = FuturesUnordered::new();
        let mut report = PoolReport::default();

        loop {
            while in_flight.len() < self.concurrency.get() {
                let Some(task) = tasks.next() else {
                    break;
                };
                in_flight.push(task);
                report.started += 1;
            }
            report.peak_in_flight = report.peak_in_flight.max(in_flight.len());

            if in_flight.next().await.is_none() {
                break;
            }
        }

        report
    }
}
