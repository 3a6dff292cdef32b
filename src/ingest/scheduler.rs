//! Sequential work-queue draining.
//!
//! One parent at a time, to completion, so the API never sees child fetches
//! for two siblings at once.

use std::collections::VecDeque;
use std::future::Future;

use tracing::{debug, info, warn};

use super::{IngestError, TraversalReport};
use crate::db::{Comment, Post};

/// Something that can sit in a work queue.
pub trait QueueItem {
    /// Identifier used in logs.
    fn key(&self) -> &str;
}

impl QueueItem for Post {
    fn key(&self) -> &str {
        &self.id
    }
}

impl QueueItem for Comment {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Totals for one drained queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub processed: usize,
    pub failed: usize,
    pub fetched: usize,
    pub written: usize,
    pub duplicates: usize,
    pub failed_writes: usize,
    pub truncated: usize,
}

impl RunReport {
    fn absorb(&mut self, item: &TraversalReport) {
        self.processed += 1;
        self.fetched += item.fetched;
        self.written += item.written;
        self.duplicates += item.duplicates;
        self.failed_writes += item.failed_writes;
        self.truncated += usize::from(item.truncated);
    }
}

/// Process `queue` front to back, awaiting each item before starting the next.
///
/// A failed item is logged and counted; the queue always runs to the end.
pub async fn drain<T, F, Fut>(label: &str, mut queue: VecDeque<T>, mut work: F) -> RunReport
where
    T: QueueItem,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<TraversalReport, IngestError>>,
{
    let total = queue.len();
    info!(label, total, "Draining work queue");

    let mut report = RunReport::default();
    while let Some(item) = queue.pop_front() {
        let key = item.key().to_string();

        match work(item).await {
            Ok(item_report) => {
                debug!(label, key = %key, written = item_report.written, "Item done");
                report.absorb(&item_report);
            }
            Err(e) => {
                let e = anyhow::Error::new(e);
                warn!(label, key = %key, "Item failed: {e:#}");
                report.failed += 1;
            }
        }
    }

    info!(
        label,
        total,
        processed = report.processed,
        failed = report.failed,
        written = report.written,
        "Work queue drained"
    );
    report
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::graph::GraphError;

    struct Job(String);

    impl QueueItem for Job {
        fn key(&self) -> &str {
            &self.0
        }
    }

    fn queue(keys: &[&str]) -> VecDeque<Job> {
        keys.iter().map(|k| Job((*k).to_string())).collect()
    }

    #[tokio::test]
    async fn test_processes_in_fifo_order_one_at_a_time() {
        let order = Mutex::new(Vec::new());
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let report = drain("test", queue(&["a", "b", "c"]), |job| {
            let (order, in_flight, peak) = (&order, &in_flight, &peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                order.lock().unwrap().push(job.0);
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(TraversalReport {
                    fetched: 2,
                    written: 2,
                    ..TraversalReport::default()
                })
            }
        })
        .await;

        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(report.processed, 3);
        assert_eq!(report.written, 6);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_queue() {
        let seen = Mutex::new(Vec::new());

        let report = drain("test", queue(&["a", "bad", "c"]), |job| {
            let seen = &seen;
            async move {
                seen.lock().unwrap().push(job.0.clone());
                if job.0 == "bad" {
                    return Err(IngestError::Graph(GraphError::Transport("timed out".into())));
                }
                Ok(TraversalReport {
                    truncated: job.0 == "c",
                    ..TraversalReport::default()
                })
            }
        })
        .await;

        assert_eq!(*seen.lock().unwrap(), vec!["a", "bad", "c"]);
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.truncated, 1);
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let report = drain("test", queue(&[]), |_job: Job| async {
            Ok(TraversalReport::default())
        })
        .await;

        assert_eq!(report, RunReport::default());
    }
}
