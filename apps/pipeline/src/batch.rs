//! Bounded batch driver.
//!
//! Replaces a sequential blocking loop: items run under a concurrency limit
//! with a per-item timeout, and one item's failure never aborts the rest.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::errors::Result;

/// One failed item: its label and the error text.
#[derive(Debug)]
pub struct BatchFailure {
    pub label: String,
    pub error: String,
}

/// Batch outcome summary; drives the process exit status.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    pub fn log_summary(&self, what: &str) {
        if self.failed.is_empty() {
            info!("{what}: {}/{} items succeeded", self.succeeded, self.total());
        } else {
            error!(
                "{what}: {}/{} items succeeded, {} failed",
                self.succeeded,
                self.total(),
                self.failed.len()
            );
            for failure in &self.failed {
                error!("  {} — {}", failure.label, failure.error);
            }
        }
    }
}

/// Runs `op` over every `(label, item)` pair with at most `concurrency` in
/// flight and `per_item_timeout` per item.
pub async fn run_batch<T, F, Fut>(
    items: Vec<(String, T)>,
    concurrency: usize,
    per_item_timeout: Duration,
    op: F,
) -> BatchReport
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let op = Arc::new(op);
    let mut set: JoinSet<(String, Option<String>)> = JoinSet::new();

    for (label, item) in items {
        let semaphore = semaphore.clone();
        let op = op.clone();
        set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("batch semaphore closed");
            let outcome = match tokio::time::timeout(per_item_timeout, op(item)).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!(
                    "timed out after {}s",
                    per_item_timeout.as_secs()
                )),
            };
            (label, outcome)
        });
    }

    let mut report = BatchReport::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, None)) => report.succeeded += 1,
            Ok((label, Some(error))) => {
                warn!("Item {label} failed: {error}");
                report.failed.push(BatchFailure { label, error });
            }
            Err(join_error) => {
                report.failed.push(BatchFailure {
                    label: "<task>".to_string(),
                    error: format!("task panicked: {join_error}"),
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::errors::PipelineError;

    #[tokio::test]
    async fn test_failures_are_isolated_per_item() {
        let items = vec![
            ("a".to_string(), 1u32),
            ("b".to_string(), 2),
            ("c".to_string(), 3),
        ];
        let report = run_batch(items, 2, Duration::from_secs(5), |n| async move {
            if n == 2 {
                Err(PipelineError::NotFound("item two".to_string()))
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].label, "b");
        assert!(report.failed[0].error.contains("item two"));
    }

    #[tokio::test]
    async fn test_per_item_timeout_does_not_abort_batch() {
        let items = vec![("slow".to_string(), true), ("fast".to_string(), false)];
        let report = run_batch(items, 2, Duration::from_millis(50), |slow| async move {
            if slow {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            Ok(())
        })
        .await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].label, "slow");
        assert!(report.failed[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let items: Vec<(String, ())> = (0..8).map(|i| (format!("i{i}"), ())).collect();
        let running2 = running.clone();
        let peak2 = peak.clone();
        let report = run_batch(items, 2, Duration::from_secs(5), move |_| {
            let running = running2.clone();
            let peak = peak2.clone();
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(report.succeeded, 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_batch_reports_zero() {
        let report = run_batch(
            Vec::<(String, ())>::new(),
            4,
            Duration::from_secs(1),
            |_| async { Ok(()) },
        )
        .await;
        assert_eq!(report.total(), 0);
        assert!(report.failed.is_empty());
    }
}
