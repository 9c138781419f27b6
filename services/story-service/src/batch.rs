use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const IMAGE_MIME_PNG: &str = "image/png";

/// One unit of batch work: a scene that needs an illustration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub prompt: String,
}

/// Outcome for a single item. A batch always yields exactly one of these per
/// input item; failures are data, never batch-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    Success {
        id: String,
        b64: String,
        mime: &'static str,
    },
    Failure {
        id: String,
        error: String,
    },
}

impl ItemResult {
    pub fn id(&self) -> &str {
        match self {
            ItemResult::Success { id, .. } => id,
            ItemResult::Failure { id, .. } => id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemResult::Success { .. })
    }
}

pub struct BatchOutcome {
    pub results: Vec<ItemResult>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs `worker` over `items` with at most `concurrency` tasks in flight.
///
/// A fixed set of min(concurrency, N) runners pulls indexes from a shared
/// atomic cursor, so every index is claimed exactly once and the output stays
/// aligned with the input regardless of completion order. `on_progress` is
/// called with (completed, total) after every finished item; the completed
/// count is monotonic.
pub async fn map_with_concurrency<T, R, F, Fut, P>(
    items: Vec<T>,
    concurrency: usize,
    worker: F,
    on_progress: P,
) -> Vec<R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(T, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    P: Fn(usize, usize) + Send + Sync + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }
    let runner_count = concurrency.clamp(1, total);

    let items = Arc::new(items);
    let worker = Arc::new(worker);
    let on_progress = Arc::new(on_progress);
    let cursor = Arc::new(AtomicUsize::new(0));
    // Completed count and its callback advance together under one lock so
    // observers never see the count move backwards.
    let completed = Arc::new(std::sync::Mutex::new(0usize));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(usize, R)>();

    let mut runners = Vec::with_capacity(runner_count);
    for runner_id in 0..runner_count {
        let items = Arc::clone(&items);
        let worker = Arc::clone(&worker);
        let on_progress = Arc::clone(&on_progress);
        let cursor = Arc::clone(&cursor);
        let completed = Arc::clone(&completed);
        let tx = tx.clone();
        runners.push(tokio::spawn(async move {
            tracing::debug!(runner_id, "batch runner started");
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= total {
                    break;
                }
                let result = worker(items[index].clone(), index).await;
                {
                    let mut done = completed.lock().expect("progress lock");
                    *done += 1;
                    on_progress(*done, total);
                }
                if tx.send((index, result)).is_err() {
                    break;
                }
            }
            tracing::debug!(runner_id, "batch runner finished");
        }));
    }
    drop(tx);

    for runner in runners {
        // Worker functions return results for every failure mode, so a
        // panicked runner is a defect in the pool itself.
        runner.await.expect("batch runner panicked");
    }

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    while let Some((index, result)) = rx.recv().await {
        slots[index] = Some(result);
    }

    slots
        .into_iter()
        .map(|slot| slot.expect("batch result slot left empty"))
        .collect()
}

/// Batch entry point for scene illustration: one worker invocation per item,
/// derived success/failure counts on the way out.
pub async fn run_batch<F, Fut, P>(
    items: Vec<WorkItem>,
    concurrency: usize,
    worker: F,
    on_progress: P,
) -> BatchOutcome
where
    F: Fn(WorkItem) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ItemResult> + Send + 'static,
    P: Fn(usize, usize) + Send + Sync + 'static,
{
    let results =
        map_with_concurrency(items, concurrency, move |item, _| worker(item), on_progress).await;
    let succeeded = results.iter().filter(|result| result.is_success()).count();
    let failed = results.len() - succeeded;
    BatchOutcome {
        results,
        succeeded,
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    fn items(count: usize) -> Vec<WorkItem> {
        (0..count)
            .map(|index| WorkItem {
                id: format!("s{index}"),
                prompt: format!("prompt {index}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let outcome = run_batch(
            Vec::new(),
            4,
            |item: WorkItem| async move {
                ItemResult::Success {
                    id: item.id,
                    b64: String::new(),
                    mime: IMAGE_MIME_PNG,
                }
            },
            |_, _| {},
        )
        .await;
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.succeeded, 0);
        assert_eq!(outcome.failed, 0);
    }

    #[tokio::test]
    async fn cardinality_and_order_match_input() {
        let input = items(17);
        let expected_ids: Vec<String> = input.iter().map(|item| item.id.clone()).collect();
        let outcome = run_batch(
            input,
            3,
            |item: WorkItem| async move {
                ItemResult::Success {
                    id: item.id,
                    b64: "Zg==".to_string(),
                    mime: IMAGE_MIME_PNG,
                }
            },
            |_, _| {},
        )
        .await;

        assert_eq!(outcome.results.len(), 17);
        let got_ids: Vec<&str> = outcome.results.iter().map(|result| result.id()).collect();
        assert_eq!(got_ids, expected_ids);
    }

    #[tokio::test]
    async fn no_item_is_duplicated_or_skipped() {
        let processed = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&processed);
        let outcome = run_batch(
            items(25),
            5,
            move |item: WorkItem| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().unwrap().push(item.id.clone());
                    ItemResult::Failure {
                        id: item.id,
                        error: "nope".to_string(),
                    }
                }
            },
            |_, _| {},
        )
        .await;

        let processed = processed.lock().unwrap();
        let unique: HashSet<&String> = processed.iter().collect();
        assert_eq!(processed.len(), 25);
        assert_eq!(unique.len(), 25);
        assert_eq!(outcome.failed, 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn peak_concurrency_stays_under_cap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let active_ref = Arc::clone(&active);
        let peak_ref = Arc::clone(&peak);

        let outcome = run_batch(
            items(12),
            2,
            move |item: WorkItem| {
                let active = Arc::clone(&active_ref);
                let peak = Arc::clone(&peak_ref);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    ItemResult::Success {
                        id: item.id,
                        b64: String::new(),
                        mime: IMAGE_MIME_PNG,
                    }
                }
            },
            |_, _| {},
        )
        .await;

        assert_eq!(outcome.succeeded, 12);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn exhaustion_returns_all_failures_without_hanging() {
        let outcome = run_batch(
            items(6),
            8,
            |item: WorkItem| async move {
                ItemResult::Failure {
                    id: item.id,
                    error: "every strategy failed".to_string(),
                }
            },
            |_, _| {},
        )
        .await;

        assert_eq!(outcome.results.len(), 6);
        assert_eq!(outcome.failed, 6);
        assert!(outcome
            .results
            .iter()
            .all(|result| !result.is_success()));
    }

    #[tokio::test]
    async fn outcome_per_id_is_order_independent() {
        let fails = |id: &str| id.ends_with('3');
        let worker = move |item: WorkItem| {
            let failed = fails(&item.id);
            async move {
                if failed {
                    ItemResult::Failure {
                        id: item.id,
                        error: "deterministic failure".to_string(),
                    }
                } else {
                    ItemResult::Success {
                        id: item.id,
                        b64: String::new(),
                        mime: IMAGE_MIME_PNG,
                    }
                }
            }
        };

        let forward = run_batch(items(10), 3, worker, |_, _| {}).await;
        let mut reversed_input = items(10);
        reversed_input.reverse();
        let reversed = run_batch(reversed_input, 1, worker, |_, _| {}).await;

        for result in &forward.results {
            let twin = reversed
                .results
                .iter()
                .find(|other| other.id() == result.id())
                .expect("id present in both runs");
            assert_eq!(result.is_success(), twin.is_success());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn progress_is_monotonic_and_reaches_total_once() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_ref = Arc::clone(&calls);

        run_batch(
            items(9),
            3,
            |item: WorkItem| async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                ItemResult::Success {
                    id: item.id,
                    b64: String::new(),
                    mime: IMAGE_MIME_PNG,
                }
            },
            move |done, total| {
                calls_ref.lock().unwrap().push((done, total));
            },
        )
        .await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 9);
        let mut previous = 0;
        for (done, total) in calls.iter() {
            assert_eq!(*total, 9);
            assert!(*done > previous);
            previous = *done;
        }
        assert_eq!(calls.iter().filter(|(done, _)| *done == 9).count(), 1);
    }
}
