// Bounded worker pool - a sized rayon pool runs the items, results come back to the caller's thread
use rayon::ThreadPoolBuilder;
use std::sync::mpsc;
use tracing::warn;

use crate::cancel::CancellationToken;
use crate::config::clamp_workers;

/// Results in input order. `None` marks items never started because of cancellation.
#[derive(Debug)]
pub struct PoolOutcome<R> {
    pub results: Vec<Option<R>>,
}

impl<R> PoolOutcome<R> {
    pub fn cancelled(&self) -> bool {
        self.results.iter().any(Option::is_none)
    }
}

/// Run `work` over `items` on at most `workers` threads.
///
/// `on_result` runs on the calling thread in completion order, so it can drive
/// progress reporting without any locking. Each item checks `cancel` before it
/// starts; items already running finish.
pub fn run_ordered<T, R, F, P>(
    items: &[T],
    workers: usize,
    cancel: &CancellationToken,
    work: F,
    mut on_result: P,
) -> PoolOutcome<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
    P: FnMut(usize, &R),
{
    let mut results: Vec<Option<R>> = items.iter().map(|_| None).collect();
    if items.is_empty() {
        return PoolOutcome { results };
    }

    let workers = clamp_workers(workers).min(items.len());
    let pool = match ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|idx| format!("pdfmeta-worker-{idx}"))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %e, "failed to build worker pool; running on the calling thread");
            for (index, item) in items.iter().enumerate() {
                if cancel.is_cancelled() {
                    break;
                }
                let result = work(item);
                on_result(index, &result);
                results[index] = Some(result);
            }
            return PoolOutcome { results };
        }
    };

    let (tx, rx) = mpsc::channel::<(usize, R)>();
    let work = &work;
    pool.in_place_scope(|scope| {
        for (index, item) in items.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                if cancel.is_cancelled() {
                    return;
                }
                // rx is drained until every sender has dropped
                let _ = tx.send((index, work(item)));
            });
        }
        drop(tx);

        for (index, result) in rx {
            on_result(index, &result);
            results[index] = Some(result);
        }
    });

    PoolOutcome { results }
}
