//! Bounded worker pool with run-level cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Upper bound on analysis workers regardless of core count.
pub const MAX_WORKERS: usize = 32;

/// Shared abort flag. Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cores + 4 (git calls mostly wait on I/O), capped at [`MAX_WORKERS`].
pub fn default_workers() -> usize {
    let cores = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cores + 4).min(MAX_WORKERS)
}

/// Apply `task` to every item on at most `workers` threads.
///
/// The returned vector is in input order regardless of completion order.
/// Once `cancel` fires no new item is started; items that never ran are
/// `None`, in-flight ones finish normally.
pub fn run_bounded<T, R, F>(items: &[T], workers: usize, cancel: &CancelToken, task: F) -> Vec<Option<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, items.len());

    // Use indexed results to preserve input order in output
    let next = AtomicUsize::new(0);
    let results: Mutex<Vec<(usize, R)>> = Mutex::new(Vec::with_capacity(items.len()));

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                if cancel.is_cancelled() {
                    break;
                }
                let idx = next.fetch_add(1, Ordering::SeqCst);
                let Some(item) = items.get(idx) else {
                    break;
                };
                let result = task(item);
                results
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push((idx, result));
            });
        }
    });

    let mut indexed = results.into_inner().unwrap_or_else(|e| e.into_inner());
    indexed.sort_by_key(|(idx, _)| *idx);

    let mut ordered: Vec<Option<R>> = (0..items.len()).map(|_| None).collect();
    for (idx, result) in indexed {
        ordered[idx] = Some(result);
    }
    ordered
}
