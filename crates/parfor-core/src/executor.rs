//! Spawn-and-join parallel for loops over inclusive index ranges.
//!
//! Every call partitions its range into contiguous blocks, runs the callback on
//! one thread per block, and joins them all before returning. Threads are not
//! pooled; a call owns its workers for exactly its own lifetime.

use std::cell::UnsafeCell;
use std::panic;
use std::sync::{Mutex, PoisonError};
use std::thread;

use crate::console::{self, ConsoleGuard};

/// Parallel loop executor with a fixed default worker count.
///
/// The result lock is per-instance, so independent executors never contend in
/// [`with_result_lock`](Self::with_result_lock). Console output goes through a
/// single process-wide lock shared by every instance, see [`crate::console`].
pub struct ParallelExecutor {
    threads: usize,
    result_lock: Mutex<()>,
}

impl ParallelExecutor {
    /// Create an executor defaulting to the number of logical cores.
    ///
    /// Falls back to a single worker when the core count cannot be detected.
    pub fn new() -> Self {
        Self::with_threads(num_cpus::get().max(1))
    }

    /// Create an executor with an explicit default worker count.
    ///
    /// Panics if `threads` is zero.
    pub fn with_threads(threads: usize) -> Self {
        assert!(threads > 0, "at least one thread is necessary");
        Self {
            threads,
            result_lock: Mutex::new(()),
        }
    }

    /// Default worker count used when a call gives no override.
    pub fn default_threads(&self) -> usize {
        self.threads
    }

    /// Run `callback` once for every index in `[begin, end]` (both inclusive),
    /// using the instance default worker count.
    ///
    /// See [`parallel_for_with`](Self::parallel_for_with).
    pub fn parallel_for<F>(&self, begin: usize, end: usize, callback: F)
    where
        F: Fn(usize) + Sync,
    {
        self.parallel_for_with(begin, end, self.threads, callback);
    }

    /// Run `callback` once for every index in `[begin, end]` (both inclusive)
    /// on up to `threads` workers, overriding the instance default for this
    /// call only.
    ///
    /// The range is split into contiguous blocks whose sizes differ by at most
    /// one, worker 0 taking the lowest indices. The worker count is clamped to
    /// the index span, so no thread ever starts with zero assigned work; when a
    /// single worker remains the callback runs on the calling thread in
    /// increasing index order and nothing is spawned. The call blocks until
    /// every invocation has finished.
    ///
    /// Workers may call back into the executor, including nested
    /// `parallel_for` calls; the inner call partitions and joins on its own.
    ///
    /// If a callback panics, all workers are still joined and the panic is then
    /// re-raised on the calling thread. When several workers panic
    /// concurrently, one payload is re-raised and the rest are dropped.
    ///
    /// Panics if `end < begin` or if `threads` is zero.
    pub fn parallel_for_with<F>(&self, begin: usize, end: usize, threads: usize, callback: F)
    where
        F: Fn(usize) + Sync,
    {
        assert!(begin <= end, "no index range given");
        let span = end - begin + 1;
        let workers = threads.min(span);
        assert!(workers > 0, "at least one thread is necessary");

        if workers == 1 {
            for index in begin..=end {
                callback(index);
            }
            return;
        }

        let callback = &callback;
        thread::scope(|scope| {
            let handles: Vec<_> = split_blocks(begin, end, workers)
                .into_iter()
                .map(|(lo, hi)| {
                    scope.spawn(move || {
                        for index in lo..=hi {
                            callback(index);
                        }
                    })
                })
                .collect();

            // Join everything before surfacing a failure so no worker outlives
            // the call.
            let mut first_panic = None;
            for handle in handles {
                if let Err(payload) = handle.join() {
                    first_panic.get_or_insert(payload);
                }
            }
            if let Some(payload) = first_panic {
                panic::resume_unwind(payload);
            }
        });
    }

    /// Run `callback` while holding this instance's result lock.
    ///
    /// At most one thread per executor executes inside such a section at a
    /// time; the rest block until the lock is free. The lock is released on
    /// every exit path; a panicking callback poisons nothing for later
    /// callers.
    pub fn with_result_lock<R>(&self, callback: impl FnOnce() -> R) -> R {
        let _guard = self
            .result_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        callback()
    }

    /// Write one line to stdout under the process-wide console lock, see
    /// [`console::write`].
    pub fn write(&self, message: &str) {
        console::write(message);
    }

    /// Hold the console lock for several chained writes, see
    /// [`console::console_lock`].
    pub fn console(&self) -> ConsoleGuard {
        console::console_lock()
    }
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulator cell for state shared across workers.
///
/// The cell itself synchronizes nothing: every [`get_mut`](Self::get_mut) call
/// must happen inside a critical section that serializes access to the cell,
/// normally [`ParallelExecutor::with_result_lock`]. In return the shared state
/// needs no lock of its own.
pub struct ResultCell<T>(UnsafeCell<T>);

// Mutation is serialized by the caller's lock discipline.
unsafe impl<T: Send> Sync for ResultCell<T> {}

impl<T> ResultCell<T> {
    pub fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Mutable access to the shared state.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock that serializes access to this cell for
    /// the whole lifetime of the returned reference.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self) -> &mut T {
        &mut *self.0.get()
    }

    /// Unwrap the cell once no worker can touch it anymore.
    pub fn into_inner(self) -> T {
        self.0.into_inner()
    }
}

/// Split `[begin, end]` into `workers` contiguous blocks whose sizes differ by
/// at most one. The first `span % workers` blocks take the extra index.
fn split_blocks(begin: usize, end: usize, workers: usize) -> Vec<(usize, usize)> {
    let span = end - begin + 1;
    let base = span / workers;
    let extra = span % workers;

    let mut blocks = Vec::with_capacity(workers);
    let mut next = begin;
    for worker in 0..workers {
        let len = if worker < extra { base + 1 } else { base };
        blocks.push((next, next + len - 1));
        next += len;
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_split_blocks_one_index_per_worker() {
        let blocks = split_blocks(0, 11, 12);
        assert_eq!(blocks.len(), 12);
        for (worker, &(lo, hi)) in blocks.iter().enumerate() {
            assert_eq!((lo, hi), (worker, worker));
        }
    }

    #[test]
    fn test_split_blocks_uneven_rest() {
        // 38 indices over 12 workers: two blocks of 4, then ten blocks of 3.
        let blocks = split_blocks(0, 37, 12);
        assert_eq!(blocks[0], (0, 3));
        assert_eq!(blocks[1], (4, 7));
        assert_eq!(blocks[2], (8, 10));
        assert_eq!(blocks[3], (11, 13));
        assert_eq!(blocks[11], (35, 37));
    }

    #[test]
    fn test_split_blocks_contiguous_and_balanced() {
        for &(begin, end, workers) in &[(0, 99, 7), (5, 5, 1), (10, 47, 12), (3, 1002, 16)] {
            let blocks = split_blocks(begin, end, workers);
            assert_eq!(blocks.len(), workers);
            assert_eq!(blocks[0].0, begin);
            assert_eq!(blocks[workers - 1].1, end);
            let mut sizes = Vec::new();
            for window in blocks.windows(2) {
                assert_eq!(window[0].1 + 1, window[1].0);
            }
            for &(lo, hi) in &blocks {
                assert!(lo <= hi);
                sizes.push(hi - lo + 1);
            }
            let min = sizes.iter().min().unwrap();
            let max = sizes.iter().max().unwrap();
            assert!(max - min <= 1);
        }
    }

    #[test]
    fn test_every_index_runs_exactly_once() {
        let pe = ParallelExecutor::with_threads(7);
        let counts: Vec<AtomicUsize> = (0..100).map(|_| AtomicUsize::new(0)).collect();

        pe.parallel_for(0, 99, |i| {
            counts[i].fetch_add(1, Ordering::Relaxed);
        });

        assert!(counts.iter().all(|c| c.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_barrier_all_work_done_on_return() {
        let pe = ParallelExecutor::with_threads(8);
        let done = AtomicUsize::new(0);

        pe.parallel_for(0, 999, |_| {
            done.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(done.load(Ordering::Relaxed), 1000);
    }

    #[test]
    fn test_single_worker_runs_in_order() {
        let pe = ParallelExecutor::with_threads(1);
        let seen = Mutex::new(Vec::new());

        pe.parallel_for(3, 12, |i| {
            seen.lock().unwrap().push(i);
        });

        assert_eq!(*seen.lock().unwrap(), (3..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_worker_count_clamped_to_span() {
        // 4 indices on 64 requested threads must still cover every index once.
        let pe = ParallelExecutor::with_threads(2);
        let counts: Vec<AtomicUsize> = (0..4).map(|_| AtomicUsize::new(0)).collect();

        pe.parallel_for_with(0, 3, 64, |i| {
            counts[i].fetch_add(1, Ordering::Relaxed);
        });

        assert!(counts.iter().all(|c| c.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_result_lock_serializes_nonatomic_counter() {
        let pe = ParallelExecutor::with_threads(8);
        let counter = ResultCell::new(0u64);

        pe.parallel_for(0, 999, |_| {
            pe.with_result_lock(|| {
                let n = unsafe { counter.get_mut() };
                *n += 1;
            });
        });

        assert_eq!(counter.into_inner(), 1000);
    }

    #[test]
    fn test_result_lock_returns_value() {
        let pe = ParallelExecutor::with_threads(2);
        assert_eq!(pe.with_result_lock(|| 41 + 1), 42);
    }

    #[test]
    fn test_result_lock_survives_panicking_section() {
        let pe = ParallelExecutor::with_threads(2);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pe.with_result_lock(|| panic!("section failed"));
        }));
        assert!(outcome.is_err());

        // Later sections must still run.
        assert_eq!(pe.with_result_lock(|| 7), 7);
    }

    #[test]
    fn test_nested_parallel_for() {
        let pe = ParallelExecutor::with_threads(4);
        let done = AtomicUsize::new(0);

        pe.parallel_for(0, 3, |_| {
            pe.parallel_for_with(0, 9, 2, |_| {
                done.fetch_add(1, Ordering::Relaxed);
            });
        });

        assert_eq!(done.load(Ordering::Relaxed), 40);
    }

    #[test]
    #[should_panic(expected = "workload exploded")]
    fn test_worker_panic_reaches_caller() {
        let pe = ParallelExecutor::with_threads(4);
        pe.parallel_for(0, 99, |i| {
            if i == 57 {
                panic!("workload exploded");
            }
        });
    }

    #[test]
    fn test_all_workers_join_before_panic_propagates() {
        let pe = ParallelExecutor::with_threads(4);
        let done = AtomicUsize::new(0);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pe.parallel_for(0, 99, |i| {
                if i == 99 {
                    panic!("last index failed");
                }
                done.fetch_add(1, Ordering::Relaxed);
            });
        }));

        assert!(outcome.is_err());
        // Every other index still ran; the failing call joined all workers.
        assert_eq!(done.load(Ordering::Relaxed), 99);
    }

    #[test]
    #[should_panic(expected = "at least one thread")]
    fn test_zero_default_threads_rejected() {
        let _ = ParallelExecutor::with_threads(0);
    }

    #[test]
    #[should_panic(expected = "at least one thread")]
    fn test_zero_override_threads_rejected() {
        let pe = ParallelExecutor::with_threads(4);
        pe.parallel_for_with(0, 9, 0, |_| {});
    }

    #[test]
    #[should_panic(expected = "no index range")]
    fn test_empty_range_rejected() {
        let pe = ParallelExecutor::with_threads(4);
        pe.parallel_for(5, 4, |_| {});
    }

    #[test]
    fn test_default_executor_has_workers() {
        assert!(ParallelExecutor::default().default_threads() >= 1);
    }
}
