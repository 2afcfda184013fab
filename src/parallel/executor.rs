use anyhow::{Result, anyhow};
use crossbeam::channel::{Receiver, Sender, bounded};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded pool of scoped worker threads fed through a crossbeam channel.
///
/// Work items are claimed one at a time; results come back in completion order.
pub struct ParallelExecutor<T, R> {
    max_workers: usize,
    buffer_size: usize,
    _phantom: std::marker::PhantomData<fn(T) -> R>,
}

/// Everything a worker thread needs, bundled to keep the spawn site readable
struct WorkerContext<'a, T, R, F, P> {
    worker_id: usize,
    work_rx: Receiver<T>,
    result_tx: Sender<R>,
    completed: &'a AtomicUsize,
    total_items: usize,
    processor: &'a F,
    progress_reporter: Option<&'a P>,
}

impl<T, R> ParallelExecutor<T, R>
where
    T: Send,
    R: Send,
{
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            max_workers,
            buffer_size: max_workers * 2,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Run `processor` over every item with at most `max_workers` threads.
    ///
    /// The processor and reporter are borrowed by the scoped threads, so they
    /// may capture references from the caller. A panicking worker turns the
    /// whole call into an error once every thread has been joined.
    pub fn execute<F, P>(
        &self,
        work_items: Vec<T>,
        processor: F,
        progress_reporter: Option<P>,
    ) -> Result<Vec<R>>
    where
        F: Fn(&T, usize) -> R + Sync,
        P: Fn(usize, usize, usize) + Sync, // (completed, total, worker_id)
    {
        if work_items.is_empty() {
            return Ok(Vec::new());
        }

        let total_items = work_items.len();
        let actual_workers = self.max_workers.min(total_items);
        let (work_tx, work_rx): (Sender<T>, Receiver<T>) = bounded(self.buffer_size);
        let (result_tx, result_rx): (Sender<R>, Receiver<R>) = bounded(self.buffer_size);
        let completed = AtomicUsize::new(0);

        crossbeam::thread::scope(|s| {
            for worker_id in 0..actual_workers {
                let ctx = WorkerContext {
                    worker_id,
                    work_rx: work_rx.clone(),
                    result_tx: result_tx.clone(),
                    completed: &completed,
                    total_items,
                    processor: &processor,
                    progress_reporter: progress_reporter.as_ref(),
                };

                s.spawn(move |_| Self::worker_thread(ctx));
            }

            // Only workers may hold the receiving end, so the producer stops
            // instead of blocking if every worker is gone
            drop(work_rx);
            drop(result_tx);

            s.spawn(move |_| {
                for work_item in work_items {
                    if work_tx.send(work_item).is_err() {
                        break;
                    }
                }
            });

            Self::collect_results(result_rx, total_items)
        })
        .map_err(|payload| anyhow!("worker thread panicked: {}", panic_message(&*payload)))
    }

    fn worker_thread<F, P>(ctx: WorkerContext<'_, T, R, F, P>)
    where
        F: Fn(&T, usize) -> R,
        P: Fn(usize, usize, usize),
    {
        while let Ok(work_item) = ctx.work_rx.recv() {
            let result = (ctx.processor)(&work_item, ctx.worker_id);

            if ctx.result_tx.send(result).is_err() {
                break;
            }

            let current = ctx.completed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(reporter) = ctx.progress_reporter {
                reporter(current, ctx.total_items, ctx.worker_id);
            }
        }
    }

    fn collect_results(result_rx: Receiver<R>, total_items: usize) -> Vec<R> {
        let mut results = Vec::with_capacity(total_items);

        while let Ok(result) = result_rx.recv() {
            results.push(result);
            if results.len() >= total_items {
                break;
            }
        }

        results
    }
}

/// Runs every item on the calling thread, in order
pub struct SequentialExecutor;

impl SequentialExecutor {
    pub fn execute<T, R, F, P>(work_items: Vec<T>, processor: F, progress_reporter: Option<P>) -> Vec<R>
    where
        F: Fn(&T, usize) -> R,
        P: Fn(usize, usize, usize),
    {
        let total_items = work_items.len();
        let mut results = Vec::with_capacity(total_items);

        for (index, work_item) in work_items.iter().enumerate() {
            results.push(processor(work_item, 0));

            if let Some(reporter) = &progress_reporter {
                reporter(index + 1, total_items, 0);
            }
        }

        results
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    /// Sequential for a single worker, parallel otherwise
    pub fn for_workers(workers: usize) -> Self {
        if workers <= 1 {
            Self::Sequential
        } else {
            Self::Parallel { workers }
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Parallel { workers } => *workers,
        }
    }

    /// Execute with the chosen strategy. Panics are reported as errors in both modes.
    pub fn execute<T, R, F, P>(
        &self,
        work_items: Vec<T>,
        processor: F,
        progress_reporter: Option<P>,
    ) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(&T, usize) -> R + Sync,
        P: Fn(usize, usize, usize) + Sync,
    {
        match self {
            Self::Sequential => panic::catch_unwind(AssertUnwindSafe(|| {
                SequentialExecutor::execute(work_items, processor, progress_reporter)
            }))
            .map_err(|payload| anyhow!("worker panicked: {}", panic_message(&*payload))),
            Self::Parallel { workers } => {
                ParallelExecutor::new(*workers).execute(work_items, processor, progress_reporter)
            }
        }
    }

    /// Worker ceiling from the host's cores and the user's limits.
    ///
    /// `thread_percentage` of the available cores (at least one), further capped
    /// by `max_threads_config` unless that is 0.
    pub fn calculate_optimal_workers(max_threads_config: usize, thread_percentage: u8) -> usize {
        let available_cores = num_cpus::get();
        let workers_by_percentage = ((available_cores * thread_percentage as usize) / 100).max(1);

        if max_threads_config > 0 {
            max_threads_config.min(workers_by_percentage)
        } else {
            workers_by_percentage
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_sequential_executor() {
        let results = SequentialExecutor::execute(
            vec![1, 2, 3, 4, 5],
            |x, _worker_id| x * 2,
            None::<fn(usize, usize, usize)>,
        );
        assert_eq!(results, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_parallel_executor() {
        let executor = ParallelExecutor::new(3);
        let mut results = executor
            .execute((0..20).collect(), |x, _worker_id| x * 2, None::<fn(usize, usize, usize)>)
            .unwrap();

        results.sort();
        assert_eq!(results, (0..20).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_processor_may_borrow_from_caller() {
        let offset = String::from("chunk_");
        let results = ExecutionStrategy::Parallel { workers: 2 }
            .execute(vec![0, 1], |i, _| format!("{offset}{i}"), None::<fn(usize, usize, usize)>)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.starts_with("chunk_")));
    }

    #[test]
    fn test_progress_reaches_total() {
        let seen = Mutex::new(Vec::new());
        ExecutionStrategy::Parallel { workers: 4 }
            .execute(
                (0..9).collect::<Vec<u32>>(),
                |x, _| *x,
                Some(|current: usize, total: usize, _worker: usize| {
                    seen.lock().unwrap().push((current, total));
                }),
            )
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 9);
        assert!(seen.contains(&(9, 9)));
    }

    #[test]
    fn test_parallel_panic_is_an_error() {
        let result = ExecutionStrategy::Parallel { workers: 2 }.execute(
            vec![1, 2, 3],
            |x, _| {
                if *x == 2 {
                    panic!("bad chunk");
                }
                *x
            },
            None::<fn(usize, usize, usize)>,
        );

        let err = result.unwrap_err();
        assert!(err.to_string().contains("bad chunk"));
    }

    #[test]
    fn test_sequential_panic_is_an_error() {
        let result = ExecutionStrategy::Sequential.execute(
            vec![1],
            |_: &i32, _| -> i32 { panic!("boom") },
            None::<fn(usize, usize, usize)>,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_strategy_for_workers() {
        assert_eq!(ExecutionStrategy::for_workers(0), ExecutionStrategy::Sequential);
        assert_eq!(ExecutionStrategy::for_workers(1), ExecutionStrategy::Sequential);
        assert_eq!(
            ExecutionStrategy::for_workers(4),
            ExecutionStrategy::Parallel { workers: 4 }
        );
    }

    #[test]
    fn test_optimal_workers_respects_limits() {
        assert!(ExecutionStrategy::calculate_optimal_workers(0, 100) >= 1);
        assert!(ExecutionStrategy::calculate_optimal_workers(0, 1) >= 1);
        assert_eq!(ExecutionStrategy::calculate_optimal_workers(1, 100), 1);
    }
}
