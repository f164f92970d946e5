//! Bounded worker pool
//!
//! A fixed number of OS threads runs the submitted jobs. Results are handed
//! back in completion order and [`WorkerPool::run_all`] returns only once
//! every job has finished.

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::sync::mpsc;
use thiserror::Error;

/// Errors that can occur while creating a worker pool
#[derive(Debug, Error)]
pub enum WorkerPoolError {
    /// A pool needs at least one worker
    #[error("Worker pool needs at least one worker")]
    NoWorkers,

    /// The worker threads could not be spawned
    #[error("Failed to start worker threads: {0}")]
    SpawnFailed(#[from] ThreadPoolBuildError),
}

/// Fixed-size pool of worker threads
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Starts a pool running at most `workers` jobs at a time
    pub fn new(workers: usize) -> Result<Self, WorkerPoolError> {
        if workers == 0 {
            return Err(WorkerPoolError::NoWorkers);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("episode-worker-{}", index))
            .build()?;

        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `job` once per task and collects the results
    ///
    /// The returned vector is in completion order, not submission order.
    pub fn run_all<T, R, F>(&self, tasks: Vec<T>, job: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let (sender, receiver) = mpsc::channel();
        let job = &job;

        self.pool.scope(|scope| {
            for task in tasks {
                let sender = sender.clone();
                scope.spawn(move |_| {
                    // The receiver outlives the scope, so sending cannot fail
                    let _ = sender.send(job(task));
                });
            }
        });

        drop(sender);
        receiver.into_iter().collect()
    }
}
