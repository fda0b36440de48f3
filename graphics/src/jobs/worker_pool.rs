//! Fixed-size pool of worker threads fed through a channel.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::profiling::set_thread_name;

use super::{Job, JobExecutor};

/// A pool of named worker threads pulling jobs from a shared queue.
///
/// Dropping the pool closes the queue; workers finish every queued job and
/// are joined.
///
/// # Example
///
/// ```
/// use kiln_graphics::jobs::{JobExecutor, WorkerPool};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let counter = Arc::new(AtomicU32::new(0));
/// let pool = WorkerPool::new(2).unwrap();
/// for _ in 0..8 {
///     let counter = counter.clone();
///     pool.spawn(Box::new(move || {
///         counter.fetch_add(1, Ordering::Relaxed);
///     }));
/// }
/// drop(pool);
/// assert_eq!(counter.load(Ordering::Relaxed), 8);
/// ```
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `num_threads` workers (at least one).
    pub fn new(num_threads: usize) -> std::io::Result<Self> {
        let num_threads = num_threads.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let workers = (0..num_threads)
            .map(|index| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("kiln-worker-{index}"))
                    .spawn(move || {
                        set_thread_name!("kiln-worker");

                        while let Ok(job) = receiver.recv() {
                            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                                log::error!("Job panicked on worker {}", index);
                            }
                        }
                    })
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        log::debug!("Started {} worker threads", num_threads);

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }
}

impl JobExecutor for WorkerPool {
    fn spawn(&self, job: Job) {
        let Some(sender) = &self.sender else {
            job();
            return;
        };

        if let Err(e) = sender.send(job) {
            // All workers are gone; run it here so it still executes once
            log::error!("Worker pool is not running, executing job inline");
            (e.into_inner())();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.workers.len())
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender = None;

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_runs_every_job_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.num_threads(), 3);

        for _ in 0..100 {
            let counter = counter.clone();
            pool.spawn(Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }));
        }
        drop(pool);

        assert_eq!(counter.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let counter = Arc::new(AtomicU32::new(0));
        let pool = WorkerPool::new(1).unwrap();

        pool.spawn(Box::new(|| panic!("job failure")));
        let c = counter.clone();
        pool.spawn(Box::new(move || {
            c.fetch_add(1, Ordering::Relaxed);
        }));
        drop(pool);

        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_zero_threads_clamped() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.num_threads(), 1);
    }
}
