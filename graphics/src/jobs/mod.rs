//! Asynchronous recording jobs.
//!
//! A job records into a private [`Substream`](crate::stream::Substream) that was
//! spliced into its parent stream when the job was pushed. Jobs are not awaited
//! individually; the [`JobTracker`] only reports when *all* outstanding jobs are
//! done, which is what `Renderer::wait_for_command_setup` blocks on.
//!
//! ```text
//! push_job("shadows", f)
//!     │  create_substream()   ──► splice position fixed now
//!     │  create_link_id()
//!     └► executor.spawn(job) ──► worker: begin block, f(sub), end block
//!                                        drop(sub), drop(ticket)
//! ```

mod worker_pool;

pub use worker_pool::WorkerPool;

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::profiling::{create_link_id, profile_scope_dynamic};
use crate::stream::DrawStream;

/// A unit of work handed to a [`JobExecutor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Facility that eventually runs every job exactly once.
///
/// Executors give no per-job completion notification.
pub trait JobExecutor: Send + Sync {
    fn spawn(&self, job: Job);
}

/// Runs every job immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl JobExecutor for InlineExecutor {
    fn spawn(&self, job: Job) {
        job();
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    pending: Mutex<usize>,
    idle: Condvar,
}

/// Counts outstanding jobs.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    state: Arc<TrackerState>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. The job counts as outstanding until the ticket drops.
    pub fn begin(&self) -> JobTicket {
        *self.state.pending.lock() += 1;
        JobTicket {
            state: self.state.clone(),
        }
    }

    /// Number of outstanding jobs.
    pub fn pending(&self) -> usize {
        *self.state.pending.lock()
    }

    /// Block until no job is outstanding.
    pub fn wait_idle(&self) {
        let mut pending = self.state.pending.lock();
        while *pending > 0 {
            self.state.idle.wait(&mut pending);
        }
    }
}

/// Proof of an outstanding job; completes the job when dropped.
#[derive(Debug)]
pub struct JobTicket {
    state: Arc<TrackerState>,
}

impl Drop for JobTicket {
    fn drop(&mut self) {
        let mut pending = self.state.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.state.idle.notify_all();
        }
    }
}

/// Executor plus tracker: spawns recording jobs into sub-streams.
#[derive(Clone)]
pub struct JobSystem {
    executor: Arc<dyn JobExecutor>,
    tracker: JobTracker,
}

impl JobSystem {
    pub fn new(executor: Arc<dyn JobExecutor>) -> Self {
        Self {
            executor,
            tracker: JobTracker::new(),
        }
    }

    /// Record `f` into a new sub-stream of `stream`, asynchronously.
    ///
    /// The commands `f` records land at the current write position of
    /// `stream`, however late the job actually runs. With a `name`, the job
    /// runs inside a profiler scope and its commands are wrapped in a stream
    /// profile block sharing a fresh link id.
    pub fn push<F>(&self, stream: &mut DrawStream, name: Option<&'static str>, f: F)
    where
        F: FnOnce(&mut DrawStream) + Send + 'static,
    {
        let substream = stream.create_substream();
        let link = name.map(|name| (name, create_link_id()));
        let ticket = self.tracker.begin();

        self.executor.spawn(Box::new(move || {
            {
                let mut sub = substream.lock();
                match link {
                    Some((name, link)) => {
                        profile_scope_dynamic!(name);
                        sub.begin_profile_block(name, link, false);
                        f(&mut sub);
                        sub.end_profile_block();
                    }
                    None => f(&mut sub),
                }
            }

            // The sub-stream must be released before the job counts as done
            drop(substream);
            drop(ticket);
        }));
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Block until every pushed job has finished recording.
    pub fn wait_idle(&self) {
        self.tracker.wait_idle();
    }
}

impl std::fmt::Debug for JobSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSystem")
            .field("pending", &self.tracker.pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::DrawCommand;

    fn firsts(stream: DrawStream) -> Vec<u32> {
        stream
            .finalize()
            .unwrap()
            .commands()
            .filter_map(|c| match c {
                DrawCommand::DrawArrays { first, .. } => Some(*first),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_tracker_counts_tickets() {
        let tracker = JobTracker::new();
        let a = tracker.begin();
        let b = tracker.begin();
        assert_eq!(tracker.pending(), 2);
        drop(a);
        assert_eq!(tracker.pending(), 1);
        drop(b);
        tracker.wait_idle();
    }

    #[test]
    fn test_inline_jobs_keep_position() {
        let jobs = JobSystem::new(Arc::new(InlineExecutor));
        let mut stream = DrawStream::new();

        stream.draw_arrays(0, 1);
        jobs.push(&mut stream, None, |s| s.draw_arrays(1, 1));
        stream.draw_arrays(2, 1);

        jobs.wait_idle();
        assert_eq!(firsts(stream), vec![0, 1, 2]);
    }

    #[test]
    fn test_named_job_wraps_profile_block() {
        let jobs = JobSystem::new(Arc::new(InlineExecutor));
        let mut stream = DrawStream::new();
        jobs.push(&mut stream, Some("shadows"), |s| s.draw_arrays(0, 3));

        let merged = stream.finalize().unwrap();
        let commands: Vec<DrawCommand> = merged.commands().copied().collect();
        assert_eq!(commands.len(), 3);
        assert!(matches!(
            commands[0],
            DrawCommand::BeginProfileBlock { name: "shadows", link, .. } if link > 0
        ));
        assert_eq!(commands[2], DrawCommand::EndProfileBlock);
    }

    #[test]
    fn test_worker_jobs_merge_deterministically() {
        let pool = WorkerPool::new(4).unwrap();
        let jobs = JobSystem::new(Arc::new(pool));
        let mut stream = DrawStream::new();

        for job in 0..16u32 {
            jobs.push(&mut stream, None, move |s| {
                // Later jobs finish first
                std::thread::sleep(std::time::Duration::from_micros(((16 - job) * 50) as u64));
                s.draw_arrays(job * 2, 1);
                s.draw_arrays(job * 2 + 1, 1);
            });
        }

        jobs.wait_idle();
        assert_eq!(jobs.tracker().pending(), 0);
        assert_eq!(firsts(stream), (0..32).collect::<Vec<_>>());
    }
}
