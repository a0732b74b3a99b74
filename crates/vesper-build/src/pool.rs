//! Worker pool with completion-order draining
//!
//! Jobs are posted to a rayon pool and report back over a channel, so the
//! orchestrator thread only ever waits for "the next job to finish".
//! Sequential mode runs the same jobs on the calling thread, last
//! submitted first, as each result is requested.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};

use crate::{BuildConfig, ExecutionMode, Result};

pub type Job<R> = Box<dyn FnOnce() -> R + Send + 'static>;

/// A job that panicked instead of producing a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPanic {
    pub message: String,
}

/// One finished job
#[derive(Debug)]
pub struct Completed<R> {
    /// Submission index of the job
    pub index: usize,
    pub outcome: std::result::Result<R, WorkerPanic>,
}

pub struct WorkerPool {
    pool: Option<rayon::ThreadPool>,
}

impl WorkerPool {
    pub fn new(config: &BuildConfig) -> Result<Self> {
        match config.execution {
            ExecutionMode::Sequential => Ok(Self::sequential()),
            ExecutionMode::Concurrent => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(config.worker_count())
                    .thread_name(|i| format!("vesper-worker-{}", i))
                    .build()?;
                Ok(Self { pool: Some(pool) })
            }
        }
    }

    pub fn sequential() -> Self {
        Self { pool: None }
    }

    pub fn is_sequential(&self) -> bool {
        self.pool.is_none()
    }

    /// Start every job; results come back in completion order
    pub fn run<R: Send + 'static>(&self, jobs: Vec<Job<R>>) -> Completions<R> {
        let total = jobs.len();
        let pending = match &self.pool {
            None => Pending::Sequential(jobs),
            Some(pool) => {
                let (tx, rx) = mpsc::channel();
                for (index, job) in jobs.into_iter().enumerate() {
                    let tx = tx.clone();
                    pool.spawn(move || {
                        let outcome = run_caught(job);
                        // The receiver only goes away when the caller stopped draining
                        let _ = tx.send(Completed { index, outcome });
                    });
                }
                Pending::Channel(rx)
            }
        };
        Completions {
            pending,
            total,
            drained: 0,
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.pool.as_ref().map(|p| p.current_num_threads()))
            .finish()
    }
}

enum Pending<R> {
    Channel(Receiver<Completed<R>>),
    Sequential(Vec<Job<R>>),
}

/// Iterator over finished jobs
pub struct Completions<R> {
    pending: Pending<R>,
    total: usize,
    drained: usize,
}

impl<R> Completions<R> {
    pub fn total(&self) -> usize {
        self.total
    }

    /// Results handed out so far
    pub fn drained(&self) -> usize {
        self.drained
    }
}

impl<R> Iterator for Completions<R> {
    type Item = Completed<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.drained == self.total {
            return None;
        }
        let completed = match &mut self.pending {
            Pending::Channel(rx) => rx.recv().ok()?,
            Pending::Sequential(jobs) => {
                let job = jobs.pop()?;
                Completed {
                    index: jobs.len(),
                    outcome: run_caught(job),
                }
            }
        };
        self.drained += 1;
        Some(completed)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.drained;
        (left, Some(left))
    }
}

fn run_caught<R>(job: Job<R>) -> std::result::Result<R, WorkerPanic> {
    panic::catch_unwind(AssertUnwindSafe(job)).map_err(|payload| WorkerPanic {
        message: panic_message(payload.as_ref()),
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
