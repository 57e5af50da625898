// Copyright (c) 2026 the delayed-job authors. Licensed under the Apache License, Version 2.0.

//! The injected worker-pool capability. See [`Executor`] and [`TokioExecutor`].

use crate::error::SchedulingError;

/// A task handed to an [`Executor`]: runs `work`, to completion, on some background
/// thread.
pub type ExecutorTask = Box<dyn FnOnce() + Send + 'static>;

/// A worker pool that runs a submitted task on some background thread.
///
/// Opaque from the coordinator's point of view: no return value, no promised
/// parallelism beyond "runs on a thread that isn't the caller's". The coordinator submits
/// a small bootstrap task that records the worker, runs the job's `work` body
/// under `catch_unwind`, and performs the post-run state transition — never `work`
/// itself directly.
pub trait Executor: Send + Sync + 'static {
    /// Runs `task` on some background thread.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::ExecutorRejected`] if the executor cannot accept the
    /// submission (e.g. its backing runtime is shutting down). The job name is supplied
    /// by the caller for the diagnostic.
    fn submit(&self, job_name: &str, task: ExecutorTask) -> Result<(), SchedulingError>;
}

/// The production [`Executor`], built on [`tokio::task::spawn_blocking`].
///
/// `work` is an arbitrary, potentially blocking, side-effecting action — exactly
/// the kind of task `spawn_blocking` exists for: it runs on the blocking thread pool
/// rather than stealing a worker thread from the async runtime's reactor.
#[derive(Default)]
pub struct TokioExecutor;

impl TokioExecutor {
    /// Creates a new executor backed by the ambient `tokio` runtime's blocking pool.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Executor for TokioExecutor {
    fn submit(&self, job_name: &str, task: ExecutorTask) -> Result<(), SchedulingError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            SchedulingError::ExecutorRejected {
                job: job_name.to_string(),
            }
        })?;
        handle.spawn_blocking(task);
        Ok(())
    }
}
