// Copyright (c) 2026 the delayed-job authors. Licensed under the Apache License, Version 2.0.

//! Error types for the delayed job coordinator. See [`SchedulingError`].

/// The one fallible edge named by the coordinator's spec: an injected [`Ticker`] or
/// [`Executor`] rejecting a submission (back-pressure, e.g. the host `tokio` runtime
/// shutting down mid-call).
///
/// Everything else the coordinator does is infallible by construction: `terminate()`
/// always succeeds, `waitForTermination()` never raises a domain error, and a panic
/// inside `work` is caught and logged rather than propagated (see
/// [`crate::coordinator`]).
///
/// [`Ticker`]: crate::ticker::Ticker
/// [`Executor`]: crate::executor::Executor
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SchedulingError {
    /// The [`Ticker`] could not arm a firing for this job.
    ///
    /// [`Ticker`]: crate::ticker::Ticker
    #[error("ticker rejected submission for job {job}")]
    #[diagnostic(
        code(delayed_job::ticker_rejected),
        help("the ticker's backing runtime may be shutting down; the coordinator falls \
              back to Idle so the next trigger can re-arm")
    )]
    TickerRejected {
        /// Diagnostic label of the job whose submission was rejected.
        job: String,
    },

    /// The [`Executor`] could not run the job's work body.
    ///
    /// [`Executor`]: crate::executor::Executor
    #[error("executor rejected submission for job {job}")]
    #[diagnostic(
        code(delayed_job::executor_rejected),
        help("the executor's backing runtime may be shutting down; the coordinator falls \
              back to Idle so the next trigger can re-arm")
    )]
    ExecutorRejected {
        /// Diagnostic label of the job whose submission was rejected.
        job: String,
    },
}
