// Copyright (c) 2026 the delayed-job authors. Licensed under the Apache License, Version 2.0.

//! A delayed, deduplicating background-job coordinator.
//!
//! [`DelayedJob`] collapses any number of [`trigger_execution`](DelayedJob::trigger_execution)
//! calls arriving within an aggregation window into exactly one future run of a
//! user-supplied `work` closure, guarantees at most one run of that closure in flight at a
//! time, and supports deterministic, cooperative termination.
//!
//! ```no_run
//! use delayed_job::DelayedJob;
//! use std::time::Duration;
//!
//! let job = DelayedJob::with_tokio_defaults(
//!     "rebuild-index",
//!     Duration::from_millis(200),
//!     |_cancel| {
//!         // ... do the debounced work ...
//!     },
//! );
//!
//! job.trigger_execution();
//! job.trigger_execution(); // coalesces with the call above
//! # job.terminate();
//! # job.wait_for_termination(Duration::from_secs(1));
//! ```
//!
//! The [`Ticker`] and [`Executor`] traits are the coordinator's only two external
//! dependencies — a delayed-scheduling capability and a worker-pool capability,
//! respectively — both injected at construction so the state machine in
//! [`coordinator`] can be exercised deterministically in tests without real time or
//! real threads.

mod coordinator;
mod error;
pub mod executor;
pub mod logging;
mod state;
pub mod ticker;

pub use coordinator::{DelayedJob, Work};
pub use error::SchedulingError;
pub use executor::{Executor, TokioExecutor};
pub use state::JobState;
pub use ticker::{Ticker, TickerKey, TokioTicker};
