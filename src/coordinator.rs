// Copyright (c) 2026 the delayed-job authors. Licensed under the Apache License, Version 2.0.

//! The delayed, deduplicating job coordinator. See [`DelayedJob`].

use crate::{
    executor::{Executor, TokioExecutor},
    state::{JobState, Phase},
    ticker::{Ticker, TickerKey, TokioTicker},
};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

/// The user-supplied side-effecting action a [`DelayedJob`] coalesces triggers into.
///
/// Takes a [`CancellationToken`] so it can cooperatively observe a [`terminate`]-triggered
/// interrupt — checking it (or passing it through to a blocking primitive that can) is what
/// lets a run in progress exit promptly instead of running to its own completion. See
/// `DESIGN.md` for the reasoning behind widening `work`'s signature to carry this.
///
/// [`terminate`]: DelayedJob::terminate
pub type Work = Arc<dyn Fn(&CancellationToken) + Send + Sync + 'static>;

/// A delayed, deduplicating background-job coordinator.
///
/// Collapses any number of [`trigger_execution`] calls arriving within an aggregation
/// delay into exactly one future run of `work`, on the injected [`Executor`], never
/// overlapping two runs of the same job, with deterministic [`terminate`] and bounded
/// [`wait_for_termination`].
///
/// Cheap to clone — internally an `Arc` handle, the way the RRT framework's
/// `SubscriberGuard` and this crate's own [`TokioTicker`] share state. Every clone
/// observes and mutates the same underlying job.
///
/// [`trigger_execution`]: Self::trigger_execution
/// [`terminate`]: Self::terminate
/// [`wait_for_termination`]: Self::wait_for_termination
#[derive(Clone)]
pub struct DelayedJob<T: Ticker = TokioTicker, E: Executor = TokioExecutor> {
    shared: Arc<Shared<T, E>>,
}

struct Shared<T: Ticker, E: Executor> {
    name: String,
    default_delay: Duration,
    work: Work,
    ticker: T,
    executor: E,
    ticker_key: TickerKey,
    phase: Mutex<Phase>,
    termination_signal: Condvar,
}

/// Recovers from mutex poisoning rather than propagating it.
///
/// A panic inside `work` can never poison this mutex — it's caught by [`catch_unwind`] in
/// [`Shared::run_and_complete`] before it can unwind across the lock. The only way to
/// poison it is a panic inside the coordinator's own transition logic, which would be a
/// bug in this crate; recovering keeps `terminate`/`wait_for_termination` usable instead of
/// cascading the panic to every caller.
fn recover<T>(result: Result<T, PoisonError<T>>) -> T {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl<T: Ticker, E: Executor> DelayedJob<T, E> {
    /// Constructs a new coordinator, idle, with no pending deadline and no worker.
    ///
    /// `default_delay` is the aggregation delay used by the zero-argument
    /// [`trigger_execution`]; it may be [`Duration::ZERO`].
    ///
    /// [`trigger_execution`]: Self::trigger_execution
    pub fn new(
        name: impl Into<String>,
        default_delay: Duration,
        ticker: T,
        executor: E,
        work: impl Fn(&CancellationToken) + Send + Sync + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                default_delay,
                work: Arc::new(work),
                ticker,
                executor,
                ticker_key: TickerKey::fresh(),
                phase: Mutex::new(Phase::Idle),
                termination_signal: Condvar::new(),
            }),
        }
    }

    /// Requests that `work` run soon, using [`default_delay`](Self::new)'s worth of
    /// aggregation.
    pub fn trigger_execution(&self) {
        self.trigger_execution_after(self.shared.default_delay);
    }

    /// Requests that `work` run no sooner than `delay` from now.
    ///
    /// N concurrent calls within an aggregation window collapse into exactly one
    /// execution. A call observed after [`terminate`] is a silent no-op.
    ///
    /// [`terminate`]: Self::terminate
    pub fn trigger_execution_after(&self, delay: Duration) {
        let now = Instant::now();
        let mut phase = recover(self.shared.phase.lock());

        match &mut *phase {
            Phase::Idle => {
                let deadline = now + delay;
                match self.shared.arm(delay) {
                    Ok(()) => *phase = Phase::Waiting { deadline },
                    Err(err) => tracing::warn!(job = %self.shared.name, error = %err, "ticker rejected initial arm; remaining idle"),
                }
            }
            Phase::Waiting { deadline } => {
                let candidate = now + delay;
                if candidate < *deadline {
                    match self.shared.arm(delay) {
                        Ok(()) => *deadline = candidate,
                        Err(err) => tracing::warn!(job = %self.shared.name, error = %err, "ticker rejected re-arm; keeping prior deadline"),
                    }
                }
                // candidate >= deadline: no-op, the pending firing already covers this.
            }
            Phase::Running { rearm_after_run, .. } => {
                *rearm_after_run = Some(match rearm_after_run {
                    Some(existing) => (*existing).min(delay),
                    None => delay,
                });
            }
            Phase::Terminating { .. } | Phase::Terminated => {
                // Absorbing: once terminating or terminated, every trigger is ignored.
            }
        }
    }

    /// Idempotently drives the coordinator toward [`JobState::Terminated`].
    ///
    /// From [`JobState::Idle`] or [`JobState::Waiting`], terminates immediately. From
    /// [`JobState::Running`], transitions to [`JobState::Terminating`] and signals the
    /// running worker's [`CancellationToken`]; the post-run transition completes
    /// termination once `work` cooperatively returns. Never blocks for the duration of
    /// `work` itself.
    pub fn terminate(&self) {
        let mut phase = recover(self.shared.phase.lock());
        match &*phase {
            Phase::Terminating { .. } | Phase::Terminated => return,
            Phase::Idle => {
                *phase = Phase::Terminated;
                drop(phase);
                self.shared.termination_signal.notify_all();
            }
            Phase::Waiting { .. } => {
                self.shared.ticker.cancel(&self.shared.ticker_key);
                *phase = Phase::Terminated;
                drop(phase);
                self.shared.termination_signal.notify_all();
            }
            Phase::Running { worker, .. } => {
                worker.cancel();
                let worker = worker.clone();
                *phase = Phase::Terminating { worker };
            }
        }
    }

    /// Blocks the caller up to `timeout` for the coordinator to reach
    /// [`JobState::Terminated`].
    ///
    /// Returns no status — call [`is_terminated`](Self::is_terminated) afterward to find
    /// out whether the deadline or the termination signal woke this call.
    pub fn wait_for_termination(&self, timeout: Duration) {
        let phase = recover(self.shared.phase.lock());
        let _ = recover(self.shared.termination_signal.wait_timeout_while(
            phase,
            timeout,
            |phase| !phase.is_terminated(),
        ));
    }

    /// Shorthand for `get_state() == JobState::Terminated`.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        recover(self.shared.phase.lock()).is_terminated()
    }

    /// A read-only snapshot of the current [`JobState`].
    #[must_use]
    pub fn get_state(&self) -> JobState {
        recover(self.shared.phase.lock()).snapshot()
    }

    /// Diagnostic label this job was constructed with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

impl<T: Ticker, E: Executor> Shared<T, E> {
    /// Arms the ticker to call back into [`Self::on_ticker_fire`] after `delay`.
    fn arm(self: &Arc<Self>, delay: Duration) -> Result<(), crate::error::SchedulingError> {
        let shared = Arc::clone(self);
        self.ticker
            .schedule(self.ticker_key, delay, Box::new(move || shared.on_ticker_fire()))
    }

    /// The ticker fire handler. Runs on whatever thread the ticker dispatches on; never
    /// runs `work` itself — only hands it off to the [`Executor`] and returns.
    fn on_ticker_fire(self: Arc<Self>) {
        let now = Instant::now();
        let mut phase = recover(self.phase.lock());

        // Discard a firing observed when we're not Waiting, or one that fired early
        // relative to the deadline it was armed for (a stale arm that a tighter re-arm
        // should have superseded but the ticker's dedup wasn't tight enough about).
        match &*phase {
            Phase::Waiting { deadline } if now >= *deadline => {}
            _ => return,
        }

        let worker = CancellationToken::new();
        *phase = Phase::Running {
            worker: worker.clone(),
            rearm_after_run: None,
        };
        drop(phase);

        let shared = Arc::clone(&self);
        let work = Arc::clone(&self.work);
        let job_name = self.name.clone();
        let submission = self.executor.submit(
            &job_name,
            Box::new(move || shared.run_and_complete(&work, &worker)),
        );

        if let Err(err) = submission {
            // The bootstrap task never ran, so nothing is actually in flight and no
            // worker will ever call back to drive the post-run transition. Re-check the
            // phase rather than blindly overwriting it: a concurrent `terminate()` may
            // have already moved Running -> Terminating while the submission was in
            // flight, and that transition must still reach Terminated here, since
            // nothing else will complete it.
            tracing::warn!(job = %job_name, error = %err, "executor rejected submission; no work will run for this firing");
            let mut phase = recover(self.phase.lock());
            match std::mem::replace(&mut *phase, Phase::Idle) {
                Phase::Running { .. } => {
                    // Already Idle from the replace above.
                }
                Phase::Terminating { .. } => {
                    *phase = Phase::Terminated;
                    drop(phase);
                    self.termination_signal.notify_all();
                }
                other => *phase = other,
            }
        }
    }

    /// Runs on the executor's worker thread: invokes `work`, catching any panic and
    /// logging it as a job failure rather than letting it take down the worker thread,
    /// then performs the post-run transition under the lock.
    fn run_and_complete(self: Arc<Self>, work: &Work, worker: &CancellationToken) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| work(worker))) {
            let message = panic_message(&panic);
            tracing::error!(job = %self.name, error = %message, "job work panicked; treated as normal completion");
        }
        self.complete_run();
    }

    /// The post-run transition.
    ///
    /// Held under a single lock acquisition throughout, including the re-arm branch's
    /// call into [`Self::arm`] — that call is a non-blocking submission to the ticker, so
    /// holding the lock across it closes the window a concurrent `terminate()` would
    /// otherwise have to observe the momentary `Idle` this transition passes through and
    /// clobber it back to `Waiting` after `terminate()` already declared the job
    /// `Terminated`.
    fn complete_run(self: Arc<Self>) {
        let mut phase = recover(self.phase.lock());
        match std::mem::replace(&mut *phase, Phase::Idle) {
            Phase::Running {
                rearm_after_run: Some(delay),
                ..
            } => {
                let deadline = Instant::now() + delay;
                match self.arm(delay) {
                    Ok(()) => *phase = Phase::Waiting { deadline },
                    Err(err) => {
                        tracing::warn!(job = %self.name, error = %err, "ticker rejected re-arm after run; falling back to idle");
                        // Already Idle from the `mem::replace` above.
                    }
                }
            }
            Phase::Running {
                rearm_after_run: None,
                ..
            } => {
                // Already Idle from the `mem::replace` above.
            }
            Phase::Terminating { .. } => {
                *phase = Phase::Terminated;
                drop(phase);
                self.termination_signal.notify_all();
            }
            other @ (Phase::Idle | Phase::Waiting { .. } | Phase::Terminated) => {
                // Unreachable under normal operation (only a Running or Terminating job
                // can be completing a run), but restore rather than silently discarding
                // state if it ever happens.
                *phase = other;
            }
        }
    }
}

/// Best-effort extraction of a human-readable message from a caught panic payload.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl DelayedJob<TokioTicker, TokioExecutor> {
    /// Convenience constructor wiring the production [`TokioTicker`] and
    /// [`TokioExecutor`].
    pub fn with_tokio_defaults(
        name: impl Into<String>,
        default_delay: Duration,
        work: impl Fn(&CancellationToken) + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, default_delay, TokioTicker::new(), TokioExecutor::new(), work)
    }
}
