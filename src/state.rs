// Copyright (c) 2026 the delayed-job authors. Licensed under the Apache License, Version 2.0.

//! The coordinator's state machine. See [`JobState`] for the observable enum and
//! [`Phase`] for the data-carrying internal representation.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// The externally observable state of a [`DelayedJob`].
///
/// Returned by [`DelayedJob::get_state`] and used by [`DelayedJob::is_terminated`]. This
/// is a plain data-less snapshot — the data that's only meaningful in one particular
/// state (the armed deadline, the worker's cancellation handle) lives in [`Phase`], not
/// here, so a caller can't observe a nonsensical combination like "idle with a deadline".
///
/// [`DelayedJob`]: crate::coordinator::DelayedJob
/// [`DelayedJob::get_state`]: crate::coordinator::DelayedJob::get_state
/// [`DelayedJob::is_terminated`]: crate::coordinator::DelayedJob::is_terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// No trigger is pending and no run is in flight.
    Idle,
    /// A ticker firing is armed; `work` has not started yet.
    Waiting,
    /// `work` is currently executing on a worker thread.
    Running,
    /// `terminate()` was called while `Running`; waiting for `work` to return.
    Terminating,
    /// Absorbing final state: no further trigger has any effect.
    Terminated,
}

/// The coordinator's internal, data-carrying state: a tagged enum carrying only the data
/// valid for that state, so there's no way to construct a nonsensical combination like
/// "idle with a worker thread".
///
/// Held behind the coordinator's mutex; every transition is a move out of one `Phase`
/// variant and into another under a single lock acquisition.
pub(crate) enum Phase {
    /// Mirrors [`JobState::Idle`].
    Idle,
    /// Mirrors [`JobState::Waiting`]; carries the absolute deadline the ticker is armed
    /// for, so re-arm comparisons against a tighter candidate delay don't need a second
    /// lookup.
    Waiting {
        deadline: Instant,
    },
    /// Mirrors [`JobState::Running`]; carries the running worker's cancellation token —
    /// a back-reference used only to deliver a cancellation signal, not ownership — and
    /// the minimum re-arm delay accumulated from triggers observed during the run, if
    /// any.
    Running {
        worker: CancellationToken,
        rearm_after_run: Option<Duration>,
    },
    /// Mirrors [`JobState::Terminating`]; carries the worker's token so the post-run
    /// transition can confirm cleanup, even though the token itself was already
    /// signalled when `terminate()` ran.
    Terminating {
        worker: CancellationToken,
    },
    /// Mirrors [`JobState::Terminated`]. Absorbing.
    Terminated,
}

impl Phase {
    /// Projects the internal phase onto the public, data-less [`JobState`] snapshot.
    pub(crate) fn snapshot(&self) -> JobState {
        match self {
            Phase::Idle => JobState::Idle,
            Phase::Waiting { .. } => JobState::Waiting,
            Phase::Running { .. } => JobState::Running,
            Phase::Terminating { .. } => JobState::Terminating,
            Phase::Terminated => JobState::Terminated,
        }
    }

    /// True once the absorbing [`JobState::Terminated`] state has been reached.
    pub(crate) fn is_terminated(&self) -> bool {
        matches!(self, Phase::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_maps_each_phase_to_its_observable_state() {
        assert_eq!(Phase::Idle.snapshot(), JobState::Idle);
        assert_eq!(
            Phase::Waiting { deadline: Instant::now() }.snapshot(),
            JobState::Waiting
        );
        assert_eq!(
            Phase::Running {
                worker: CancellationToken::new(),
                rearm_after_run: None
            }
            .snapshot(),
            JobState::Running
        );
        assert_eq!(
            Phase::Terminating { worker: CancellationToken::new() }.snapshot(),
            JobState::Terminating
        );
        assert_eq!(Phase::Terminated.snapshot(), JobState::Terminated);
    }

    #[test]
    fn only_terminated_reports_is_terminated() {
        assert!(!Phase::Idle.is_terminated());
        assert!(Phase::Terminated.is_terminated());
    }
}
