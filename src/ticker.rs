// Copyright (c) 2026 the delayed-job authors. Licensed under the Apache License, Version 2.0.

//! The injected delayed-scheduler capability. See [`Ticker`] and [`TokioTicker`].

use crate::error::SchedulingError;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;

/// A closure handed to a [`Ticker`], run once when the requested delay elapses.
pub type TickerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Deduplication key for a [`Ticker`] submission.
///
/// One [`DelayedJob`] owns exactly one key for its whole lifetime, minted from a
/// process-wide counter at construction — the per-key dedup contract in [`Ticker::schedule`]
/// then does the rest: repeated submissions under this key collapse into the single
/// most-recent pending firing.
///
/// [`DelayedJob`]: crate::coordinator::DelayedJob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickerKey(u64);

static NEXT_TICKER_KEY: AtomicU64 = AtomicU64::new(0);

impl TickerKey {
    /// Mints a fresh, process-unique key.
    pub fn fresh() -> Self {
        Self(NEXT_TICKER_KEY.fetch_add(1, Ordering::SeqCst))
    }
}

/// A delayed scheduler with per-key deduplication.
///
/// This is an opaque external capability from the coordinator's point of view: it
/// arms a callback to run after at least `delay`, and a second [`schedule`] call under the
/// same key supersedes any prior pending firing for that key rather than producing a
/// second one. The coordinator relies on this to implement re-arming without ever
/// tracking more than one pending firing itself.
///
/// [`schedule`]: Ticker::schedule
pub trait Ticker: Send + Sync + 'static {
    /// Arms `callback` to run no sooner than `delay` from now, under `key`.
    ///
    /// A call with the same `key` as a still-pending firing cancels that firing and
    /// replaces it with this one — there is never more than one pending firing per key.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::TickerRejected`] if the ticker cannot accept the
    /// submission (e.g. its backing runtime is shutting down).
    fn schedule(
        &self,
        key: TickerKey,
        delay: Duration,
        callback: TickerCallback,
    ) -> Result<(), SchedulingError>;

    /// Best-effort cancellation of any firing pending under `key`.
    ///
    /// "Best-effort" because a firing that has already been handed off to its callback
    /// cannot be recalled — the fire handler's own state check (discarding a firing
    /// observed when the job isn't `Waiting`) is the backstop for a cancellation that
    /// loses this race.
    fn cancel(&self, key: &TickerKey);
}

struct PendingFiring {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

/// The production [`Ticker`], built on [`tokio::time::sleep`] racing a
/// [`CancellationToken`] inside a spawned task.
///
/// Grounded on the `hotki-engine` crate's `Ticker` (an initial-delay-plus-interval
/// scheduler keyed by string id): the same shape — a map from key to a
/// `(CancellationToken, JoinHandle)` pair, `tokio::select!` between the sleep and the
/// cancellation signal — specialized here to a single one-shot firing per key instead of
/// a repeating interval.
#[derive(Default)]
pub struct TokioTicker {
    pending: Mutex<HashMap<TickerKey, PendingFiring>>,
}

impl TokioTicker {
    /// Creates an empty ticker with no pending firings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ticker for TokioTicker {
    fn schedule(
        &self,
        key: TickerKey,
        delay: Duration,
        callback: TickerCallback,
    ) -> Result<(), SchedulingError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            SchedulingError::TickerRejected {
                job: format!("{key:?}"),
            }
        })?;

        self.cancel(&key);

        let cancel = CancellationToken::new();
        let cancel_for_task = cancel.clone();
        let task = handle.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => callback(),
                () = cancel_for_task.cancelled() => {}
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(
                key,
                PendingFiring {
                    cancel,
                    handle: task,
                },
            );
        }
        Ok(())
    }

    fn cancel(&self, key: &TickerKey) {
        let removed = self.pending.lock().ok().and_then(|mut pending| pending.remove(key));
        if let Some(firing) = removed {
            firing.cancel.cancel();
            firing.handle.abort();
        }
    }
}
