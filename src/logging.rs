// Copyright (c) 2026 the delayed-job authors. Licensed under the Apache License, Version 2.0.

//! An opt-in `tracing_subscriber` bootstrap for binaries and tests.
//!
//! This crate never installs a global subscriber itself — every [`tracing`] call the
//! coordinator makes (`trigger_execution_after`'s ticker-rejection warnings,
//! `run_and_complete`'s panic log, and so on) is inert until some binary or test owns the
//! process-wide subscriber. [`install_default_subscriber`] is that opt-in hook, for callers
//! that don't already have their own `tracing_subscriber` setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a process-wide `tracing` subscriber: an `RUST_LOG`-filtered formatting layer on
/// stderr, defaulting to `info` when `RUST_LOG` is unset.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed — this can only be called
/// once per process.
pub fn install_default_subscriber() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
