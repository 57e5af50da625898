// Copyright (c) 2026 the delayed-job authors. Licensed under the Apache License, Version 2.0.

//! End-to-end scenarios against the production `TokioTicker`/`TokioExecutor` pair.
//!
//! Real timers, real `spawn_blocking` threads — no mocked time. Sampling points use
//! generous slack around the nominal timeline to stay robust on a busy host.

use delayed_job::{DelayedJob, JobState};
use pretty_assertions::assert_eq;
use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn single_trigger_runs_once_after_the_aggregation_delay() {
    let value = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&value);
    let job = DelayedJob::with_tokio_defaults("single-trigger", Duration::from_millis(50), move |_cancel| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(10));
    });

    job.trigger_execution();

    sleep_ms(25).await;
    assert_eq!(job.get_state(), JobState::Waiting);
    assert_eq!(value.load(Ordering::SeqCst), 0);

    sleep_ms(50).await; // t=75
    assert_eq!(job.get_state(), JobState::Idle);
    assert_eq!(value.load(Ordering::SeqCst), 1);

    sleep_ms(100).await; // t=175
    assert_eq!(job.get_state(), JobState::Idle);
    assert_eq!(value.load(Ordering::SeqCst), 1);

    job.terminate();
    job.wait_for_termination(Duration::from_secs(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn hammered_default_delay_coalesces_bursts_into_one_run_each() {
    let value = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&value);
    let job = Arc::new(DelayedJob::with_tokio_defaults(
        "hammered",
        Duration::from_millis(50),
        move |_cancel| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(10));
        },
    ));

    let mut hammerers = Vec::new();
    for _ in 0..10 {
        let job = Arc::clone(&job);
        hammerers.push(tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + Duration::from_millis(60);
            while tokio::time::Instant::now() < deadline {
                job.trigger_execution();
                tokio::task::yield_now().await;
            }
        }));
    }
    for hammerer in hammerers {
        hammerer.await.unwrap();
    }

    sleep_ms(25).await; // triggers stopped at 60, this sample is mid-hammering, t~25
    assert_eq!(value.load(Ordering::SeqCst), 1);

    sleep_ms(50).await; // t=75
    assert_eq!(value.load(Ordering::SeqCst), 2);

    sleep_ms(50).await; // t=125
    assert_eq!(value.load(Ordering::SeqCst), 3);

    sleep_ms(100).await; // t=225
    assert_eq!(job.get_state(), JobState::Idle);
    assert_eq!(value.load(Ordering::SeqCst), 3);

    job.terminate();
    job.wait_for_termination(Duration::from_secs(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_work_keeps_rearming_while_triggers_keep_arriving() {
    let value = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&value);
    let job = Arc::new(DelayedJob::with_tokio_defaults(
        "slow-work",
        Duration::from_millis(50),
        move |_cancel| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(80));
        },
    ));

    let hammerer = {
        let job = Arc::clone(&job);
        tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + Duration::from_millis(260);
            while tokio::time::Instant::now() < deadline {
                job.trigger_execution();
                tokio::task::yield_now().await;
            }
        })
    };
    hammerer.await.unwrap();

    sleep_ms(75).await;
    assert_eq!(job.get_state(), JobState::Running);
    assert_eq!(value.load(Ordering::SeqCst), 1);

    sleep_ms(130).await; // t=205
    assert_eq!(job.get_state(), JobState::Running);
    assert_eq!(value.load(Ordering::SeqCst), 2);

    sleep_ms(130).await; // t=335
    assert_eq!(job.get_state(), JobState::Running);
    assert_eq!(value.load(Ordering::SeqCst), 3);

    sleep_ms(70).await; // t=405, past the scenario's t>395 boundary
    assert_eq!(job.get_state(), JobState::Idle);
    assert_eq!(value.load(Ordering::SeqCst), 3);

    job.terminate();
    job.wait_for_termination(Duration::from_secs(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn custom_delays_tighten_the_armed_deadline_to_the_soonest_requested() {
    let value = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&value);
    let job = DelayedJob::with_tokio_defaults("custom-delays", Duration::from_millis(1000), move |_cancel| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    job.trigger_execution_after(Duration::from_millis(60));
    sleep_ms(1).await;
    job.trigger_execution_after(Duration::from_millis(50));
    sleep_ms(1).await;
    job.trigger_execution_after(Duration::from_millis(30));
    sleep_ms(1).await;
    job.trigger_execution_after(Duration::from_millis(20));
    sleep_ms(1).await;
    job.trigger_execution_after(Duration::from_millis(10));

    sleep_ms(6).await; // t~10
    assert_eq!(job.get_state(), JobState::Waiting);
    assert_eq!(value.load(Ordering::SeqCst), 0);

    sleep_ms(14).await; // t~24
    assert_eq!(value.load(Ordering::SeqCst), 1);

    sleep_ms(10).await; // t~34
    assert_eq!(job.get_state(), JobState::Idle);

    job.terminate();
    job.wait_for_termination(Duration::from_secs(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn terminate_while_running_moves_through_terminating_to_terminated() {
    let cancelled = Arc::new(AtomicU32::new(0));
    let observed_cancel = Arc::clone(&cancelled);
    let job = DelayedJob::with_tokio_defaults("terminate-while-running", Duration::from_millis(20), move |cancel| {
        let deadline = std::time::Instant::now() + Duration::from_millis(50);
        while std::time::Instant::now() < deadline {
            if cancel.is_cancelled() {
                observed_cancel.fetch_add(1, Ordering::SeqCst);
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    });

    job.trigger_execution_after(Duration::ZERO);
    sleep_ms(20).await;
    assert_eq!(job.get_state(), JobState::Running);

    job.terminate();
    assert_eq!(job.get_state(), JobState::Terminating);

    sleep_ms(20).await;
    assert_eq!(job.get_state(), JobState::Terminated);
    assert!(job.is_terminated());
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn wait_for_termination_returns_once_the_body_terminates_itself() {
    let job = Arc::new(DelayedJob::with_tokio_defaults(
        "self-terminating",
        Duration::from_millis(1),
        |_cancel| {},
    ));

    {
        let job = Arc::clone(&job);
        tokio::spawn(async move {
            sleep_ms(50).await;
            job.terminate();
            sleep_ms(10_000).await;
        });
    }

    let start = tokio::time::Instant::now();
    job.wait_for_termination(Duration::from_secs(1));
    let elapsed = start.elapsed();

    assert!(job.is_terminated());
    assert!(
        elapsed >= Duration::from_millis(40) && elapsed <= Duration::from_millis(70),
        "expected wait_for_termination to return within [40, 70]ms, got {elapsed:?}"
    );
}
