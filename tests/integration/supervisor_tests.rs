//! Integration tests for the supervisor state machine — full runs with
//! real child processes and a stub readiness endpoint.
//!
//! Every test asserts the core teardown guarantee: after a run, any server
//! that was spawned is in the `Terminated` state.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use claude_launch::process::{LaunchSpec, ProcessState};
use claude_launch::supervisor::{Outcome, ReadinessPolicy, Supervisor, SupervisorState};
use claude_launch::AppError;

use super::test_helpers::{fast_probe, refused_url, sh, stub_ready_server};

fn probe_policy(url: &str, deadline: Duration) -> ReadinessPolicy {
    ReadinessPolicy::Probe(fast_probe(url, deadline))
}

// ── Successful runs ──────────────────────────────────────────────

#[tokio::test]
async fn server_becomes_ready_and_client_exits_zero() {
    let (url, counter, ct) = stub_ready_server(2).await;
    let cancel = CancellationToken::new();
    let mut supervisor = Supervisor::new(Duration::from_secs(5));

    let outcome = supervisor
        .run(
            &sh("sleep 30"),
            &sh("exit 0"),
            &probe_policy(&url, Duration::from_secs(5)),
            &cancel,
        )
        .await
        .expect("run succeeds");

    assert!(matches!(outcome, Outcome::ClientExited(exit) if exit.success()));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(counter.load(Ordering::SeqCst), 3, "ready on the third poll");
    assert_eq!(supervisor.server_state(), Some(ProcessState::Terminated));
    assert_eq!(supervisor.state(), SupervisorState::Done);
    ct.cancel();
}

#[tokio::test]
async fn client_failure_code_is_propagated_not_escalated() {
    let (url, _counter, ct) = stub_ready_server(0).await;
    let cancel = CancellationToken::new();
    let mut supervisor = Supervisor::new(Duration::from_secs(5));

    let outcome = supervisor
        .run(
            &sh("sleep 30"),
            &sh("exit 7"),
            &probe_policy(&url, Duration::from_secs(5)),
            &cancel,
        )
        .await
        .expect("a failing client is not an orchestrator error");

    assert_eq!(outcome.exit_code(), 7);
    assert_eq!(supervisor.server_state(), Some(ProcessState::Terminated));
    ct.cancel();
}

#[tokio::test]
async fn fixed_delay_policy_skips_probing() {
    // No readiness endpoint exists at all; the run must still proceed.
    let cancel = CancellationToken::new();
    let mut supervisor = Supervisor::new(Duration::from_secs(5));

    let outcome = supervisor
        .run(
            &sh("sleep 30"),
            &sh("exit 0"),
            &ReadinessPolicy::FixedDelay(Duration::from_millis(100)),
            &cancel,
        )
        .await
        .expect("run succeeds");

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(supervisor.server_state(), Some(ProcessState::Terminated));
}

// ── Failure paths ────────────────────────────────────────────────

#[tokio::test]
async fn readiness_timeout_tears_down_server_without_spawning_client() {
    let url = refused_url().await;
    let temp = tempfile::tempdir().expect("tempdir");
    let marker = temp.path().join("client-ran");
    let client = sh(&format!("touch '{}'", marker.display()));

    let cancel = CancellationToken::new();
    let mut supervisor = Supervisor::new(Duration::from_secs(5));

    let err = supervisor
        .run(
            &sh("sleep 30"),
            &client,
            &probe_policy(&url, Duration::from_millis(400)),
            &cancel,
        )
        .await
        .expect_err("must report readiness timeout");

    assert!(matches!(err, AppError::Readiness(_)));
    assert!(!marker.exists(), "client must never spawn");
    assert_eq!(supervisor.server_state(), Some(ProcessState::Terminated));
    assert_eq!(supervisor.state(), SupervisorState::Done);
}

#[tokio::test]
async fn server_spawn_failure_surfaces_with_nothing_to_clean_up() {
    let cancel = CancellationToken::new();
    let mut supervisor = Supervisor::new(Duration::from_secs(5));

    let err = supervisor
        .run(
            &LaunchSpec::new("no-such-server-binary-4242"),
            &sh("exit 0"),
            &ReadinessPolicy::FixedDelay(Duration::from_millis(50)),
            &cancel,
        )
        .await
        .expect_err("must report spawn failure");

    assert!(matches!(err, AppError::Spawn(_)));
    assert_eq!(supervisor.server_state(), None);
    assert_eq!(supervisor.state(), SupervisorState::Done);
}

#[tokio::test]
async fn client_spawn_failure_still_tears_down_server() {
    let (url, _counter, ct) = stub_ready_server(0).await;
    let cancel = CancellationToken::new();
    let mut supervisor = Supervisor::new(Duration::from_secs(5));

    let err = supervisor
        .run(
            &sh("sleep 30"),
            &LaunchSpec::new("no-such-client-binary-4242"),
            &probe_policy(&url, Duration::from_secs(5)),
            &cancel,
        )
        .await
        .expect_err("must report client spawn failure");

    assert!(matches!(err, AppError::Spawn(_)));
    assert_eq!(supervisor.server_state(), Some(ProcessState::Terminated));
    ct.cancel();
}

// ── Interruption ─────────────────────────────────────────────────

#[tokio::test]
async fn interrupt_during_client_run_is_clean_shutdown() {
    let (url, _counter, ct) = stub_ready_server(0).await;
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        canceller.cancel();
    });

    let mut supervisor = Supervisor::new(Duration::from_secs(5));
    let started = Instant::now();
    let outcome = supervisor
        .run(
            &sh("sleep 30"),
            &sh("sleep 30"),
            &probe_policy(&url, Duration::from_secs(5)),
            &cancel,
        )
        .await
        .expect("interrupted run is not an error");

    assert_eq!(outcome, Outcome::Interrupted);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(supervisor.server_state(), Some(ProcessState::Terminated));
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "teardown must complete within the grace period"
    );
    ct.cancel();
}

#[tokio::test]
async fn interrupt_while_waiting_for_readiness_still_cleans_up() {
    let url = refused_url().await;
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let mut supervisor = Supervisor::new(Duration::from_secs(5));
    let outcome = supervisor
        .run(
            &sh("sleep 30"),
            &sh("exit 0"),
            &probe_policy(&url, Duration::from_secs(30)),
            &cancel,
        )
        .await
        .expect("interrupted run is not an error");

    assert_eq!(outcome, Outcome::Interrupted);
    assert_eq!(supervisor.server_state(), Some(ProcessState::Terminated));
    assert_eq!(supervisor.state(), SupervisorState::Done);
}
