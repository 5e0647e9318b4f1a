//! Supervisor — orchestrates server startup, readiness, the foreground
//! client session, and guaranteed teardown.
//!
//! State machine:
//!
//! ```text
//! Idle → ServerStarting → ServerReady → ClientRunning → Cleanup → Done
//!             │                              │
//!             └── ServerFailed ──────────────┴── ClientFailed
//!                     (both still route through Cleanup)
//! ```
//!
//! Every exit path — normal completion, spawn failure, readiness timeout,
//! client failure, external interruption — reaches the teardown step
//! exactly once. Interruption is explicit cancellation: the token passed
//! into [`Supervisor::run`] is selected against both blocking waits, so an
//! interrupt unwinds deterministically into cleanup instead of bypassing
//! server teardown.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::health::{self, ProbeOutcome, ReadinessProbe};
use crate::process::{ExitResult, LaunchSpec, ProcessHandle, ProcessState, SpawnMode};
use crate::{AppError, Result};

// ── Public types ─────────────────────────────────────────────────────────────

/// Where the supervisor currently is in its run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    /// No run started.
    Idle,
    /// Server spawned, readiness not yet confirmed.
    ServerStarting,
    /// Server confirmed ready, client not yet spawned.
    ServerReady,
    /// Foreground client session in progress.
    ClientRunning,
    /// Server spawn failed or readiness timed out.
    ServerFailed,
    /// Client spawn failed or the client exited non-zero.
    ClientFailed,
    /// Tearing the server down.
    Cleanup,
    /// Run finished; the server handle, if any, is terminated.
    Done,
}

/// How the supervisor decides the server is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessPolicy {
    /// Poll a health endpoint until success or deadline.
    Probe(ReadinessProbe),
    /// Skip polling; sleep a fixed delay and assume ready.
    FixedDelay(Duration),
}

/// How a supervisor run ended, for runs that reached the client stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The client ran to completion; carries its exit result. A non-zero
    /// client exit is reported through the launcher's exit code, not as an
    /// orchestrator error.
    ClientExited(ExitResult),
    /// The operator interrupted the run; treated as a clean shutdown.
    Interrupted,
}

impl Outcome {
    /// Exit code the launcher should report.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ClientExited(exit) => exit.exit_code(),
            Self::Interrupted => 0,
        }
    }
}

// ── Supervisor ───────────────────────────────────────────────────────────────

/// Owns the background server for the whole run and the foreground client
/// for the duration of its session. Single-threaded: the foreground client
/// wait is the only blocking operation on the control task.
#[derive(Debug)]
pub struct Supervisor {
    /// Grace period for two-phase termination. One value for ready and
    /// not-yet-ready servers alike.
    grace: Duration,
    /// Server handle, possibly absent. Explicitly optional so cleanup
    /// checks a typed field instead of inferring presence from scope.
    server: Option<ProcessHandle>,
    /// Current position in the state machine.
    state: SupervisorState,
}

impl Supervisor {
    /// Create an idle supervisor with the given termination grace period.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            server: None,
            state: SupervisorState::Idle,
        }
    }

    /// Current state-machine position.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Lifecycle state of the server handle, if one was spawned. After
    /// [`Supervisor::run`] returns this is always
    /// [`ProcessState::Terminated`] for any server that was started.
    #[must_use]
    pub fn server_state(&self) -> Option<ProcessState> {
        self.server.as_ref().map(ProcessHandle::state)
    }

    /// Drive one full orchestration run.
    ///
    /// Spawns the server in the background, waits for readiness, runs the
    /// client in the foreground, and tears the server down on every exit
    /// path. Cancelling `cancel` at any point unwinds the in-progress wait
    /// and still routes through cleanup; a run interrupted this way returns
    /// [`Outcome::Interrupted`].
    ///
    /// A supervisor drives one run at a time; starting a new run replaces
    /// the previous (already terminated) server handle.
    ///
    /// # Errors
    ///
    /// - `AppError::Spawn` — server or client executable could not be
    ///   started. For a client spawn failure the server has already been
    ///   torn down when this returns.
    /// - `AppError::Readiness` — the server never became ready within the
    ///   deadline. The server is torn down before this returns; a timed-out
    ///   server is not assumed dead.
    pub async fn run(
        &mut self,
        server_spec: &LaunchSpec,
        client_spec: &LaunchSpec,
        readiness: &ReadinessPolicy,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        self.state = SupervisorState::ServerStarting;

        match ProcessHandle::spawn("server", server_spec, SpawnMode::Background) {
            Ok(handle) => self.server = Some(handle),
            Err(err) => {
                // Nothing was started, but still route through cleanup so
                // every exit path is uniform.
                self.state = SupervisorState::ServerFailed;
                self.cleanup().await;
                return Err(err);
            }
        }

        let readiness_outcome = tokio::select! {
            outcome = wait_for_ready(readiness) => Some(outcome),
            () = cancel.cancelled() => None,
        };

        match readiness_outcome {
            Some(ProbeOutcome::Ready) => {
                if let Some(server) = self.server.as_mut() {
                    server.mark_ready();
                }
                self.state = SupervisorState::ServerReady;
            }
            Some(ProbeOutcome::TimedOut) => {
                // A timed-out server is not assumed dead; it still gets the
                // full two-phase teardown.
                if let Some(server) = self.server.as_mut() {
                    server.mark_failed();
                }
                self.state = SupervisorState::ServerFailed;
                self.cleanup().await;
                return Err(AppError::Readiness(describe_timeout(readiness)));
            }
            None => {
                info!("interrupted before server became ready");
                self.cleanup().await;
                return Ok(Outcome::Interrupted);
            }
        }

        let mut client = match ProcessHandle::spawn("client", client_spec, SpawnMode::Foreground) {
            Ok(handle) => handle,
            Err(err) => {
                self.state = SupervisorState::ClientFailed;
                self.cleanup().await;
                return Err(err);
            }
        };
        self.state = SupervisorState::ClientRunning;

        let client_wait = tokio::select! {
            result = client.wait() => Some(result),
            () = cancel.cancelled() => None,
        };

        let outcome = match client_wait {
            Some(Ok(exit)) => {
                if exit.success() {
                    info!("client session finished");
                } else {
                    warn!(status = %exit.describe(), "client session failed");
                    self.state = SupervisorState::ClientFailed;
                }
                Outcome::ClientExited(exit)
            }
            Some(Err(err)) => {
                warn!(%err, "failed waiting for client");
                self.state = SupervisorState::ClientFailed;
                Outcome::ClientExited(ExitResult {
                    code: None,
                    signaled: false,
                })
            }
            None => {
                info!("interrupt received, stopping client");
                client.terminate(self.grace).await;
                Outcome::Interrupted
            }
        };

        self.cleanup().await;
        Ok(outcome)
    }

    /// Tear down the server if one is still tracked. Best-effort: errors
    /// are logged inside [`ProcessHandle::terminate`], never escalated.
    async fn cleanup(&mut self) {
        self.state = SupervisorState::Cleanup;
        if let Some(server) = self.server.as_mut() {
            server.terminate(self.grace).await;
        }
        self.state = SupervisorState::Done;
    }
}

// ── Readiness helpers ────────────────────────────────────────────────────────

async fn wait_for_ready(policy: &ReadinessPolicy) -> ProbeOutcome {
    match policy {
        ReadinessPolicy::Probe(probe) => health::wait_until_ready(probe).await,
        ReadinessPolicy::FixedDelay(delay) => {
            info!(?delay, "readiness probe skipped, waiting fixed delay");
            tokio::time::sleep(*delay).await;
            ProbeOutcome::Ready
        }
    }
}

fn describe_timeout(policy: &ReadinessPolicy) -> String {
    match policy {
        ReadinessPolicy::Probe(probe) => format!(
            "server at {} did not become ready within {:?}",
            probe.base_url, probe.deadline
        ),
        ReadinessPolicy::FixedDelay(_) => "server did not become ready".to_owned(),
    }
}
