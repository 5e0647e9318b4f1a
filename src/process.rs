//! Child process lifecycle — spawn, wait, two-phase terminate.
//!
//! [`ProcessHandle`] wraps one [`tokio::process::Child`] with:
//! - `kill_on_drop(true)` so processes are cleaned up even on abnormal
//!   unwind paths.
//! - Background mode that discards the child's output so it can never
//!   block writing to a full pipe.
//! - A two-phase [`ProcessHandle::terminate`]: graceful-stop request,
//!   bounded wait, force-kill fallback. Idempotent — a second call on an
//!   already-terminated handle is a no-op.

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::{AppError, Result};

// ── Launch spec ──────────────────────────────────────────────────────────────

/// Command, ordered argument list, and environment overrides applied on top
/// of the inherited environment. Immutable once handed to [`ProcessHandle::spawn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable name or path.
    pub command: String,
    /// Ordered argument list.
    pub args: Vec<String>,
    /// Environment variable overrides layered over the inherited environment.
    pub env: HashMap<String, String>,
}

impl LaunchSpec {
    /// Create a spec for `command` with no arguments or overrides.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one environment override.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

// ── Spawn mode and results ───────────────────────────────────────────────────

/// How the child's stdio is wired at spawn time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpawnMode {
    /// Detached from the terminal; output is discarded so the child never
    /// blocks on a full pipe.
    Background,
    /// Inherits the launcher's stdio for an interactive session.
    Foreground,
}

/// Lifecycle state of a supervised process.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned, not yet confirmed ready.
    Starting,
    /// Readiness confirmed by the supervisor.
    Ready,
    /// Graceful-stop requested, waiting for exit.
    Terminating,
    /// Exited and reaped.
    Terminated,
    /// Died before readiness, or readiness timed out. Cleanup still drives
    /// the handle to [`ProcessState::Terminated`].
    Failed,
}

/// How a child exited.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExitResult {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// True when the process was killed by a signal rather than exiting.
    pub signaled: bool,
}

impl ExitResult {
    /// True for a normal zero exit.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code to propagate from the launcher; signal deaths and unknown
    /// statuses map to 1.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(1)
    }

    /// One-line human description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        if self.signaled {
            "terminated by signal".to_owned()
        } else {
            self.code.map_or_else(
                || "status unknown".to_owned(),
                |code| format!("exited with code {code}"),
            )
        }
    }
}

impl From<ExitStatus> for ExitResult {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signaled = {
            use std::os::unix::process::ExitStatusExt;
            status.signal().is_some()
        };
        #[cfg(not(unix))]
        let signaled = false;

        Self {
            code: status.code(),
            signaled,
        }
    }
}

// ── Process handle ───────────────────────────────────────────────────────────

/// Owns one spawned child process for its whole lifetime.
#[derive(Debug)]
pub struct ProcessHandle {
    /// Short label used in log lines (`server`, `client`).
    name: String,
    /// Live child, `None` once reaped.
    child: Option<Child>,
    /// Current lifecycle state.
    state: ProcessState,
    /// Exit result recorded when the child was reaped.
    exit: Option<ExitResult>,
}

impl ProcessHandle {
    /// Spawn the external command described by `spec`.
    ///
    /// The child's environment is the launcher's environment overlaid with
    /// the spec's overrides.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the executable cannot be found or the
    /// OS refuses to start it.
    pub fn spawn(name: &str, spec: &LaunchSpec, mode: SpawnMode) -> Result<Self> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        match mode {
            SpawnMode::Background => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null());
            }
            SpawnMode::Foreground => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
        }

        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|err| {
            AppError::Spawn(format!("failed to start `{}`: {err}", spec.command))
        })?;

        info!(
            name,
            command = %spec.command,
            pid = child.id(),
            ?mode,
            "process spawned"
        );

        Ok(Self {
            name: name.to_owned(),
            child: Some(child),
            state: ProcessState::Starting,
            exit: None,
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// OS process identifier, while the child is alive.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Record that the supervisor confirmed readiness.
    pub fn mark_ready(&mut self) {
        self.state = ProcessState::Ready;
    }

    /// Record that the process failed before becoming ready.
    pub fn mark_failed(&mut self) {
        self.state = ProcessState::Failed;
    }

    /// Block until the child exits naturally.
    ///
    /// Returns immediately if the underlying process is already gone: either
    /// the stored result from an earlier reap, or the OS-level wait on an
    /// exited child, which does not block.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the OS wait fails or the child was never
    /// spawned.
    pub async fn wait(&mut self) -> Result<ExitResult> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        let Some(child) = self.child.as_mut() else {
            return Err(AppError::Io(format!(
                "{} process has no child to wait on",
                self.name
            )));
        };

        let status = child
            .wait()
            .await
            .map_err(|err| AppError::Io(format!("failed waiting for {}: {err}", self.name)))?;

        let exit = ExitResult::from(status);
        info!(name = %self.name, status = %exit.describe(), "process exited");

        self.child = None;
        self.exit = Some(exit);
        self.state = ProcessState::Terminated;
        Ok(exit)
    }

    /// Two-phase stop: request a graceful exit, wait up to `grace`, then
    /// force-kill if the child has not gone away.
    ///
    /// Best-effort and idempotent — failures are logged, never escalated,
    /// and a second call on a terminated handle is a no-op. The handle is
    /// always in [`ProcessState::Terminated`] afterwards.
    pub async fn terminate(&mut self, grace: Duration) {
        let Some(mut child) = self.child.take() else {
            debug!(name = %self.name, "terminate: no live child, nothing to do");
            self.state = ProcessState::Terminated;
            return;
        };

        self.state = ProcessState::Terminating;
        request_graceful_stop(&mut child, &self.name);

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                let exit = ExitResult::from(status);
                info!(name = %self.name, status = %exit.describe(), "process stopped gracefully");
                self.exit = Some(exit);
            }
            Ok(Err(err)) => {
                warn!(name = %self.name, %err, "error waiting for graceful stop");
            }
            Err(_elapsed) => {
                warn!(name = %self.name, ?grace, "graceful stop timed out, force-killing");
                if let Err(err) = child.start_kill() {
                    warn!(name = %self.name, %err, "force-kill failed");
                }
                match child.wait().await {
                    Ok(status) => self.exit = Some(ExitResult::from(status)),
                    Err(err) => warn!(name = %self.name, %err, "error reaping killed process"),
                }
            }
        }

        self.state = ProcessState::Terminated;
    }
}

/// Ask the child to exit on its own terms.
///
/// On Unix this delivers `SIGTERM` so the server can flush state; the
/// bounded wait in [`ProcessHandle::terminate`] escalates to `SIGKILL`.
#[cfg(unix)]
fn request_graceful_stop(child: &mut Child, name: &str) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(raw) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        debug!(name, "graceful stop: child already reaped");
        return;
    };
    if let Err(err) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        // ESRCH here just means the child exited between id() and kill().
        debug!(name, %err, "SIGTERM delivery failed");
    }
}

/// There is no portable graceful-stop signal on this platform; start the
/// hard kill immediately and let the bounded wait reap it.
#[cfg(not(unix))]
fn request_graceful_stop(child: &mut Child, name: &str) {
    if let Err(err) = child.start_kill() {
        debug!(name, %err, "kill request failed");
    }
}
