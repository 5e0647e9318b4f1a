//! HTTP readiness polling for the proxy server.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Target and timing for a readiness poll. Stateless descriptor, consumed
/// by [`wait_until_ready`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessProbe {
    /// Base URL probed with a plain GET.
    pub base_url: String,
    /// Timeout applied to each individual attempt.
    pub attempt_timeout: Duration,
    /// Pause between attempts.
    pub interval: Duration,
    /// Overall deadline measured from the first attempt.
    pub deadline: Duration,
}

/// Result of a readiness poll. The decision to abort on timeout is the
/// caller's — this is not an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered with a success status.
    Ready,
    /// The deadline elapsed without a successful response.
    TimedOut,
}

/// Poll `probe.base_url` until it answers with an HTTP success status or
/// the deadline elapses.
///
/// Connection failures, per-attempt timeouts, and non-success statuses all
/// count as "not yet ready". At least one attempt is made even when the
/// deadline is zero, so callers never need a special case for "check once".
pub async fn wait_until_ready(probe: &ReadinessProbe) -> ProbeOutcome {
    let client = match reqwest::Client::builder()
        .timeout(probe.attempt_timeout)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            warn!(%err, "failed to build readiness probe client");
            return ProbeOutcome::TimedOut;
        }
    };

    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match client.get(&probe.base_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(
                    url = %probe.base_url,
                    attempts,
                    elapsed = ?started.elapsed(),
                    "server is ready"
                );
                return ProbeOutcome::Ready;
            }
            Ok(resp) => {
                debug!(url = %probe.base_url, status = %resp.status(), "not ready yet");
            }
            Err(err) => {
                debug!(url = %probe.base_url, %err, "not reachable yet");
            }
        }

        if started.elapsed() >= probe.deadline {
            warn!(
                url = %probe.base_url,
                attempts,
                deadline = ?probe.deadline,
                "server did not become ready within deadline"
            );
            return ProbeOutcome::TimedOut;
        }

        tokio::time::sleep(probe.interval).await;
    }
}
