#![forbid(unsafe_code)]

//! `claude-launch` binary.
//!
//! Parses flags, loads the optional TOML config, then hands the two launch
//! specs and the readiness policy to the supervisor. A Ctrl-C / SIGTERM
//! listener cancels the shared token so an interrupt still drives the
//! supervisor through server teardown.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use claude_launch::config::{LaunchConfig, Provider};
use claude_launch::supervisor::{Outcome, ReadinessPolicy, Supervisor};
use claude_launch::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "claude-launch",
    about = "Start the model-routing proxy, wait for readiness, then run Claude against it",
    version,
    long_about = None
)]
struct Cli {
    /// Preferred provider for the proxy's model routing.
    #[arg(long, value_enum, default_value_t = Provider::Openai)]
    provider: Provider,

    /// Port for the proxy server.
    #[arg(long, default_value_t = 8082)]
    port: u16,

    /// Big model to use (e.g. gpt-4o, gemini-2.5-pro).
    #[arg(long)]
    big_model: Option<String>,

    /// Small model to use (e.g. gpt-4o-mini, gemini-2.0-flash).
    #[arg(long)]
    small_model: Option<String>,

    /// Skip the readiness probe and wait a fixed delay instead.
    #[arg(long)]
    no_wait: bool,

    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("failed to initialise logging: {err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(code) => code,
        Err(err) => {
            error!(%err, "launch failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<ExitCode> {
    let Cli {
        provider,
        port,
        big_model,
        small_model,
        no_wait,
        config: config_path,
        log_format: _,
    } = args;

    let config = match config_path {
        Some(path) => LaunchConfig::from_file(path)?,
        None => LaunchConfig::default(),
    };

    if std::env::var(provider.api_key_var()).is_err() {
        warn!(var = provider.api_key_var(), "provider API key not set");
    }

    let server_spec = config.server_spec(
        port,
        provider,
        big_model.as_deref(),
        small_model.as_deref(),
    );
    let base_url = config.base_url(port);
    let client_spec = config.client_spec(&base_url);

    let readiness = if no_wait {
        ReadinessPolicy::FixedDelay(config.startup_delay())
    } else {
        ReadinessPolicy::Probe(config.probe(port))
    };

    let cancel = CancellationToken::new();
    let signal_ct = cancel.clone();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });

    info!(
        provider = provider.env_value(),
        port,
        base_url = %base_url,
        "starting proxy server"
    );

    let mut supervisor = Supervisor::new(config.grace_period());
    let outcome = supervisor
        .run(&server_spec, &client_spec, &readiness, &cancel)
        .await;
    signal_task.abort();

    outcome.map(|outcome| {
        if matches!(outcome, Outcome::Interrupted) {
            info!("shut down after interrupt");
        }
        as_exit_code(outcome.exit_code())
    })
}

/// Map an i32 process exit code into [`ExitCode`]; anything outside the
/// 0–255 range reports generic failure.
fn as_exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
