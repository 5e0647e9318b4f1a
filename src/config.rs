//! Launch configuration parsing, validation, and spec building.
//!
//! The config file is optional: every field has a default so the binary
//! runs with no file at all. CLI flags override individual values where
//! both exist.

use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use crate::health::ReadinessProbe;
use crate::process::LaunchSpec;
use crate::{AppError, Result};

/// Environment variable the proxy server reads for provider selection.
pub const PREFERRED_PROVIDER_VAR: &str = "PREFERRED_PROVIDER";
/// Environment variable for the big-model override.
pub const BIG_MODEL_VAR: &str = "BIG_MODEL";
/// Environment variable for the small-model override.
pub const SMALL_MODEL_VAR: &str = "SMALL_MODEL";
/// Environment variable the client reads to find the proxy.
pub const BASE_URL_VAR: &str = "ANTHROPIC_BASE_URL";

/// Upstream provider the proxy routes requests to.
///
/// Passed as `--provider` on the command line and exported to the server
/// process as `PREFERRED_PROVIDER`. Defaults to [`Provider::Openai`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Route to OpenAI models. Default provider.
    #[default]
    Openai,
    /// Route to Google Gemini models.
    Google,
}

impl Provider {
    /// Value exported as `PREFERRED_PROVIDER` to the server process.
    #[must_use]
    pub fn env_value(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Google => "google",
        }
    }

    /// Name of the API-key environment variable this provider requires.
    #[must_use]
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::Openai => "OPENAI_API_KEY",
            Self::Google => "GEMINI_API_KEY",
        }
    }
}

/// Readiness probe timing values (seconds / milliseconds).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ReadinessConfig {
    /// Overall deadline before the server is declared unreachable.
    #[serde(default = "default_deadline_seconds")]
    pub deadline_seconds: u64,
    /// Pause between probe attempts.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Timeout applied to each individual probe request.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            deadline_seconds: default_deadline_seconds(),
            interval_ms: default_interval_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

fn default_deadline_seconds() -> u64 {
    30
}

fn default_interval_ms() -> u64 {
    500
}

fn default_attempt_timeout_ms() -> u64 {
    1000
}

fn default_server_command() -> String {
    "anthropic-proxy".into()
}

fn default_client_command() -> String {
    "claude".into()
}

fn default_host() -> String {
    "localhost".into()
}

fn default_grace_seconds() -> u64 {
    5
}

fn default_startup_delay_seconds() -> u64 {
    2
}

/// Launcher configuration parsed from an optional TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LaunchConfig {
    /// Proxy server binary.
    #[serde(default = "default_server_command")]
    pub server_command: String,
    /// Extra arguments passed to the server before `--port`.
    #[serde(default)]
    pub server_args: Vec<String>,
    /// Client binary run in the foreground once the server is ready.
    #[serde(default = "default_client_command")]
    pub client_command: String,
    /// Arguments passed to the client.
    #[serde(default)]
    pub client_args: Vec<String>,
    /// Host used for the probe URL and the client's base URL.
    #[serde(default = "default_host")]
    pub host: String,
    /// Readiness probe timings.
    #[serde(default)]
    pub readiness: ReadinessConfig,
    /// Bounded wait after a graceful-stop request before force-killing.
    #[serde(default = "default_grace_seconds")]
    pub grace_seconds: u64,
    /// Fixed startup delay used when the readiness probe is skipped.
    #[serde(default = "default_startup_delay_seconds")]
    pub startup_delay_seconds: u64,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            server_command: default_server_command(),
            server_args: Vec::new(),
            client_command: default_client_command(),
            client_args: Vec::new(),
            host: default_host(),
            readiness: ReadinessConfig::default(),
            grace_seconds: default_grace_seconds(),
            startup_delay_seconds: default_startup_delay_seconds(),
        }
    }
}

impl LaunchConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, is not valid
    /// TOML, or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())
            .map_err(|err| AppError::Config(format!("cannot read config: {err}")))?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` on malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values that serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.server_command.is_empty() {
            return Err(AppError::Config("server_command must not be empty".into()));
        }
        if self.client_command.is_empty() {
            return Err(AppError::Config("client_command must not be empty".into()));
        }
        if self.host.is_empty() {
            return Err(AppError::Config("host must not be empty".into()));
        }
        if self.readiness.interval_ms == 0 {
            return Err(AppError::Config(
                "readiness.interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Termination grace period as a [`Duration`].
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_seconds)
    }

    /// Fixed startup delay as a [`Duration`].
    #[must_use]
    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_seconds)
    }

    /// Base URL the server will be reachable on once it binds `port`.
    #[must_use]
    pub fn base_url(&self, port: u16) -> String {
        format!("http://{}:{port}", self.host)
    }

    /// Readiness probe descriptor for the server on `port`.
    #[must_use]
    pub fn probe(&self, port: u16) -> ReadinessProbe {
        ReadinessProbe {
            base_url: self.base_url(port),
            attempt_timeout: Duration::from_millis(self.readiness.attempt_timeout_ms),
            interval: Duration::from_millis(self.readiness.interval_ms),
            deadline: Duration::from_secs(self.readiness.deadline_seconds),
        }
    }

    /// Build the launch spec for the background proxy server.
    ///
    /// The server inherits the launcher's environment overlaid with the
    /// provider selection and any model overrides.
    #[must_use]
    pub fn server_spec(
        &self,
        port: u16,
        provider: Provider,
        big_model: Option<&str>,
        small_model: Option<&str>,
    ) -> LaunchSpec {
        let mut spec = LaunchSpec::new(&self.server_command);
        for arg in &self.server_args {
            spec = spec.arg(arg);
        }
        spec = spec
            .arg("--port")
            .arg(port.to_string())
            .env(PREFERRED_PROVIDER_VAR, provider.env_value());
        if let Some(model) = big_model {
            spec = spec.env(BIG_MODEL_VAR, model);
        }
        if let Some(model) = small_model {
            spec = spec.env(SMALL_MODEL_VAR, model);
        }
        spec
    }

    /// Build the launch spec for the foreground client session.
    ///
    /// The client inherits the launcher's environment plus the base-URL
    /// variable pointing at the now-ready server.
    #[must_use]
    pub fn client_spec(&self, base_url: &str) -> LaunchSpec {
        let mut spec = LaunchSpec::new(&self.client_command);
        for arg in &self.client_args {
            spec = spec.arg(arg);
        }
        spec.env(BASE_URL_VAR, base_url)
    }
}
