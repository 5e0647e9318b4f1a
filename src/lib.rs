#![forbid(unsafe_code)]

//! `claude-launch` — process orchestration for running Claude against a
//! local model-routing proxy.
//!
//! Starts the proxy server in the background, polls its health endpoint
//! until it is ready, runs the interactive client in the foreground with
//! `ANTHROPIC_BASE_URL` injected, and guarantees the server is terminated
//! when the client exits or the launcher is interrupted.

pub mod config;
pub mod errors;
pub mod health;
pub mod process;
pub mod supervisor;

pub use config::LaunchConfig;
pub use errors::{AppError, Result};
