//! Unit tests for `AppError` display format and error behavior.

use claude_launch::AppError;

#[test]
fn spawn_error_display_starts_with_spawn_prefix() {
    let err = AppError::Spawn("executable not found".into());
    assert!(err.to_string().starts_with("spawn:"));
}

#[test]
fn spawn_error_display_includes_message() {
    let err = AppError::Spawn("executable not found".into());
    assert_eq!(err.to_string(), "spawn: executable not found");
}

#[test]
fn readiness_error_display_starts_with_readiness_prefix() {
    let err = AppError::Readiness("deadline elapsed".into());
    assert_eq!(err.to_string(), "readiness: deadline elapsed");
}

#[test]
fn error_message_no_trailing_period() {
    let err = AppError::Config("missing field".into());
    let s = err.to_string();
    assert!(
        !s.ends_with('.'),
        "error message must not end with a period: {s}"
    );
}

#[test]
fn spawn_error_is_distinct_from_io_error() {
    let spawn = AppError::Spawn("start failed".into());
    let io = AppError::Io("start failed".into());
    assert_ne!(spawn.to_string(), io.to_string());
    assert!(spawn.to_string().starts_with("spawn:"));
    assert!(io.to_string().starts_with("io:"));
}

#[test]
fn readiness_error_is_distinct_from_config_error() {
    let readiness = AppError::Readiness("never reachable".into());
    let config = AppError::Config("never reachable".into());
    assert_ne!(readiness.to_string(), config.to_string());
}

#[test]
fn io_error_converts_from_std_io() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err = AppError::from(io);
    assert!(matches!(err, AppError::Io(_)));
    assert!(err.to_string().starts_with("io:"));
}

#[test]
fn error_implements_std_error_trait() {
    let err = AppError::Spawn("test".into());
    let display = format!("{err}");
    let debug = format!("{err:?}");
    assert!(!display.is_empty());
    assert!(!debug.is_empty());
}

#[test]
fn error_debug_representation() {
    let err = AppError::Readiness("probe timeout".into());
    let debug = format!("{err:?}");
    assert!(debug.contains("Readiness"));
    assert!(debug.contains("probe timeout"));
}
