//! Unit tests for launch spec construction — server and client specs built
//! from configuration and CLI selections.

use claude_launch::config::{
    LaunchConfig, Provider, BASE_URL_VAR, BIG_MODEL_VAR, PREFERRED_PROVIDER_VAR, SMALL_MODEL_VAR,
};
use claude_launch::process::LaunchSpec;

#[test]
fn new_spec_is_bare_command() {
    let spec = LaunchSpec::new("claude");
    assert_eq!(spec.command, "claude");
    assert!(spec.args.is_empty());
    assert!(spec.env.is_empty());
}

#[test]
fn builder_accumulates_args_in_order() {
    let spec = LaunchSpec::new("sh").arg("-c").arg("exit 0").args(["a", "b"]);
    assert_eq!(spec.args, vec!["-c", "exit 0", "a", "b"]);
}

#[test]
fn builder_records_env_overrides() {
    let spec = LaunchSpec::new("claude").env("A", "1").env("B", "2");
    assert_eq!(spec.env.get("A").map(String::as_str), Some("1"));
    assert_eq!(spec.env.get("B").map(String::as_str), Some("2"));
}

#[test]
fn server_spec_appends_port_argument() {
    let config = LaunchConfig::default();
    let spec = config.server_spec(8082, Provider::Openai, None, None);

    assert_eq!(spec.command, "anthropic-proxy");
    assert_eq!(spec.args, vec!["--port", "8082"]);
}

#[test]
fn server_spec_keeps_configured_args_before_port() {
    let config = LaunchConfig::from_toml_str("server_args = [\"--verbose\"]\n")
        .expect("config parses");
    let spec = config.server_spec(9000, Provider::Openai, None, None);
    assert_eq!(spec.args, vec!["--verbose", "--port", "9000"]);
}

#[test]
fn server_spec_exports_provider() {
    let config = LaunchConfig::default();
    let spec = config.server_spec(8082, Provider::Google, None, None);
    assert_eq!(
        spec.env.get(PREFERRED_PROVIDER_VAR).map(String::as_str),
        Some("google")
    );
}

#[test]
fn server_spec_exports_model_overrides_when_given() {
    let config = LaunchConfig::default();
    let spec = config.server_spec(8082, Provider::Openai, Some("gpt-4o"), Some("gpt-4o-mini"));
    assert_eq!(spec.env.get(BIG_MODEL_VAR).map(String::as_str), Some("gpt-4o"));
    assert_eq!(
        spec.env.get(SMALL_MODEL_VAR).map(String::as_str),
        Some("gpt-4o-mini")
    );
}

#[test]
fn server_spec_omits_model_overrides_when_absent() {
    let config = LaunchConfig::default();
    let spec = config.server_spec(8082, Provider::Openai, None, None);
    assert!(!spec.env.contains_key(BIG_MODEL_VAR));
    assert!(!spec.env.contains_key(SMALL_MODEL_VAR));
}

#[test]
fn client_spec_injects_base_url() {
    let config = LaunchConfig::default();
    let spec = config.client_spec("http://localhost:8082");

    assert_eq!(spec.command, "claude");
    assert_eq!(
        spec.env.get(BASE_URL_VAR).map(String::as_str),
        Some("http://localhost:8082")
    );
}

#[test]
fn client_spec_keeps_configured_args() {
    let config = LaunchConfig::from_toml_str("client_args = [\"--continue\"]\n")
        .expect("config parses");
    let spec = config.client_spec("http://localhost:8082");
    assert_eq!(spec.args, vec!["--continue"]);
}
