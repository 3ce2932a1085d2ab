use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("'{domain}' is not a valid VPC (<vpc>.<tld>) or subnet (<subnet>.<vpc>.<tld>) domain name")]
    InvalidDomain { domain: String },

    #[error("route '{route}' requires exactly one target of gateway|peer|instance, got {given}")]
    RouteTarget { route: String, given: usize },

    #[error("DNS alias for '{key}' is not supported for role {role}: {reason}")]
    UnsupportedAlias {
        key: String,
        role: &'static str,
        reason: &'static str,
    },

    #[error("resource '{resource}' references unknown key '{target}'")]
    DanglingReference { resource: String, target: String },

    #[error("stack '{stack}': could not determine argument '{key}'")]
    UnboundArgument { stack: String, key: String },

    #[error("stack '{stack}': provider error: {message}")]
    Provider { stack: String, message: String },

    #[error("stack '{stack}' did not complete, status is '{status}'")]
    StackFailed { stack: String, status: String },

    #[error("provider CLI missing on PATH (binary '{binary}'). Install it or adjust PATH.")]
    ProviderToolMissing { binary: &'static str },

    #[error("provider CLI command '{step}' failed (exit {status:?}): {stderr}")]
    ProviderCommand {
        step: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("secret store error: {0}")]
    Secret(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml_bw::Error),

    #[error("host table parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unexpected error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StackError>;
