use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, ProvisionerConfig};
use crate::error::{Result, StackError};

const DEFAULT_DIRECTIVE: &str = "info";

pub fn init(config: &ProvisionerConfig) -> Result<()> {
    let filter = env_filter(std::env::var("RUST_LOG").ok().as_deref())?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.log_format {
        LogFormat::Text => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| StackError::Other(format!("failed to install log subscriber: {err}")))
}

fn env_filter(directives: Option<&str>) -> Result<EnvFilter> {
    match directives {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .map_err(|err| StackError::Config(format!("invalid RUST_LOG '{directives}': {err}"))),
        _ => Ok(EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}
