use anyhow::Context;
use clap::Parser;

use cfn_stacks::{
    apply,
    config::{CliArgs, ProvisionerConfig},
};

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();
    let config = ProvisionerConfig::from_env_and_args(cli).context("configuration error")?;
    apply::run(config)?;
    Ok(())
}
