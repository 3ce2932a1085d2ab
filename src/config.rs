use std::env;
use std::path::{Path, PathBuf};
use std::process::Command as Process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::configuration::DEFAULT_REGION;
use crate::error::{Result, StackError};
use crate::scenario::Scenario;
use crate::template::ARGUMENTS_EXTENSION;

/// Log output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Template/argument file pair.
#[derive(Debug, Args, Clone)]
pub struct ArtifactArgs {
    /// Path to the `<name>.template` file.
    #[arg(long)]
    pub template: PathBuf,

    /// Path to the argument file (defaults to the template path with an `.arguments` extension).
    #[arg(long)]
    pub arguments: Option<PathBuf>,
}

impl ArtifactArgs {
    pub fn arguments_path(&self) -> PathBuf {
        self.arguments
            .clone()
            .unwrap_or_else(|| self.template.with_extension(ARGUMENTS_EXTENSION))
    }
}

#[derive(Debug, Args, Clone)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// Name of the stack to create.
    #[arg(long)]
    pub stack: String,

    /// Return as soon as the stack is accepted instead of waiting for completion.
    #[arg(long, default_value_t = false)]
    pub no_wait: bool,

    /// Issue a Vault token for ROLE and bind it to argument KEY (`KEY=ROLE`).
    /// Issued tokens are revoked when the stack fails.
    #[arg(long = "issue-token", value_name = "KEY=ROLE", value_parser = parse_key_value)]
    pub issue_tokens: Vec<(String, String)>,
}

/// Top-level CLI structure.
#[derive(Debug, Parser)]
#[command(
    name = "cfn-stacks",
    version,
    about = "Check, submit and inspect CloudFormation stacks built from generated templates.",
    long_about = "Templates and argument files are produced by configuration code; this tool lints them, fills in Vault tokens, submits them through the aws CLI and waits for completion. Scenario, region and commit are read from flags, then SCENARIO / AWS_REGION / STACK_COMMIT, then defaults."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Deployment scenario (defaults to $SCENARIO or "development").
    #[arg(long, global = true)]
    pub scenario: Option<String>,

    /// Provider region (defaults to $AWS_REGION or "us-east-1").
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Commit tagged onto created stacks (defaults to $STACK_COMMIT or `git rev-parse HEAD`).
    #[arg(long, global = true)]
    pub commit: Option<String>,

    /// Seconds between status polls while waiting for a stack.
    #[arg(
        long,
        global = true,
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: u64,

    /// Log output format (text|json).
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Lint a template/argument pair without contacting the provider.
    Check(ArtifactArgs),
    /// Submit a template/argument pair as a new stack.
    Submit(SubmitArgs),
    /// Show the status of a stack.
    Status {
        #[arg(long)]
        stack: String,
    },
    /// Resolve a domain name through a host table.
    Cidr {
        domain: String,
        /// TOML host table with a `[domains]` section.
        #[arg(long)]
        hosts: PathBuf,
    },
}

/// Complete configuration used by the CLI.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub command: Command,
    pub scenario: Scenario,
    pub region: String,
    pub commit: String,
    pub poll_interval: Duration,
    pub log_format: LogFormat,
}

impl ProvisionerConfig {
    pub fn from_env_and_args(cli: CliArgs) -> Result<Self> {
        let scenario = cli
            .scenario
            .or_else(|| env::var("SCENARIO").ok())
            .map(Scenario::new)
            .unwrap_or_default();

        let region = cli
            .region
            .or_else(|| env::var("AWS_REGION").ok())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let commit = cli
            .commit
            .or_else(|| env::var("STACK_COMMIT").ok())
            .or_else(git_head)
            .unwrap_or_else(|| "unknown".to_string());

        if let Command::Check(artifacts) | Command::Submit(SubmitArgs { artifacts, .. }) =
            &cli.command
        {
            ensure_exists(&artifacts.template)?;
        }

        Ok(Self {
            command: cli.command,
            scenario,
            region,
            commit,
            poll_interval: Duration::from_secs(cli.poll_interval),
            log_format: cli.log_format,
        })
    }
}

/// Vault endpoint and credentials, from `VAULT_ADDR` and `VAULT_TOKEN`.
#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub address: String,
    pub token: String,
}

impl VaultSettings {
    /// Prompts for the token when `VAULT_TOKEN` is unset.
    pub fn from_env() -> Result<Self> {
        let address = env::var("VAULT_ADDR").map_err(|_| {
            StackError::Config("VAULT_ADDR must be set to issue Vault tokens".into())
        })?;
        let token = match env::var("VAULT_TOKEN") {
            Ok(token) => token,
            Err(_) => rpassword::prompt_password(format!("Vault token for {address}: "))?,
        };
        if token.trim().is_empty() {
            return Err(StackError::Config("empty Vault token".into()));
        }
        Ok(Self { address, token })
    }
}

fn git_head() -> Option<String> {
    let output = Process::new("git").args(["rev-parse", "HEAD"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!commit.is_empty()).then_some(commit)
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(StackError::Config(format!(
            "template {} does not exist",
            path.display()
        )))
    }
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=ROLE, got '{raw}'")),
    }
}
