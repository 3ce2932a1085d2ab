use std::path::Path;

use tracing::{info, info_span, warn};

use crate::aws_cli::{AwsCliRunner, AwsCliSession, DefaultAwsCliRunner};
use crate::compensation::provision_with_compensation;
use crate::config::{ArtifactArgs, Command, ProvisionerConfig, SubmitArgs, VaultSettings};
use crate::error::{Result, StackError};
use crate::lookup::{DomainLookup, HostTable};
use crate::provisioner::{Provisioner, StackSession, SubmitOutcome};
use crate::secrets::{SecretStore, VaultClient};
use crate::telemetry;
use crate::template::{self, RenderedStack};

pub fn run(config: ProvisionerConfig) -> Result<()> {
    telemetry::init(&config)?;
    match &config.command {
        Command::Check(artifacts) => check(artifacts),
        Command::Cidr { domain, hosts } => cidr(domain, hosts),
        Command::Status { .. } | Command::Submit(_) => {
            let runner = DefaultAwsCliRunner::detect(config.region.clone())?;
            run_with_runner(&config, &runner)
        }
    }
}

/// Like [`run`] with an injectable `aws` runner.
pub fn run_with_runner(config: &ProvisionerConfig, runner: &dyn AwsCliRunner) -> Result<()> {
    let session = AwsCliSession::new(runner);
    match &config.command {
        Command::Check(artifacts) => check(artifacts),
        Command::Cidr { domain, hosts } => cidr(domain, hosts),
        Command::Status { stack } => {
            match Provisioner::new(&session, &config.commit).status(stack)? {
                Some(status) => println!("{stack}: {status}"),
                None => println!("{stack}: does not exist"),
            }
            Ok(())
        }
        Command::Submit(args) => {
            let vault = if args.issue_tokens.is_empty() {
                None
            } else {
                let settings = VaultSettings::from_env()?;
                Some(VaultClient::new(settings.address, settings.token)?)
            };
            let outcome = submit(
                config,
                args,
                &session,
                vault.as_ref().map(|client| client as &dyn SecretStore),
            )?;
            println!("{}: {}", args.stack, describe(&outcome));
            Ok(())
        }
    }
}

/// Load the artifacts, bind any issued tokens and submit the stack.
///
/// With tokens to issue, submission runs under compensation: a failed or
/// missing stack revokes every token issued for it.
pub fn submit(
    config: &ProvisionerConfig,
    args: &SubmitArgs,
    session: &dyn StackSession,
    store: Option<&dyn SecretStore>,
) -> Result<SubmitOutcome> {
    let span = info_span!("apply", stack = %args.stack, scenario = %config.scenario);
    let _enter = span.enter();

    let mut rendered = load(&args.artifacts)?;
    let provisioner =
        Provisioner::new(session, config.commit.clone()).with_poll_interval(config.poll_interval);
    let wait = !args.no_wait;

    let Some(store) = store else {
        if !args.issue_tokens.is_empty() {
            return Err(StackError::Config(
                "a secret store is required to issue tokens".into(),
            ));
        }
        return provisioner
            .submit_rendered(&rendered, &args.stack, wait)?
            .into_result(&args.stack);
    };

    provision_with_compensation(store, &args.stack, |ledger| {
        for (key, role) in &args.issue_tokens {
            let token = ledger.issue_token(role)?;
            bind_argument(&mut rendered, key, token)?;
        }
        provisioner
            .submit_rendered(&rendered, &args.stack, wait)?
            .into_result(&args.stack)
    })
}

fn check(artifacts: &ArtifactArgs) -> Result<()> {
    let rendered = load(artifacts)?;
    rendered.validate_references()?;

    let unbound: Vec<_> = rendered.unbound_arguments().collect();
    for argument in &unbound {
        warn!(key = %argument.key, "argument has no value");
    }
    if let Some(first) = unbound.first() {
        return Err(StackError::UnboundArgument {
            stack: artifacts.template.display().to_string(),
            key: first.key.clone(),
        });
    }

    println!(
        "{}: {} resources, {} parameters, all arguments bound",
        artifacts.template.display(),
        rendered.template.resources.len(),
        rendered.template.parameters.len()
    );
    Ok(())
}

fn cidr(domain: &str, hosts: &Path) -> Result<()> {
    let table = HostTable::from_path(hosts)?;
    let cidr = table
        .lookup(domain)
        .ok_or_else(|| StackError::Config(format!("{domain} has no entry in {}", hosts.display())))?;
    println!("{cidr}");
    Ok(())
}

fn load(artifacts: &ArtifactArgs) -> Result<RenderedStack> {
    let arguments = artifacts.arguments_path();
    let rendered = template::load(&artifacts.template, &arguments)?;
    info!(
        template = %artifacts.template.display(),
        arguments = %arguments.display(),
        parameters = rendered.template.parameters.len(),
        "loaded stack artifacts"
    );
    Ok(rendered)
}

fn bind_argument(rendered: &mut RenderedStack, key: &str, value: String) -> Result<()> {
    let argument = rendered
        .arguments
        .iter_mut()
        .find(|argument| argument.key == key)
        .ok_or_else(|| StackError::Config(format!("template has no argument '{key}'")))?;
    argument.value = Some(value);
    Ok(())
}

fn describe(outcome: &SubmitOutcome) -> String {
    match outcome {
        SubmitOutcome::Accepted { stack_id } => format!("accepted as {stack_id}"),
        SubmitOutcome::Succeeded => "created".to_string(),
        SubmitOutcome::Failed { status } => format!("failed ({status})"),
        SubmitOutcome::Missing => "no longer exists".to_string(),
    }
}
