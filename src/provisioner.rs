use std::thread;
use std::time::Duration;

use tracing::{debug, info, info_span};

use crate::args::Argument;
use crate::configuration::Configuration;
use crate::error::{Result, StackError};
use crate::template::{RenderedStack, render};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const STATUS_IN_PROGRESS: &str = "CREATE_IN_PROGRESS";
pub const STATUS_COMPLETE: &str = "CREATE_COMPLETE";

/// Everything the provisioning service needs to create one stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStackRequest {
    pub name: String,
    pub template_body: String,
    pub arguments: Vec<Argument>,
    pub tags: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescription {
    pub name: String,
    pub status: String,
}

/// Connection to the provisioning service.
pub trait StackSession {
    /// Returns the provider's stack id.
    fn create_stack(&self, request: &CreateStackRequest) -> Result<String>;
    /// `Ok(None)` when the provider reports no such stack.
    fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Submitted without waiting.
    Accepted { stack_id: String },
    Succeeded,
    Failed { status: String },
    /// The stack disappeared while waiting.
    Missing,
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. } | SubmitOutcome::Succeeded)
    }

    pub fn into_result(self, stack: &str) -> Result<Self> {
        match self {
            SubmitOutcome::Failed { status } => Err(StackError::StackFailed {
                stack: stack.to_string(),
                status,
            }),
            SubmitOutcome::Missing => Err(StackError::StackFailed {
                stack: stack.to_string(),
                status: "DOES_NOT_EXIST".to_string(),
            }),
            outcome => Ok(outcome),
        }
    }
}

pub struct Provisioner<'a> {
    session: &'a dyn StackSession,
    commit: String,
    poll_interval: Duration,
}

impl<'a> Provisioner<'a> {
    pub fn new(session: &'a dyn StackSession, commit: impl Into<String>) -> Self {
        Self {
            session,
            commit: commit.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn submit(&self, config: &Configuration, name: &str, wait: bool) -> Result<SubmitOutcome> {
        if let Some(unbound) = config.unbound_arguments().next() {
            return Err(unbound_error(name, unbound));
        }
        let rendered = render(config, "")?;
        self.submit_rendered(&rendered, name, wait)
    }

    /// Create the stack and, with `wait`, block until it leaves
    /// `CREATE_IN_PROGRESS`. There is no timeout.
    pub fn submit_rendered(
        &self,
        rendered: &RenderedStack,
        name: &str,
        wait: bool,
    ) -> Result<SubmitOutcome> {
        let span = info_span!("submit", stack = name);
        let _enter = span.enter();

        if let Some(unbound) = rendered.unbound_arguments().next() {
            return Err(unbound_error(name, unbound));
        }
        rendered.validate_references()?;

        let request = CreateStackRequest {
            name: name.to_string(),
            template_body: rendered.template.to_json()?,
            arguments: rendered.arguments.clone(),
            tags: vec![("Commit".to_string(), self.commit.clone())],
        };
        let stack_id = self.session.create_stack(&request)?;
        info!(stack_id = %stack_id, commit = %self.commit, "created stack");

        if !wait {
            return Ok(SubmitOutcome::Accepted { stack_id });
        }
        let outcome = self.wait_for(name)?;
        info!(outcome = ?outcome, "stack finished");
        Ok(outcome)
    }

    pub fn status(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .session
            .describe_stack(name)?
            .map(|description| description.status))
    }

    fn wait_for(&self, name: &str) -> Result<SubmitOutcome> {
        loop {
            thread::sleep(self.poll_interval);
            let Some(description) = self.session.describe_stack(name)? else {
                return Ok(SubmitOutcome::Missing);
            };
            debug!(status = %description.status, "polled stack");
            match description.status.as_str() {
                STATUS_IN_PROGRESS => continue,
                STATUS_COMPLETE => return Ok(SubmitOutcome::Succeeded),
                _ => {
                    return Ok(SubmitOutcome::Failed {
                        status: description.status,
                    });
                }
            }
        }
    }
}

fn unbound_error(stack: &str, argument: &Argument) -> StackError {
    StackError::UnboundArgument {
        stack: stack.to_string(),
        key: argument.key.clone(),
    }
}
