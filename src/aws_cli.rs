use std::process::{Command, Stdio};

use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Result, StackError};
use crate::lookup::{ImageRef, ResourceLookup};
use crate::provisioner::{CreateStackRequest, StackDescription, StackSession};

pub const AWS_BINARY: &str = "aws";

/// Runner responsible for executing `aws` commands. Returns parsed stdout.
pub trait AwsCliRunner: Send + Sync {
    fn run(&self, args: &[&str]) -> Result<Value>;
}

pub struct DefaultAwsCliRunner {
    region: String,
}

impl DefaultAwsCliRunner {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    /// Fails early when the CLI is not on PATH.
    pub fn detect(region: impl Into<String>) -> Result<Self> {
        which::which(AWS_BINARY).map_err(|_| StackError::ProviderToolMissing {
            binary: AWS_BINARY,
        })?;
        Ok(Self::new(region))
    }
}

impl AwsCliRunner for DefaultAwsCliRunner {
    fn run(&self, args: &[&str]) -> Result<Value> {
        let output = Command::new(AWS_BINARY)
            .args(args)
            .args(["--output", "json", "--region", self.region.as_str()])
            .stdin(Stdio::null())
            .output();
        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if stdout.trim().is_empty() {
                    return Ok(Value::Null);
                }
                Ok(serde_json::from_str(&stdout)?)
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let step = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");
                debug!(step = %step, stderr = %stderr, "aws command failed");
                Err(StackError::ProviderCommand {
                    step,
                    status: output.status.code(),
                    stderr,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StackError::ProviderToolMissing { binary: AWS_BINARY })
            }
            Err(err) => Err(StackError::Io(err)),
        }
    }
}

/// [`StackSession`] over `aws cloudformation`.
pub struct AwsCliSession<'a> {
    runner: &'a dyn AwsCliRunner,
}

impl<'a> AwsCliSession<'a> {
    pub fn new(runner: &'a dyn AwsCliRunner) -> Self {
        Self { runner }
    }
}

impl StackSession for AwsCliSession<'_> {
    fn create_stack(&self, request: &CreateStackRequest) -> Result<String> {
        let parameters = serde_json::to_string(&request.arguments)?;
        let tags: Vec<Value> = request
            .tags
            .iter()
            .map(|(key, value)| json!({ "Key": key, "Value": value }))
            .collect();
        let tags = serde_json::to_string(&tags)?;

        let response = self.runner.run(&[
            "cloudformation",
            "create-stack",
            "--stack-name",
            request.name.as_str(),
            "--template-body",
            request.template_body.as_str(),
            "--parameters",
            parameters.as_str(),
            "--tags",
            tags.as_str(),
        ])?;
        response["StackId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| StackError::Provider {
                stack: request.name.clone(),
                message: "create-stack response has no StackId".to_string(),
            })
    }

    fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>> {
        let response = match self
            .runner
            .run(&["cloudformation", "describe-stacks", "--stack-name", name])
        {
            Ok(response) => response,
            Err(StackError::ProviderCommand { stderr, .. }) if stderr.contains("does not exist") => {
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let Some(stack) = response["Stacks"].get(0) else {
            return Ok(None);
        };
        let status = stack["StackStatus"]
            .as_str()
            .ok_or_else(|| StackError::Provider {
                stack: name.to_string(),
                message: "describe-stacks response has no StackStatus".to_string(),
            })?;
        Ok(Some(StackDescription {
            name: name.to_string(),
            status: status.to_string(),
        }))
    }
}

/// [`ResourceLookup`] over `aws ec2 describe-*`.
pub struct AwsCliLookup<'a> {
    runner: &'a dyn AwsCliRunner,
}

impl<'a> AwsCliLookup<'a> {
    pub fn new(runner: &'a dyn AwsCliRunner) -> Self {
        Self { runner }
    }

    fn first_string(&self, args: &[&str], list: &str, field: &str) -> Result<Option<String>> {
        let response = self.runner.run(args)?;
        Ok(response[list]
            .get(0)
            .and_then(|item| item[field].as_str())
            .map(str::to_string))
    }
}

fn name_filter(name: &str) -> String {
    format!("Name=tag:Name,Values={name}")
}

impl ResourceLookup for AwsCliLookup<'_> {
    fn vpc_id(&self, domain: &str) -> Result<Option<String>> {
        let filter = name_filter(domain);
        self.first_string(&["ec2", "describe-vpcs", "--filters", filter.as_str()], "Vpcs", "VpcId")
    }

    fn subnet_id(&self, domain: &str) -> Result<Option<String>> {
        let filter = name_filter(domain);
        self.first_string(
            &["ec2", "describe-subnets", "--filters", filter.as_str()],
            "Subnets",
            "SubnetId",
        )
    }

    /// Newest image named `name`, with the `Commit` tag it was built from.
    fn image(&self, name: &str) -> Result<ImageRef> {
        let filter = format!("Name=name,Values={name}");
        let response = self
            .runner
            .run(&["ec2", "describe-images", "--owners", "self", "--filters", filter.as_str()])?;
        let newest = response["Images"].as_array().and_then(|images| {
            images
                .iter()
                .max_by_key(|image| image["CreationDate"].as_str().unwrap_or_default().to_string())
        });
        let Some(image) = newest else {
            return Ok(ImageRef::default());
        };
        let commit = image["Tags"].as_array().and_then(|tags| {
            tags.iter()
                .find(|tag| tag["Key"] == "Commit")
                .and_then(|tag| tag["Value"].as_str())
                .map(str::to_string)
        });
        Ok(ImageRef {
            id: image["ImageId"].as_str().map(str::to_string),
            commit,
        })
    }

    fn security_group_id(&self, vpc_id: Option<&str>, name: &str) -> Result<Option<String>> {
        let mut filters = vec![format!("Name=group-name,Values={name}")];
        if let Some(vpc_id) = vpc_id {
            filters.push(format!("Name=vpc-id,Values={vpc_id}"));
        }
        let mut args = vec!["ec2", "describe-security-groups", "--filters"];
        args.extend(filters.iter().map(String::as_str));
        self.first_string(&args, "SecurityGroups", "GroupId")
    }

    fn keypair(&self) -> Result<Option<String>> {
        self.first_string(&["ec2", "describe-key-pairs"], "KeyPairs", "KeyName")
    }

    fn availability_zones(&self) -> Result<Vec<(String, String)>> {
        let response = self.runner.run(&[
            "ec2",
            "describe-availability-zones",
            "--filters",
            "Name=state,Values=available",
        ])?;
        let zones: Vec<(String, String)> = response["AvailabilityZones"]
            .as_array()
            .map(|zones| {
                zones
                    .iter()
                    .filter_map(|zone| zone["ZoneName"].as_str())
                    .map(|zone| {
                        let suffix = zone.chars().last().map(String::from).unwrap_or_default();
                        (zone.to_string(), suffix)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct MockRunner {
        calls: Arc<Mutex<Vec<Vec<String>>>>,
        responses: Mutex<VecDeque<Result<Value>>>,
    }

    impl MockRunner {
        fn new(responses: Vec<Result<Value>>) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                responses: Mutex::new(responses.into()),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AwsCliRunner for MockRunner {
        fn run(&self, args: &[&str]) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push(args.iter().map(|arg| arg.to_string()).collect());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Value::Null))
        }
    }

    #[test]
    fn create_stack_passes_arguments_and_commit_tag() {
        let runner = MockRunner::new(vec![Ok(json!({ "StackId": "arn:stack/web" }))]);
        let session = AwsCliSession::new(&runner);
        let request = CreateStackRequest {
            name: "WebExampleBoss".into(),
            template_body: "{}".into(),
            arguments: vec![crate::args::Argument {
                key: "WebAMI".into(),
                value: Some("ami-1".into()),
            }],
            tags: vec![("Commit".into(), "abc".into())],
        };
        assert_eq!(session.create_stack(&request).unwrap(), "arn:stack/web");

        let call = &runner.calls()[0];
        assert_eq!(&call[..2], ["cloudformation", "create-stack"]);
        assert!(call.contains(&r#"[{"ParameterKey":"WebAMI","ParameterValue":"ami-1"}]"#.to_string()));
        assert!(call.contains(&r#"[{"Key":"Commit","Value":"abc"}]"#.to_string()));
    }

    #[test]
    fn describe_maps_missing_stack_to_none() {
        let runner = MockRunner::new(vec![
            Err(StackError::ProviderCommand {
                step: "cloudformation describe-stacks".into(),
                status: Some(255),
                stderr: "Stack with id Web does not exist".into(),
            }),
            Ok(json!({ "Stacks": [{ "StackStatus": "CREATE_COMPLETE" }] })),
        ]);
        let session = AwsCliSession::new(&runner);
        assert_eq!(session.describe_stack("Web").unwrap(), None);
        assert_eq!(
            session.describe_stack("Web").unwrap().unwrap().status,
            "CREATE_COMPLETE"
        );
    }

    #[test]
    fn lookups_read_first_match() {
        let runner = MockRunner::new(vec![
            Ok(json!({ "Vpcs": [{ "VpcId": "vpc-1" }] })),
            Ok(json!({ "Subnets": [] })),
            Ok(json!({ "AvailabilityZones": [
                { "ZoneName": "us-east-1a" },
                { "ZoneName": "us-east-1c" },
            ] })),
            Ok(json!({ "Images": [
                { "ImageId": "ami-old", "CreationDate": "2016-01-01T00:00:00Z" },
                { "ImageId": "ami-new", "CreationDate": "2016-02-01T00:00:00Z",
                  "Tags": [{ "Key": "Commit", "Value": "abc123" }] },
            ] })),
        ]);
        let lookup = AwsCliLookup::new(&runner);
        assert_eq!(lookup.vpc_id("example.boss").unwrap().as_deref(), Some("vpc-1"));
        assert_eq!(lookup.subnet_id("a-internal.example.boss").unwrap(), None);
        assert_eq!(
            lookup.availability_zones().unwrap(),
            vec![
                ("us-east-1a".to_string(), "a".to_string()),
                ("us-east-1c".to_string(), "c".to_string())
            ]
        );
        assert_eq!(
            lookup.image("web.example.boss").unwrap(),
            ImageRef::new("ami-new").with_commit("abc123")
        );
        assert_eq!(runner.calls()[0][3], "Name=tag:Name,Values=example.boss");
    }
}
