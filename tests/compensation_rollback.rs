use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use cfn_stacks::{
    Arg, Command, Configuration, HostTable, ProvisionerConfig, Resource, Result, Scenario,
    StackError, StackSession, SubmitOutcome, TemplateFormat,
    apply,
    config::CliArgs,
    intrinsic::reference,
    provision_with_compensation,
    provisioner::{CreateStackRequest, StackDescription},
    secrets::SecretStore,
    template,
};
use clap::Parser;
use serde_json::json;
use tempfile::tempdir;

#[derive(Default)]
struct RecordingStore {
    calls: Mutex<Vec<String>>,
    failing_revokes: Vec<String>,
}

impl RecordingStore {
    fn failing_revoke(token: &str) -> Self {
        Self {
            failing_revokes: vec![token.to_string()],
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SecretStore for RecordingStore {
    fn issue(&self, role: &str) -> Result<String> {
        self.calls.lock().unwrap().push(format!("issue {role}"));
        Ok(format!("token-{role}"))
    }

    fn write(&self, path: &str, _fields: &BTreeMap<String, String>) -> Result<()> {
        self.calls.lock().unwrap().push(format!("write {path}"));
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("delete {path}"));
        Ok(())
    }

    fn revoke(&self, token: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("revoke {token}"));
        if self.failing_revokes.iter().any(|failing| failing == token) {
            return Err(StackError::Secret(format!("revoke {token} refused")));
        }
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedSession {
    created: Mutex<Vec<CreateStackRequest>>,
    statuses: Mutex<VecDeque<&'static str>>,
}

impl ScriptedSession {
    fn ending_in(status: &'static str) -> Self {
        let session = Self::default();
        session.statuses.lock().unwrap().push_back(status);
        session
    }
}

impl StackSession for ScriptedSession {
    fn create_stack(&self, request: &CreateStackRequest) -> Result<String> {
        self.created.lock().unwrap().push(request.clone());
        Ok("stack-1".to_string())
    }

    fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .map(|status| StackDescription {
                name: name.to_string(),
                status: status.to_string(),
            }))
    }
}

#[test]
fn every_reversal_is_attempted_after_a_failed_one() {
    let store = RecordingStore::failing_revoke("token-db");
    let err = provision_with_compensation(&store, "Web", |ledger| -> Result<()> {
        ledger.issue_token("web")?;
        ledger.issue_token("db")?;
        Err(StackError::StackFailed {
            stack: "Web".into(),
            status: "ROLLBACK_COMPLETE".into(),
        })
    })
    .unwrap_err();

    assert!(matches!(err, StackError::StackFailed { ref status, .. } if status == "ROLLBACK_COMPLETE"));
    assert_eq!(
        store.calls(),
        vec!["issue web", "issue db", "revoke token-db", "revoke token-web"]
    );
}

fn write_artifacts(folder: &Path) -> std::path::PathBuf {
    let mut config = Configuration::new(
        "example.boss",
        "us-east-1",
        Scenario::default(),
        &HostTable::default(),
    )
    .unwrap();
    config.add_arg(Arg::ami("WebAMI", "ami-1234", "Image for the web tier"));
    config.add_arg(Arg::password("WebVaultToken", None::<String>, "Vault token for the web tier"));
    config.add_resource(
        "Web",
        Resource::new(
            "AWS::EC2::Instance",
            json!({
                "ImageId": reference("WebAMI"),
                "UserData": { "Fn::Base64": reference("WebVaultToken") },
            }),
        ),
    );
    template::generate(&config, "web", folder, TemplateFormat::Json)
        .unwrap()
        .template
}

fn submit_config(template: &Path) -> (ProvisionerConfig, cfn_stacks::config::SubmitArgs) {
    let cli = CliArgs::parse_from([
        "cfn-stacks",
        "submit",
        "--template",
        template.to_str().unwrap(),
        "--stack",
        "WebExampleBoss",
        "--issue-token",
        "WebVaultToken=web",
        "--commit",
        "abc123",
    ]);
    let mut config = ProvisionerConfig::from_env_and_args(cli).unwrap();
    config.poll_interval = Duration::ZERO;
    let Command::Submit(args) = config.command.clone() else {
        panic!("expected submit");
    };
    (config, args)
}

#[test]
fn issued_token_is_bound_and_kept_on_success() {
    let dir = tempdir().expect("temp dir");
    let template = write_artifacts(dir.path());
    let (config, args) = submit_config(&template);
    let store = RecordingStore::default();
    let session = ScriptedSession::ending_in("CREATE_COMPLETE");

    let outcome = apply::submit(&config, &args, &session, Some(&store)).unwrap();
    assert_eq!(outcome, SubmitOutcome::Succeeded);
    assert_eq!(store.calls(), vec!["issue web"]);

    let created = session.created.lock().unwrap();
    let token = created[0]
        .arguments
        .iter()
        .find(|argument| argument.key == "WebVaultToken")
        .unwrap();
    assert_eq!(token.value.as_deref(), Some("token-web"));
}

#[test]
fn failed_stack_revokes_issued_token() {
    let dir = tempdir().expect("temp dir");
    let template = write_artifacts(dir.path());
    let (config, args) = submit_config(&template);
    let store = RecordingStore::default();
    let session = ScriptedSession::ending_in("ROLLBACK_COMPLETE");

    let err = apply::submit(&config, &args, &session, Some(&store)).unwrap_err();
    assert!(matches!(err, StackError::StackFailed { ref stack, .. } if stack == "WebExampleBoss"));
    assert_eq!(store.calls(), vec!["issue web", "revoke token-web"]);
}

#[test]
fn token_requests_need_a_secret_store() {
    let dir = tempdir().expect("temp dir");
    let template = write_artifacts(dir.path());
    let (config, args) = submit_config(&template);
    let session = ScriptedSession::default();

    let err = apply::submit(&config, &args, &session, None).unwrap_err();
    assert!(matches!(err, StackError::Config(_)));
    assert!(session.created.lock().unwrap().is_empty());
}
