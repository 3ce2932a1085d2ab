use std::fs;

use cfn_stacks::{
    Arg, Configuration, HostTable, Resource, Scenario, StackError, TemplateFormat,
    intrinsic::reference,
    template::{self, FORMAT_VERSION},
};
use serde_json::{Value, json};
use tempfile::tempdir;

fn web_config() -> Configuration {
    let mut hosts = HostTable::default();
    hosts.insert("example.boss", "10.0.0.0/16").unwrap();
    let mut config =
        Configuration::new("example.boss", "us-east-1", Scenario::default(), &hosts).unwrap();
    config.add_vpc("VPC");
    config.add_arg(Arg::ami("WebAMI", None::<String>, "Image for the web tier"));
    config.add_resource(
        "Web",
        Resource::new("AWS::EC2::Instance", json!({ "ImageId": reference("WebAMI") }))
            .depends_on(["VPC"]),
    );
    config
}

#[test]
fn json_artifacts_round_trip_through_disk() {
    let dir = tempdir().expect("temp dir");
    let artifacts = template::generate(&web_config(), "web", dir.path(), TemplateFormat::Json)
        .expect("artifacts written");
    assert_eq!(artifacts.template, dir.path().join("web.template"));
    assert_eq!(artifacts.arguments, dir.path().join("web.arguments"));

    let raw: Value = serde_json::from_str(&fs::read_to_string(&artifacts.template).unwrap()).unwrap();
    assert_eq!(raw["AWSTemplateFormatVersion"], FORMAT_VERSION);
    assert_eq!(raw["Resources"]["Web"]["DependsOn"], json!(["VPC"]));

    let arguments: Value =
        serde_json::from_str(&fs::read_to_string(&artifacts.arguments).unwrap()).unwrap();
    let ami = arguments
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["ParameterKey"] == "WebAMI")
        .expect("WebAMI argument");
    assert_eq!(ami["ParameterValue"], Value::Null);

    let loaded = template::load(&artifacts.template, &artifacts.arguments).expect("loads back");
    let unbound: Vec<_> = loaded.unbound_arguments().map(|a| a.key.as_str()).collect();
    assert_eq!(unbound, vec!["WebAMI"]);
    let resource_keys: Vec<_> = loaded.template.resources.keys().map(String::as_str).collect();
    assert_eq!(resource_keys, vec!["VPC", "DNSZone", "Web"]);
}

#[test]
fn yaml_templates_load_like_json() {
    let dir = tempdir().expect("temp dir");
    let json_dir = dir.path().join("json");
    let yaml_dir = dir.path().join("yaml");
    let config = web_config();

    let from_json = {
        let artifacts = template::generate(&config, "web", &json_dir, TemplateFormat::Json).unwrap();
        template::load(&artifacts.template, &artifacts.arguments).unwrap()
    };
    let from_yaml = {
        let artifacts = template::generate(&config, "web", &yaml_dir, TemplateFormat::Yaml).unwrap();
        let body = fs::read_to_string(&artifacts.template).unwrap();
        assert!(!body.trim_start().starts_with('{'));
        template::load(&artifacts.template, &artifacts.arguments).unwrap()
    };
    assert_eq!(from_json, from_yaml);
}

#[test]
fn load_rejects_arguments_without_parameters() {
    let dir = tempdir().expect("temp dir");
    let artifacts = template::generate(&web_config(), "web", dir.path(), TemplateFormat::Json).unwrap();

    let mut arguments: Vec<Value> =
        serde_json::from_str(&fs::read_to_string(&artifacts.arguments).unwrap()).unwrap();
    arguments.push(json!({ "ParameterKey": "Stray", "ParameterValue": "x" }));
    fs::write(&artifacts.arguments, serde_json::to_string(&arguments).unwrap()).unwrap();

    let err = template::load(&artifacts.template, &artifacts.arguments).unwrap_err();
    assert!(matches!(err, StackError::Config(ref message) if message.contains("Stray")));
}

#[test]
fn load_rejects_parameters_without_arguments() {
    let dir = tempdir().expect("temp dir");
    let artifacts = template::generate(&web_config(), "web", dir.path(), TemplateFormat::Json).unwrap();

    let mut arguments: Vec<Value> =
        serde_json::from_str(&fs::read_to_string(&artifacts.arguments).unwrap()).unwrap();
    arguments.retain(|entry| entry["ParameterKey"] != "WebAMI");
    fs::write(&artifacts.arguments, serde_json::to_string(&arguments).unwrap()).unwrap();

    let err = template::load(&artifacts.template, &artifacts.arguments).unwrap_err();
    assert!(err.to_string().contains("WebAMI"), "unexpected error: {err}");
}

#[test]
fn generate_refuses_dangling_references() {
    let dir = tempdir().expect("temp dir");
    let mut config = web_config();
    config.add_resource(
        "Worker",
        Resource::new("AWS::EC2::Instance", json!({ "ImageId": reference("WorkerAMI") })),
    );
    let err = template::generate(&config, "web", dir.path(), TemplateFormat::Json).unwrap_err();
    assert!(matches!(err, StackError::DanglingReference { .. }));
    assert!(!dir.path().join("web.template").exists());
}
