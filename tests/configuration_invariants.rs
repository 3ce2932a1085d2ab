use cfn_stacks::{
    Arg, Configuration, HostTable, Resource, Scenario, StackError, intrinsic::reference,
};
use serde_json::json;

fn hosts() -> HostTable {
    HostTable::parse(
        r#"
        [domains]
        "example.boss" = "10.0.0.0/16"
        "internal.example.boss" = "10.0.1.0/24"
        "#,
    )
    .expect("host table parses")
}

fn config(domain: &str) -> Configuration {
    Configuration::new(domain, "us-east-1", Scenario::default(), &hosts()).expect("valid domain")
}

#[test]
fn vpc_and_subnet_domains_resolve_through_host_table() {
    let vpc_only = config("example.boss");
    assert_eq!(vpc_only.vpc_domain(), "example.boss");
    assert_eq!(vpc_only.subnet_domain(), None);
    assert_eq!(vpc_only.network().vpc_cidr.as_deref(), Some("10.0.0.0/16"));

    let subnet = config("internal.example.boss");
    assert_eq!(subnet.vpc_domain(), "example.boss");
    assert_eq!(subnet.subnet_domain(), Some("internal.example.boss"));
    assert_eq!(subnet.network().subnet_cidr.as_deref(), Some("10.0.1.0/24"));
}

#[test]
fn rejects_domains_with_wrong_label_count() {
    for domain in ["boss", "a.b.c.d", "example..boss", ""] {
        let err = Configuration::new(domain, "us-east-1", Scenario::default(), &hosts())
            .expect_err("domain should be rejected");
        assert!(
            matches!(err, StackError::InvalidDomain { .. }),
            "unexpected error for '{domain}': {err}"
        );
    }
}

#[test]
fn first_binding_of_an_argument_wins() {
    let mut config = config("example.boss");
    assert!(config.add_arg(Arg::string("WebDomain", "example.boss", "first")));
    assert!(!config.add_arg(Arg::string("WebDomain", "other.boss", "second")));

    assert_eq!(config.parameters().len(), 1);
    assert_eq!(config.arguments().len(), 1);
    assert_eq!(config.parameters()["WebDomain"].description, "first");
    assert_eq!(config.arguments()[0].value.as_deref(), Some("example.boss"));
}

#[test]
fn parameters_and_arguments_stay_in_lockstep() {
    let mut config = config("internal.example.boss");
    config.add_vpc("VPC");
    config.add_subnet("Subnet", "VPC", None);
    config.add_internet_gateway("Gateway", "gateway", "VPC");

    let parameter_keys: Vec<_> = config.parameters().keys().cloned().collect();
    let argument_keys: Vec<_> = config.arguments().iter().map(|a| a.key.clone()).collect();
    assert_eq!(parameter_keys, argument_keys);
    config.validate_references().expect("all references resolve");
}

#[test]
fn unresolved_lookups_stay_unbound() {
    let mut config = Configuration::new(
        "example.boss",
        "us-east-1",
        Scenario::default(),
        &HostTable::default(),
    )
    .unwrap();
    config.add_vpc("VPC");

    let unbound: Vec<_> = config.unbound_arguments().map(|a| a.key.as_str()).collect();
    assert_eq!(unbound, vec!["VPCSubnet"]);
}

#[test]
fn dangling_reference_names_resource_and_target() {
    let mut config = config("example.boss");
    config.add_resource(
        "Web",
        Resource::new("AWS::EC2::Instance", json!({ "SubnetId": reference("Missing") })),
    );
    assert_eq!(
        config.dangling_references(),
        vec![("Web".to_string(), "Missing".to_string())]
    );
    match config.validate_references() {
        Err(StackError::DanglingReference { resource, target }) => {
            assert_eq!(resource, "Web");
            assert_eq!(target, "Missing");
        }
        other => panic!("expected dangling reference, got {other:?}"),
    }
}

#[test]
fn pseudo_parameters_are_not_dangling() {
    let mut config = config("example.boss");
    config.add_resource(
        "Topic",
        Resource::new(
            "AWS::SNS::Topic",
            json!({ "DisplayName": reference("AWS::StackName") }),
        ),
    );
    config.validate_references().expect("pseudo parameters resolve");
}
