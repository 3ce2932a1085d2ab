use serde_json::{Value, json};

use crate::args::{Arg, ArgValue};
use crate::builder::dns::AliasRole;
use crate::builder::{dashed, owned_keys};
use crate::configuration::{Configuration, Resource};
use crate::error::Result;
use crate::intrinsic::{base64, bool_str, name_tags, reference, references, stack_name};
use crate::lookup::ImageRef;
use crate::scenario::ScenarioValue;

pub const DEFAULT_INSTANCE_TYPE: &str = "t2.micro";
pub const DEFAULT_HEALTH_CHECK: &str = "HTTP:80/ping/";

/// Inputs of [`Configuration::add_ec2_instance`].
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub key: String,
    pub hostname: String,
    pub image: ImageRef,
    pub keypair: ArgValue,
    pub subnet: String,
    pub instance_type: ScenarioValue<String>,
    /// Whether the interface drops traffic not addressed to itself (off for NAT).
    pub source_dest_check: bool,
    pub public_ip: bool,
    pub security_groups: Vec<String>,
    pub user_data: Option<Value>,
    pub metadata: Option<Value>,
    pub depends_on: Vec<String>,
}

impl InstanceSpec {
    pub fn new(
        key: impl Into<String>,
        hostname: impl Into<String>,
        image: impl Into<ImageRef>,
        keypair: impl Into<ArgValue>,
    ) -> Self {
        Self {
            key: key.into(),
            hostname: hostname.into(),
            image: image.into(),
            keypair: keypair.into(),
            subnet: "Subnet".to_string(),
            instance_type: ScenarioValue::Scalar(DEFAULT_INSTANCE_TYPE.to_string()),
            source_dest_check: true,
            public_ip: false,
            security_groups: Vec::new(),
            user_data: None,
            metadata: None,
            depends_on: Vec::new(),
        }
    }

    pub fn subnet(mut self, subnet: impl Into<String>) -> Self {
        self.subnet = subnet.into();
        self
    }

    pub fn instance_type(mut self, instance_type: impl Into<ScenarioValue<String>>) -> Self {
        self.instance_type = instance_type.into();
        self
    }

    pub fn source_dest_check(mut self, enabled: bool) -> Self {
        self.source_dest_check = enabled;
        self
    }

    pub fn public_ip(mut self, enabled: bool) -> Self {
        self.public_ip = enabled;
        self
    }

    pub fn security_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.security_groups = owned_keys(groups);
        self
    }

    /// Plain text or a template expression (e.g. `Fn::Join` over `Fn::GetAtt`).
    pub fn user_data(mut self, user_data: impl Into<Value>) -> Self {
        self.user_data = Some(user_data.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn depends_on<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = owned_keys(keys);
        self
    }
}

/// One load balancer listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub elb_port: u16,
    pub instance_port: u16,
    pub protocol: String,
    pub ssl_certificate_id: Option<String>,
}

impl Listener {
    pub fn new(elb_port: u16, instance_port: u16, protocol: impl Into<String>) -> Self {
        Self {
            elb_port,
            instance_port,
            protocol: protocol.into(),
            ssl_certificate_id: None,
        }
    }

    pub fn with_certificate(mut self, certificate_id: impl Into<String>) -> Self {
        self.ssl_certificate_id = Some(certificate_id.into());
        self
    }
}

/// Inputs of [`Configuration::add_loadbalancer`].
#[derive(Debug, Clone)]
pub struct LoadBalancerSpec {
    pub key: String,
    pub name: String,
    pub listeners: Vec<Listener>,
    pub instances: Vec<String>,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub health_check_target: String,
    pub depends_on: Vec<String>,
}

impl LoadBalancerSpec {
    pub fn new(key: impl Into<String>, name: impl Into<String>, listeners: Vec<Listener>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            listeners,
            instances: Vec::new(),
            subnets: Vec::new(),
            security_groups: Vec::new(),
            health_check_target: DEFAULT_HEALTH_CHECK.to_string(),
            depends_on: Vec::new(),
        }
    }

    pub fn instances<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instances = owned_keys(keys);
        self
    }

    pub fn subnets<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subnets = owned_keys(keys);
        self
    }

    pub fn security_groups<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.security_groups = owned_keys(keys);
        self
    }

    pub fn health_check_target(mut self, target: impl Into<String>) -> Self {
        self.health_check_target = target.into();
        self
    }

    pub fn depends_on<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = owned_keys(keys);
        self
    }
}

/// Inputs of [`Configuration::add_autoscale_group`].
#[derive(Debug, Clone)]
pub struct AutoScaleSpec {
    pub key: String,
    pub hostname: String,
    pub image: ImageRef,
    pub keypair: ArgValue,
    pub subnets: Vec<String>,
    pub instance_type: ScenarioValue<String>,
    pub public_ip: bool,
    pub security_groups: Vec<String>,
    pub user_data: Option<Value>,
    pub min: ScenarioValue<u32>,
    pub max: ScenarioValue<u32>,
    pub load_balancer: Option<String>,
    pub depends_on: Vec<String>,
}

impl AutoScaleSpec {
    pub fn new(
        key: impl Into<String>,
        hostname: impl Into<String>,
        image: impl Into<ImageRef>,
        keypair: impl Into<ArgValue>,
    ) -> Self {
        Self {
            key: key.into(),
            hostname: hostname.into(),
            image: image.into(),
            keypair: keypair.into(),
            subnets: vec!["Subnet".to_string()],
            instance_type: ScenarioValue::Scalar(DEFAULT_INSTANCE_TYPE.to_string()),
            public_ip: false,
            security_groups: Vec::new(),
            user_data: None,
            min: ScenarioValue::Scalar(1),
            max: ScenarioValue::Scalar(1),
            load_balancer: None,
            depends_on: Vec::new(),
        }
    }

    pub fn subnets<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subnets = owned_keys(keys);
        self
    }

    pub fn instance_type(mut self, instance_type: impl Into<ScenarioValue<String>>) -> Self {
        self.instance_type = instance_type.into();
        self
    }

    pub fn public_ip(mut self, enabled: bool) -> Self {
        self.public_ip = enabled;
        self
    }

    pub fn security_groups<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.security_groups = owned_keys(keys);
        self
    }

    pub fn user_data(mut self, user_data: impl Into<Value>) -> Self {
        self.user_data = Some(user_data.into());
        self
    }

    pub fn size(mut self, min: impl Into<ScenarioValue<u32>>, max: impl Into<ScenarioValue<u32>>) -> Self {
        self.min = min.into();
        self.max = max.into();
        self
    }

    pub fn load_balancer(mut self, key: impl Into<String>) -> Self {
        self.load_balancer = Some(key.into());
        self
    }

    pub fn depends_on<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = owned_keys(keys);
        self
    }
}

impl Configuration {
    /// EC2 instance plus a `<key>Record` alias for its private DNS name.
    pub fn add_ec2_instance(&mut self, spec: InstanceSpec) -> Result<()> {
        let key = spec.key.as_str();
        let instance_type = spec
            .instance_type
            .resolve(self.scenario(), DEFAULT_INSTANCE_TYPE.to_string());

        let mut tags = name_tags(reference(&format!("{key}Hostname")));
        if let (Some(commit), Value::Array(tags)) = (&spec.image.commit, &mut tags) {
            tags.push(json!({ "Key": "AMI Commit", "Value": commit }));
        }

        let mut interface = json!({
            "AssociatePublicIpAddress": bool_str(spec.public_ip),
            "DeviceIndex": "0",
            "DeleteOnTermination": "true",
            "SubnetId": reference(&spec.subnet),
        });
        if !spec.security_groups.is_empty() {
            interface["GroupSet"] = references(&spec.security_groups);
        }

        let mut resource = Resource::new(
            "AWS::EC2::Instance",
            json!({
                "ImageId": reference(&format!("{key}AMI")),
                "InstanceType": instance_type,
                "KeyName": reference(&format!("{key}Key")),
                "SourceDestCheck": bool_str(spec.source_dest_check),
                "Tags": tags,
                "NetworkInterfaces": [interface],
            }),
        )
        .depends_on(spec.depends_on.iter().cloned())
        .with_metadata(spec.metadata.clone());
        if let Some(user_data) = &spec.user_data {
            resource.set("UserData", base64(user_data.clone()));
        }

        self.add_dns_alias(key, &spec.hostname, AliasRole::ComputeInstance)?;
        self.add_resource(key, resource);

        self.add_arg(Arg::ami(
            format!("{key}AMI"),
            spec.image.id.clone(),
            format!("AMI for the EC2 Instance '{key}'"),
        ));
        self.add_arg(Arg::key_pair(
            format!("{key}Key"),
            spec.keypair.clone(),
            &spec.hostname,
        ));
        self.add_arg(Arg::string(
            format!("{key}Hostname"),
            spec.hostname.as_str(),
            format!("Hostname of the EC2 Instance '{key}'"),
        ));
        Ok(())
    }

    /// Classic load balancer with cookie stickiness on every listener.
    pub fn add_loadbalancer(&mut self, spec: LoadBalancerSpec) {
        let key = spec.key.as_str();
        let policy = format!("{key}Policy");

        let listeners: Vec<Value> = spec
            .listeners
            .iter()
            .map(|listener| {
                let mut value = json!({
                    "LoadBalancerPort": listener.elb_port.to_string(),
                    "InstancePort": listener.instance_port.to_string(),
                    "Protocol": listener.protocol,
                    "PolicyNames": [policy],
                });
                if let Some(certificate) = &listener.ssl_certificate_id {
                    value["SSLCertificateId"] = json!(certificate);
                }
                value
            })
            .collect();

        let mut resource = Resource::new(
            "AWS::ElasticLoadBalancing::LoadBalancer",
            json!({
                "CrossZone": true,
                "HealthCheck": {
                    "Target": spec.health_check_target,
                    "HealthyThreshold": "2",
                    "UnhealthyThreshold": "2",
                    "Interval": "30",
                    "Timeout": "5",
                },
                "LBCookieStickinessPolicy": [{ "PolicyName": policy }],
                // load balancer names may not contain periods
                "LoadBalancerName": dashed(&spec.name),
                "Listeners": listeners,
                "Tags": [{ "Key": "Stack", "Value": stack_name() }],
            }),
        )
        .depends_on(spec.depends_on.iter().cloned());

        if !spec.instances.is_empty() {
            resource.set("Instances", references(&spec.instances));
        }
        if !spec.security_groups.is_empty() {
            resource.set("SecurityGroups", references(&spec.security_groups));
        }
        if !spec.subnets.is_empty() {
            resource.set("Subnets", references(&spec.subnets));
        }
        self.add_resource(key, resource);
    }

    /// Autoscaling group plus its `<key>Configuration` launch configuration.
    pub fn add_autoscale_group(&mut self, spec: AutoScaleSpec) {
        let key = spec.key.as_str();
        let scenario = self.scenario().clone();

        let mut tags = vec![
            json!({ "Key": "Stack", "Value": stack_name(), "PropagateAtLaunch": "true" }),
            json!({
                "Key": "Name",
                "Value": reference(&format!("{key}Hostname")),
                "PropagateAtLaunch": "true",
            }),
        ];
        if let Some(commit) = &spec.image.commit {
            tags.push(json!({ "Key": "AMI Commit", "Value": commit, "PropagateAtLaunch": "true" }));
        }

        let (health_check, load_balancers) = match &spec.load_balancer {
            Some(elb) => ("ELB", json!([reference(elb)])),
            None => ("EC2", json!([])),
        };

        self.add_resource(
            key,
            Resource::new(
                "AWS::AutoScaling::AutoScalingGroup",
                json!({
                    "HealthCheckType": health_check,
                    "HealthCheckGracePeriod": 30,
                    "LaunchConfigurationName": reference(&format!("{key}Configuration")),
                    "LoadBalancerNames": load_balancers,
                    "MaxSize": spec.max.resolve(&scenario, 1).to_string(),
                    "MinSize": spec.min.resolve(&scenario, 1).to_string(),
                    "Tags": tags,
                    "VPCZoneIdentifier": references(&spec.subnets),
                }),
            )
            .depends_on(spec.depends_on.iter().cloned()),
        );

        let user_data = match &spec.user_data {
            Some(user_data) => base64(user_data.clone()),
            None => json!(""),
        };
        self.add_resource(
            format!("{key}Configuration"),
            Resource::new(
                "AWS::AutoScaling::LaunchConfiguration",
                json!({
                    "AssociatePublicIpAddress": spec.public_ip,
                    "ImageId": reference(&format!("{key}AMI")),
                    "InstanceMonitoring": false,
                    "InstanceType": spec
                        .instance_type
                        .resolve(&scenario, DEFAULT_INSTANCE_TYPE.to_string()),
                    "KeyName": reference(&format!("{key}Key")),
                    "SecurityGroups": references(&spec.security_groups),
                    "UserData": user_data,
                }),
            ),
        );

        self.add_arg(Arg::ami(
            format!("{key}AMI"),
            spec.image.id.clone(),
            format!("AMI for the EC2 Instance '{key}'"),
        ));
        self.add_arg(Arg::key_pair(
            format!("{key}Key"),
            spec.keypair.clone(),
            &spec.hostname,
        ));
        self.add_arg(Arg::string(
            format!("{key}Hostname"),
            spec.hostname.as_str(),
            format!("Hostname of the EC2 Instance '{key}'"),
        ));
    }
}
