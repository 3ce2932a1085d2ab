//! The in-memory deployment document: resources, parameters and arguments.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::args::{Arg, Argument, ParameterSpec};
use crate::error::{Result, StackError};
use crate::intrinsic::{attribute_targets, referenced_keys};
use crate::lookup::DomainLookup;
use crate::scenario::Scenario;

pub const DEFAULT_REGION: &str = "us-east-1";

/// One template `Resources` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Properties", default)]
    pub properties: Map<String, Value>,
    #[serde(
        rename = "DependsOn",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub depends_on: Vec<String>,
    #[serde(rename = "Metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Resource {
    /// `properties` is expected to be a JSON object; anything else yields an
    /// empty property bag.
    pub fn new(kind: impl Into<String>, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            kind: kind.into(),
            properties,
            depends_on: Vec::new(),
            metadata: None,
        }
    }

    pub fn depends_on<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            let key = key.into();
            if !self.depends_on.contains(&key) {
                self.depends_on.push(key);
            }
        }
        self
    }

    pub fn with_metadata(mut self, metadata: Option<Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn set(&mut self, property: &str, value: Value) {
        self.properties.insert(property.to_string(), value);
    }

    pub fn property(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(key) => vec![key],
        OneOrMany::Many(keys) => keys,
    })
}

/// Network placement derived from the configuration's domain name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDomain {
    pub vpc_domain: String,
    pub vpc_cidr: Option<String>,
    pub subnet_domain: Option<String>,
    pub subnet_cidr: Option<String>,
}

impl NetworkDomain {
    /// Accepts `<vpc>.<tld>` or `<subnet>.<vpc>.<tld>`.
    pub fn parse(domain: &str, lookup: &dyn DomainLookup) -> Result<Self> {
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.iter().any(|label| label.is_empty()) {
            return Err(StackError::InvalidDomain {
                domain: domain.to_string(),
            });
        }
        match labels.len() {
            2 => Ok(Self {
                vpc_domain: domain.to_string(),
                vpc_cidr: lookup.lookup(domain),
                subnet_domain: None,
                subnet_cidr: None,
            }),
            3 => {
                let vpc_domain = labels[1..].join(".");
                Ok(Self {
                    vpc_cidr: lookup.lookup(&vpc_domain),
                    vpc_domain,
                    subnet_domain: Some(domain.to_string()),
                    subnet_cidr: lookup.lookup(domain),
                })
            }
            _ => Err(StackError::InvalidDomain {
                domain: domain.to_string(),
            }),
        }
    }
}

/// Resources, parameters and bound arguments for one deployment target.
///
/// Parameters and arguments only ever grow together through [`Configuration::add_arg`].
#[derive(Debug, Clone)]
pub struct Configuration {
    resources: IndexMap<String, Resource>,
    parameters: IndexMap<String, ParameterSpec>,
    arguments: Vec<Argument>,
    network: NetworkDomain,
    region: String,
    scenario: Scenario,
}

impl Configuration {
    pub fn new(
        domain: &str,
        region: impl Into<String>,
        scenario: Scenario,
        lookup: &dyn DomainLookup,
    ) -> Result<Self> {
        Ok(Self {
            resources: IndexMap::new(),
            parameters: IndexMap::new(),
            arguments: Vec::new(),
            network: NetworkDomain::parse(domain, lookup)?,
            region: region.into(),
            scenario,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn network(&self) -> &NetworkDomain {
        &self.network
    }

    pub fn vpc_domain(&self) -> &str {
        &self.network.vpc_domain
    }

    pub fn subnet_domain(&self) -> Option<&str> {
        self.network.subnet_domain.as_deref()
    }

    /// Point subsequent subnet operations at `domain`, resolving its CIDR.
    pub fn select_subnet_domain(&mut self, domain: &str, lookup: &dyn DomainLookup) {
        self.network.subnet_cidr = lookup.lookup(domain);
        self.network.subnet_domain = Some(domain.to_string());
    }

    pub fn resources(&self) -> &IndexMap<String, Resource> {
        &self.resources
    }

    pub fn parameters(&self) -> &IndexMap<String, ParameterSpec> {
        &self.parameters
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn resource(&self, key: &str) -> Option<&Resource> {
        self.resources.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.resources.contains_key(key) || self.parameters.contains_key(key)
    }

    /// Register a parameter with its argument. The first binding of a key wins;
    /// returns whether the arg was added.
    pub fn add_arg(&mut self, arg: Arg) -> bool {
        if self.parameters.contains_key(&arg.key) {
            return false;
        }
        self.parameters.insert(arg.key, arg.parameter);
        self.arguments.push(arg.argument);
        true
    }

    /// Insert or replace a resource definition.
    pub fn add_resource(&mut self, key: impl Into<String>, resource: Resource) {
        self.resources.insert(key.into(), resource);
    }

    pub(crate) fn resource_mut(&mut self, key: &str) -> Option<&mut Resource> {
        self.resources.get_mut(key)
    }

    pub fn unbound_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|argument| !argument.is_bound())
    }

    /// `(resource, target)` pairs whose target is neither a resource nor a parameter.
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        dangling_references(&self.resources, |key| self.contains_key(key))
    }

    pub fn validate_references(&self) -> Result<()> {
        match self.dangling_references().into_iter().next() {
            Some((resource, target)) => Err(StackError::DanglingReference { resource, target }),
            None => Ok(()),
        }
    }
}

pub(crate) fn dangling_references<F>(
    resources: &IndexMap<String, Resource>,
    exists: F,
) -> Vec<(String, String)>
where
    F: Fn(&str) -> bool,
{
    let mut dangling = Vec::new();
    for (key, resource) in resources {
        let properties = Value::Object(resource.properties.clone());
        let mut targets = referenced_keys(&properties);
        let mut attributes = attribute_targets(&properties);
        if let Some(metadata) = &resource.metadata {
            targets.extend(referenced_keys(metadata));
            attributes.extend(attribute_targets(metadata));
        }
        for target in targets {
            let known = if attributes.contains(&target) {
                resources.contains_key(&target)
            } else {
                exists(&target)
            };
            if !known {
                dangling.push((key.clone(), target));
            }
        }
        for edge in &resource.depends_on {
            if !resources.contains_key(edge) {
                dangling.push((key.clone(), edge.clone()));
            }
        }
    }
    dangling
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsic::{get_att, reference};
    use crate::lookup::HostTable;
    use serde_json::json;

    fn hosts() -> HostTable {
        let mut table = HostTable::default();
        table.insert("example.boss", "10.0.0.0/16").unwrap();
        table.insert("internal.example.boss", "10.0.1.0/24").unwrap();
        table
    }

    #[test]
    fn vpc_domain_has_no_subnet() {
        let config =
            Configuration::new("example.boss", DEFAULT_REGION, Scenario::default(), &hosts())
                .unwrap();
        assert_eq!(config.vpc_domain(), "example.boss");
        assert_eq!(config.network().vpc_cidr.as_deref(), Some("10.0.0.0/16"));
        assert_eq!(config.subnet_domain(), None);
    }

    #[test]
    fn subnet_domain_derives_vpc_domain() {
        let config = Configuration::new(
            "internal.example.boss",
            DEFAULT_REGION,
            Scenario::default(),
            &hosts(),
        )
        .unwrap();
        assert_eq!(config.vpc_domain(), "example.boss");
        assert_eq!(config.subnet_domain(), Some("internal.example.boss"));
        assert_eq!(config.network().subnet_cidr.as_deref(), Some("10.0.1.0/24"));
    }

    #[test]
    fn rejects_malformed_domains() {
        for domain in ["boss", "a.b.c.d", "a..b"] {
            let err = Configuration::new(domain, DEFAULT_REGION, Scenario::default(), &hosts())
                .unwrap_err();
            assert!(matches!(err, StackError::InvalidDomain { .. }), "{domain}");
        }
    }

    #[test]
    fn add_arg_is_idempotent_and_keeps_first_binding() {
        let mut config =
            Configuration::new("example.boss", DEFAULT_REGION, Scenario::default(), &hosts())
                .unwrap();
        assert!(config.add_arg(Arg::string("VPCDomain", "example.boss", "")));
        assert!(!config.add_arg(Arg::string("VPCDomain", "other.boss", "")));
        assert_eq!(config.parameters().len(), 1);
        assert_eq!(config.arguments().len(), 1);
        assert_eq!(config.arguments()[0].value.as_deref(), Some("example.boss"));
    }

    #[test]
    fn detects_dangling_references_and_edges() {
        let mut config =
            Configuration::new("example.boss", DEFAULT_REGION, Scenario::default(), &hosts())
                .unwrap();
        config.add_resource(
            "Web",
            Resource::new("AWS::EC2::Instance", json!({ "SubnetId": reference("Subnet") }))
                .depends_on(["DB"]),
        );
        let dangling = config.dangling_references();
        assert_eq!(
            dangling,
            vec![
                ("Web".to_string(), "Subnet".to_string()),
                ("Web".to_string(), "DB".to_string())
            ]
        );
        assert!(matches!(
            config.validate_references(),
            Err(StackError::DanglingReference { .. })
        ));

        config.add_arg(Arg::subnet("Subnet", None::<String>, ""));
        config.add_resource("DB", Resource::new("AWS::RDS::DBInstance", json!({})));
        config.validate_references().unwrap();
    }

    #[test]
    fn attributes_of_parameters_are_dangling() {
        let mut config =
            Configuration::new("example.boss", DEFAULT_REGION, Scenario::default(), &hosts())
                .unwrap();
        config.add_arg(Arg::instance("Nat", "i-1234", ""));
        config.add_resource(
            "NatRecord",
            Resource::new(
                "AWS::Route53::RecordSet",
                json!({ "ResourceRecords": [get_att("Nat", "PrivateDnsName")] }),
            ),
        );
        assert_eq!(
            config.dangling_references(),
            vec![("NatRecord".to_string(), "Nat".to_string())]
        );

        config.add_resource(
            "Worker",
            Resource::new("AWS::EC2::Instance", json!({ "Tags": [reference("Nat")] })),
        );
        assert_eq!(config.dangling_references().len(), 1);
    }

    #[test]
    fn depends_on_reads_a_single_string() {
        let resource: Resource = serde_json::from_value(json!({
            "Type": "AWS::EC2::Route",
            "Properties": {},
            "DependsOn": "Gateway",
        }))
        .unwrap();
        assert_eq!(resource.depends_on, vec!["Gateway"]);
    }
}
