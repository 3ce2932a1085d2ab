use serde_json::{Value, json};

use crate::builder::network::DNS_ZONE_KEY;
use crate::configuration::{Configuration, Resource};
use crate::error::{Result, StackError};
use crate::intrinsic::{get_att, join, reference};

pub const DEFAULT_TTL: &str = "300";

/// Kind of resource a DNS alias points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasRole {
    Database,
    SingleNodeCache,
    ReplicaCache,
    ComputeInstance,
}

/// Attribute path holding a role's address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasAttribute {
    Supported(&'static str),
    Unsupported {
        attribute: &'static str,
        reason: &'static str,
    },
}

impl AliasRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasRole::Database => "database",
            AliasRole::SingleNodeCache => "single_node_cache",
            AliasRole::ReplicaCache => "replica_cache",
            AliasRole::ComputeInstance => "compute_instance",
        }
    }

    pub fn address_attribute(&self) -> AliasAttribute {
        match self {
            AliasRole::Database => AliasAttribute::Supported("Endpoint.Address"),
            AliasRole::SingleNodeCache => AliasAttribute::Unsupported {
                attribute: "ConfigurationEndpoint.Address",
                reason: "Fn::GetAtt only exposes ConfigurationEndpoint for memcached clusters",
            },
            AliasRole::ReplicaCache => AliasAttribute::Supported("PrimaryEndPoint.Address"),
            AliasRole::ComputeInstance => AliasAttribute::Supported("PrivateDnsName"),
        }
    }

    /// The attribute path, or the unsupported-role error for `key`.
    pub fn require_attribute(&self, key: &str) -> Result<&'static str> {
        match self.address_attribute() {
            AliasAttribute::Supported(attribute) => Ok(attribute),
            AliasAttribute::Unsupported { reason, .. } => Err(StackError::UnsupportedAlias {
                key: key.to_string(),
                role: self.as_str(),
                reason,
            }),
        }
    }
}

impl Configuration {
    /// CNAME `<key>Record` mapping `hostname` to the address of resource `key`
    /// inside the `VPC` hosted zone.
    pub fn add_dns_alias(&mut self, key: &str, hostname: &str, role: AliasRole) -> Result<()> {
        self.add_dns_alias_in(key, hostname, role, "VPC", DEFAULT_TTL)
    }

    pub fn add_dns_alias_in(
        &mut self,
        key: &str,
        hostname: &str,
        role: AliasRole,
        vpc: &str,
        ttl: &str,
    ) -> Result<()> {
        let attribute = role.require_attribute(key)?;

        let mut record = Resource::new(
            "AWS::Route53::RecordSet",
            json!({
                "HostedZoneName": join("", vec![reference(&format!("{vpc}Domain")), json!(".")]),
                "Name": hostname,
                "ResourceRecords": [get_att(key, attribute)],
                "TTL": ttl,
                "Type": "CNAME",
            }),
        );
        if self.resource(DNS_ZONE_KEY).is_some() {
            record = record.depends_on([DNS_ZONE_KEY]);
        }
        self.add_resource(format!("{key}Record"), record);
        self.add_vpc_domain_arg(vpc);
        Ok(())
    }

    /// Free-form CNAME in an existing public hosted zone.
    pub fn add_route53_record_set(
        &mut self,
        key: &str,
        full_domain_name: &str,
        cname_value: Value,
        hosted_zone_name: &str,
    ) {
        self.add_resource(
            key,
            Resource::new(
                "AWS::Route53::RecordSet",
                json!({
                    "HostedZoneName": hosted_zone_name,
                    "Name": full_domain_name,
                    "Type": "CNAME",
                    "ResourceRecords": [cname_value],
                    "TTL": 300,
                }),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::DEFAULT_REGION;
    use crate::lookup::HostTable;
    use crate::scenario::Scenario;

    fn config() -> Configuration {
        Configuration::new(
            "example.boss",
            DEFAULT_REGION,
            Scenario::default(),
            &HostTable::default(),
        )
        .unwrap()
    }

    #[test]
    fn every_role_maps_to_an_attribute() {
        assert_eq!(
            AliasRole::Database.address_attribute(),
            AliasAttribute::Supported("Endpoint.Address")
        );
        assert_eq!(
            AliasRole::ReplicaCache.address_attribute(),
            AliasAttribute::Supported("PrimaryEndPoint.Address")
        );
        assert_eq!(
            AliasRole::ComputeInstance.address_attribute(),
            AliasAttribute::Supported("PrivateDnsName")
        );
        assert!(matches!(
            AliasRole::SingleNodeCache.address_attribute(),
            AliasAttribute::Unsupported {
                attribute: "ConfigurationEndpoint.Address",
                ..
            }
        ));
    }

    #[test]
    fn single_node_cache_alias_fails_without_registering() {
        let mut config = config();
        let err = config
            .add_dns_alias("Cache", "cache.example.boss", AliasRole::SingleNodeCache)
            .unwrap_err();
        assert!(matches!(err, StackError::UnsupportedAlias { .. }));
        assert!(config.resources().is_empty());
        assert!(config.parameters().is_empty());
    }

    #[test]
    fn alias_waits_for_dns_zone_when_present() {
        let mut config = config();
        config
            .add_dns_alias("Web", "web.example.boss", AliasRole::ComputeInstance)
            .unwrap();
        assert!(config.resource("WebRecord").unwrap().depends_on.is_empty());

        config.add_vpc("VPC");
        config
            .add_dns_alias("Web", "web.example.boss", AliasRole::ComputeInstance)
            .unwrap();
        let record = config.resource("WebRecord").unwrap();
        assert_eq!(record.depends_on, vec![DNS_ZONE_KEY]);
        assert_eq!(
            record.property("ResourceRecords").unwrap()[0],
            get_att("Web", "PrivateDnsName")
        );
    }
}
