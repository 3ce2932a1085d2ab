//! Resource-kind operations on [`Configuration`].
//!
//! Cross references are always other keys of the same configuration (resources
//! or parameters). Operations that create a fixed pair of resources register
//! both before returning.

mod compute;
mod data;
mod dns;
mod monitoring;
mod network;

pub use compute::{AutoScaleSpec, InstanceSpec, Listener, LoadBalancerSpec};
pub use data::{
    AttributeDefinition, CacheSpec, DatabaseCredentials, DatabaseSpec, KeySchemaElement, ProvisionedThroughput,
    TableSchema,
};
pub use dns::{AliasAttribute, AliasRole, DEFAULT_TTL};
pub use monitoring::{AlarmSpec, Subscription};
pub use network::{DNS_ZONE_KEY, IngressRule, Port, Protocol, RouteTarget};

use crate::args::Arg;
use crate::configuration::Configuration;

impl Configuration {
    /// Registers the `<vpc>Domain` argument shared by every tagged network resource.
    pub(crate) fn add_vpc_domain_arg(&mut self, vpc: &str) {
        let domain = self.vpc_domain().to_string();
        self.add_arg(Arg::string(
            format!("{vpc}Domain"),
            domain,
            format!("Domain of the VPC '{vpc}'"),
        ));
    }
}

pub(crate) fn owned_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    keys.into_iter().map(Into::into).collect()
}

/// Hostnames become identifiers that may not contain dots.
pub(crate) fn dashed(hostname: &str) -> String {
    hostname.replace('.', "-")
}
