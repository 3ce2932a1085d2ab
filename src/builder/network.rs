use std::fmt;

use serde_json::{Value, json};

use crate::args::{Arg, ArgValue};
use crate::configuration::{Configuration, Resource};
use crate::error::{Result, StackError};
use crate::intrinsic::{join, name_tags, reference, stack_name};
use crate::lookup::{DomainLookup, ResourceLookup};

/// Key of the hosted zone created alongside a VPC.
pub const DNS_ZONE_KEY: &str = "DNSZone";

/// Ingress protocol; `Any` renders as the provider wildcard `-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    Any,
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Any => "-1",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        }
    }
}

/// Port bound of an ingress rule; `Any` renders as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Any,
    Number(u16),
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Any => f.write_str("-1"),
            Port::Number(port) => write!(f, "{port}"),
        }
    }
}

impl From<u16> for Port {
    fn from(value: u16) -> Self {
        Port::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub protocol: Protocol,
    pub from_port: Port,
    pub to_port: Port,
    pub cidr: String,
}

impl IngressRule {
    pub fn new(
        protocol: Protocol,
        from_port: impl Into<Port>,
        to_port: impl Into<Port>,
        cidr: impl Into<String>,
    ) -> Self {
        Self {
            protocol,
            from_port: from_port.into(),
            to_port: to_port.into(),
            cidr: cidr.into(),
        }
    }

    pub fn tcp(port: u16, cidr: impl Into<String>) -> Self {
        Self::new(Protocol::Tcp, port, port, cidr)
    }

    /// Everything from `cidr`.
    pub fn any(cidr: impl Into<String>) -> Self {
        Self::new(Protocol::Any, Port::Any, Port::Any, cidr)
    }

    fn to_value(&self) -> Value {
        json!({
            "IpProtocol": self.protocol.as_str(),
            "FromPort": self.from_port.to_string(),
            "ToPort": self.to_port.to_string(),
            "CidrIp": self.cidr,
        })
    }
}

/// Where a route sends traffic. Exactly one target per route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    Gateway(String),
    Peer(String),
    Instance(String),
}

impl RouteTarget {
    /// Adapts three optional targets, failing unless exactly one is set.
    pub fn exactly_one(
        route: &str,
        gateway: Option<&str>,
        peer: Option<&str>,
        instance: Option<&str>,
    ) -> Result<Self> {
        let given = [gateway, peer, instance]
            .iter()
            .filter(|target| target.is_some())
            .count();
        match (gateway, peer, instance) {
            (Some(key), None, None) => Ok(RouteTarget::Gateway(key.to_string())),
            (None, Some(key), None) => Ok(RouteTarget::Peer(key.to_string())),
            (None, None, Some(key)) => Ok(RouteTarget::Instance(key.to_string())),
            _ => Err(StackError::RouteTarget {
                route: route.to_string(),
                given,
            }),
        }
    }

    fn property(&self) -> (&'static str, &str) {
        match self {
            RouteTarget::Gateway(key) => ("GatewayId", key),
            RouteTarget::Peer(key) => ("VpcPeeringConnectionId", key),
            RouteTarget::Instance(key) => ("InstanceId", key),
        }
    }
}

impl Configuration {
    /// VPC named after the configuration's domain, plus its internal hosted zone.
    pub fn add_vpc(&mut self, key: &str) {
        self.add_resource(
            key,
            Resource::new(
                "AWS::EC2::VPC",
                json!({
                    "CidrBlock": reference(&format!("{key}Subnet")),
                    "EnableDnsSupport": "true",
                    "EnableDnsHostnames": "true",
                    "Tags": name_tags(reference(&format!("{key}Domain"))),
                }),
            ),
        );

        self.add_resource(
            DNS_ZONE_KEY,
            Resource::new(
                "AWS::Route53::HostedZone",
                json!({
                    "HostedZoneConfig": {
                        "Comment": format!("Internal DNS Zone for the VPC of {}", self.vpc_domain()),
                    },
                    "Name": reference(&format!("{key}Domain")),
                    "VPCs": [{
                        "VPCId": reference(key),
                        "VPCRegion": reference(&format!("{key}Region")),
                    }],
                }),
            ),
        );

        let cidr = self.network().vpc_cidr.clone();
        let region = self.region().to_string();
        self.add_arg(Arg::cidr(
            format!("{key}Subnet"),
            cidr,
            format!("Subnet of the VPC '{key}'"),
        ));
        self.add_vpc_domain_arg(key);
        self.add_arg(Arg::string(
            format!("{key}Region"),
            region,
            format!("Region of the VPC '{key}'"),
        ));
    }

    /// Subnet in the current subnet domain. `az = None` lets the provider choose.
    pub fn add_subnet(&mut self, key: &str, vpc: &str, az: Option<&str>) {
        let mut resource = Resource::new(
            "AWS::EC2::Subnet",
            json!({
                "VpcId": reference(vpc),
                "CidrBlock": reference(&format!("{key}Subnet")),
                "Tags": name_tags(reference(&format!("{key}Domain"))),
            }),
        );
        if let Some(az) = az {
            resource.set("AvailabilityZone", json!(az));
        }
        self.add_resource(key, resource);

        let cidr = self.network().subnet_cidr.clone();
        let domain = self.network().subnet_domain.clone();
        self.add_arg(Arg::cidr(
            format!("{key}Subnet"),
            cidr,
            format!("Subnet of the Subnet '{key}'"),
        ));
        self.add_arg(Arg::string(
            format!("{key}Domain"),
            domain,
            format!("Domain of the Subnet '{key}'"),
        ));
    }

    /// An internal and an external subnet per availability zone.
    ///
    /// Returns the `(internal, external)` subnet keys.
    pub fn add_all_azs(
        &mut self,
        vpc: &str,
        hosts: &dyn DomainLookup,
        resources: &dyn ResourceLookup,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let mut internal = Vec::new();
        let mut external = Vec::new();
        for (zone, suffix) in resources.availability_zones()? {
            for (side, keys) in [("internal", &mut internal), ("external", &mut external)] {
                let key = zone_subnet_key(&suffix, side);
                let domain = format!("{suffix}-{side}.{}", self.vpc_domain());
                self.select_subnet_domain(&domain, hosts);
                self.add_subnet(&key, vpc, Some(zone.as_str()));
                keys.push(key);
            }
        }
        Ok((internal, external))
    }

    /// Companion of [`Configuration::add_all_azs`] for subnets that already
    /// exist: adds a subnet-id argument per zone subnet.
    pub fn find_all_availability_zones(
        &mut self,
        resources: &dyn ResourceLookup,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let mut internal = Vec::new();
        let mut external = Vec::new();
        for (_zone, suffix) in resources.availability_zones()? {
            for (side, keys) in [("internal", &mut internal), ("external", &mut external)] {
                let key = zone_subnet_key(&suffix, side);
                let domain = format!("{suffix}-{side}.{}", self.vpc_domain());
                let id = resources.subnet_id(&domain)?;
                self.add_arg(Arg::subnet(
                    key.clone(),
                    id,
                    format!("ID of the {side} subnet '{domain}'"),
                ));
                keys.push(key);
            }
        }
        Ok((internal, external))
    }

    /// Security group whose name is suffixed with the VPC domain.
    pub fn add_security_group(&mut self, key: &str, name: &str, rules: &[IngressRule], vpc: &str) {
        let ports = rules
            .iter()
            .map(|rule| format!("{}-{}", rule.from_port, rule.to_port))
            .collect::<Vec<_>>()
            .join("/");
        let ingress: Vec<Value> = rules.iter().map(IngressRule::to_value).collect();

        self.add_resource(
            key,
            Resource::new(
                "AWS::EC2::SecurityGroup",
                json!({
                    "VpcId": reference(vpc),
                    "GroupDescription": format!("Enable access to ports {ports}"),
                    "SecurityGroupIngress": ingress,
                    "Tags": name_tags(domain_name(name, vpc)),
                }),
            ),
        );
        self.add_vpc_domain_arg(vpc);
    }

    /// Route table associated with each of `subnets`.
    pub fn add_route_table(&mut self, key: &str, name: &str, vpc: &str, subnets: &[&str]) {
        self.add_resource(
            key,
            Resource::new(
                "AWS::EC2::RouteTable",
                json!({
                    "VpcId": reference(vpc),
                    "Tags": name_tags(domain_name(name, vpc)),
                }),
            ),
        );
        self.add_vpc_domain_arg(vpc);

        for (index, subnet) in subnets.iter().enumerate() {
            self.add_route_table_association(&format!("{key}SubnetAssociation{index}"), key, subnet);
        }
    }

    pub fn add_route_table_association(&mut self, key: &str, route_table: &str, subnet: &str) {
        self.add_resource(
            key,
            Resource::new(
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({
                    "SubnetId": reference(subnet),
                    "RouteTableId": reference(route_table),
                }),
            ),
        );
    }

    /// Route for `cidr` through `target`. Gateway routes usually need an edge on
    /// the gateway attachment, which the provider cannot infer.
    pub fn add_route_table_route(
        &mut self,
        key: &str,
        route_table: &str,
        cidr: &str,
        target: RouteTarget,
        depends_on: &[&str],
    ) {
        let (property, target_key) = target.property();
        let mut resource = Resource::new(
            "AWS::EC2::Route",
            json!({
                "RouteTableId": reference(route_table),
                "DestinationCidrBlock": reference(&format!("{key}Cidr")),
            }),
        )
        .depends_on(depends_on.iter().copied());
        resource.set(property, reference(target_key));
        self.add_resource(key, resource);

        self.add_arg(Arg::cidr(
            format!("{key}Cidr"),
            cidr,
            format!("Destination CIDR Block for Route '{key}'"),
        ));
    }

    /// Internet gateway plus its `Attach<key>` VPC attachment.
    pub fn add_internet_gateway(&mut self, key: &str, name: &str, vpc: &str) {
        let mut gateway = Resource::new(
            "AWS::EC2::InternetGateway",
            json!({ "Tags": name_tags(domain_name(name, vpc)) }),
        );
        // An externally supplied VPC id is a parameter, not an orderable resource.
        if !self.parameters().contains_key(vpc) {
            gateway = gateway.depends_on([vpc]);
        }
        self.add_resource(key, gateway);

        self.add_resource(
            format!("Attach{key}"),
            Resource::new(
                "AWS::EC2::VPCGatewayAttachment",
                json!({
                    "VpcId": reference(vpc),
                    "InternetGatewayId": reference(key),
                }),
            )
            .depends_on([key]),
        );
        self.add_vpc_domain_arg(vpc);
    }

    /// Peering connection between two existing VPC ids.
    pub fn add_vpc_peering(
        &mut self,
        key: &str,
        vpc: impl Into<ArgValue>,
        peer_vpc: impl Into<ArgValue>,
    ) {
        self.add_resource(
            key,
            Resource::new(
                "AWS::EC2::VPCPeeringConnection",
                json!({
                    "VpcId": reference(&format!("{key}VPC")),
                    "PeerVpcId": reference(&format!("{key}PeerVPC")),
                    "Tags": [{ "Key": "Stack", "Value": stack_name() }],
                }),
            ),
        );
        self.add_arg(Arg::vpc(
            format!("{key}VPC"),
            vpc,
            "Originating VPC for the peering connection",
        ));
        self.add_arg(Arg::vpc(
            format!("{key}PeerVPC"),
            peer_vpc,
            "Destination VPC for the peering connection",
        ));
    }
}

fn zone_subnet_key(suffix: &str, side: &str) -> String {
    let mut chars = suffix.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    let side = if side == "internal" { "Internal" } else { "External" };
    format!("{capitalized}{side}Subnet")
}

/// `<name>.<vpc domain>` as a template expression.
fn domain_name(name: &str, vpc: &str) -> Value {
    join(".", vec![json!(name), reference(&format!("{vpc}Domain"))])
}
