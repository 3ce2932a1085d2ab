use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::args::{Arg, ArgValue};
use crate::builder::dns::AliasRole;
use crate::builder::{dashed, owned_keys};
use crate::configuration::{Configuration, Resource};
use crate::error::Result;
use crate::intrinsic::{bool_str, name_tags, reference, references};
use crate::scenario::ScenarioValue;

pub const DEFAULT_DB_INSTANCE_TYPE: &str = "db.t2.micro";
pub const DEFAULT_CACHE_NODE_TYPE: &str = "cache.t2.micro";
pub const DEFAULT_REPLICATION_NODE_TYPE: &str = "cache.m3.medium";
pub const DEFAULT_REDIS_VERSION: &str = "2.8.24";
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Inputs of [`Configuration::add_rds_db`].
#[derive(Debug, Clone)]
pub struct DatabaseSpec {
    pub key: String,
    pub hostname: String,
    pub port: ArgValue,
    pub db_name: ArgValue,
    pub username: ArgValue,
    pub password: ArgValue,
    pub subnets: Vec<String>,
    pub instance_type: ScenarioValue<String>,
    /// Allocated storage in GB.
    pub storage: u32,
    pub security_groups: Vec<String>,
    pub multi_az: ScenarioValue<bool>,
}

impl DatabaseSpec {
    pub fn new<I, S>(
        key: impl Into<String>,
        hostname: impl Into<String>,
        credentials: DatabaseCredentials,
        subnets: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            hostname: hostname.into(),
            port: credentials.port,
            db_name: credentials.db_name,
            username: credentials.username,
            password: credentials.password,
            subnets: owned_keys(subnets),
            instance_type: ScenarioValue::Scalar(DEFAULT_DB_INSTANCE_TYPE.to_string()),
            storage: 5,
            security_groups: Vec::new(),
            multi_az: ScenarioValue::by_scenario([("development", false), ("production", true)]),
        }
    }

    pub fn instance_type(mut self, instance_type: impl Into<ScenarioValue<String>>) -> Self {
        self.instance_type = instance_type.into();
        self
    }

    pub fn storage(mut self, gigabytes: u32) -> Self {
        self.storage = gigabytes;
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

    pub fn multi_az(mut self, multi_az: impl Into<ScenarioValue<bool>>) -> Self {
        self.multi_az = multi_az.into();
        self
    }
}

/// Connection settings bound as database arguments.
#[derive(Debug, Clone, Default)]
pub struct DatabaseCredentials {
    pub port: ArgValue,
    pub db_name: ArgValue,
    pub username: ArgValue,
    pub password: ArgValue,
}

impl DatabaseCredentials {
    pub fn new(
        port: impl Into<ArgValue>,
        db_name: impl Into<ArgValue>,
        username: impl Into<ArgValue>,
        password: impl Into<ArgValue>,
    ) -> Self {
        Self {
            port: port.into(),
            db_name: db_name.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughput {
    pub read_capacity_units: u64,
    pub write_capacity_units: u64,
}

/// Table layout in the provider's own calling convention, typically read from
/// a JSON schema file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableSchema {
    pub key_schema: Vec<KeySchemaElement>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub provisioned_throughput: ProvisionedThroughput,
}

/// Inputs of [`Configuration::add_redis_cluster`] and
/// [`Configuration::add_redis_replication`].
#[derive(Debug, Clone)]
pub struct CacheSpec {
    pub key: String,
    pub hostname: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    /// Falls back to the operation's own default node type.
    pub node_type: Option<ScenarioValue<String>>,
    pub port: u16,
    pub version: String,
    /// Replication only: number of cache clusters.
    pub replicas: ScenarioValue<u32>,
    /// Register a `<key>Record` alias for the cache endpoint.
    pub dns_alias: bool,
}

impl CacheSpec {
    pub fn new<I, J, S, T>(
        key: impl Into<String>,
        hostname: impl Into<String>,
        subnets: I,
        security_groups: J,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            key: key.into(),
            hostname: hostname.into(),
            subnets: owned_keys(subnets),
            security_groups: owned_keys(security_groups),
            node_type: None,
            port: DEFAULT_REDIS_PORT,
            version: DEFAULT_REDIS_VERSION.to_string(),
            replicas: ScenarioValue::Scalar(1),
            dns_alias: true,
        }
    }

    pub fn node_type(mut self, node_type: impl Into<ScenarioValue<String>>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn replicas(mut self, replicas: impl Into<ScenarioValue<u32>>) -> Self {
        self.replicas = replicas.into();
        self
    }

    pub fn dns_alias(mut self, enabled: bool) -> Self {
        self.dns_alias = enabled;
        self
    }

    fn resolved_node_type(&self, config: &Configuration, fallback: &str) -> String {
        match &self.node_type {
            Some(node_type) => node_type.resolve(config.scenario(), fallback.to_string()),
            None => fallback.to_string(),
        }
    }
}

impl Configuration {
    /// MySQL instance, its `<key>SubnetGroup` and a `<key>Record` alias.
    pub fn add_rds_db(&mut self, spec: DatabaseSpec) -> Result<()> {
        let key = spec.key.as_str();
        let scenario = self.scenario().clone();

        let mut instance = Resource::new(
            "AWS::RDS::DBInstance",
            json!({
                "Engine": "mysql",
                "LicenseModel": "general-public-license",
                "EngineVersion": "5.6.23",
                "DBInstanceClass": spec
                    .instance_type
                    .resolve(&scenario, DEFAULT_DB_INSTANCE_TYPE.to_string()),
                "MultiAZ": bool_str(spec.multi_az.resolve(&scenario, false)),
                "StorageType": "standard",
                "AllocatedStorage": spec.storage.to_string(),
                "DBInstanceIdentifier": reference(&format!("{key}Hostname")),
                "MasterUsername": reference(&format!("{key}Username")),
                "MasterUserPassword": reference(&format!("{key}Password")),
                "DBSubnetGroupName": reference(&format!("{key}SubnetGroup")),
                "PubliclyAccessible": "false",
                "DBName": reference(&format!("{key}DBName")),
                "Port": reference(&format!("{key}Port")),
                "StorageEncrypted": "false",
            }),
        );
        if !spec.security_groups.is_empty() {
            instance.set("VPCSecurityGroups", references(&spec.security_groups));
        }

        self.add_dns_alias(key, &spec.hostname, AliasRole::Database)?;
        self.add_resource(key, instance);
        self.add_resource(
            format!("{key}SubnetGroup"),
            Resource::new(
                "AWS::RDS::DBSubnetGroup",
                json!({
                    "DBSubnetGroupDescription": reference(&format!("{key}Hostname")),
                    "SubnetIds": references(&spec.subnets),
                }),
            ),
        );

        self.add_arg(Arg::string(
            format!("{key}Hostname"),
            dashed(&spec.hostname),
            format!("Hostname of the RDS DB Instance '{key}'"),
        ));
        self.add_arg(Arg::port(
            format!("{key}Port"),
            spec.port.clone(),
            format!("DB Server Port for the RDS DB Instance '{key}'"),
        ));
        self.add_arg(Arg::string(
            format!("{key}DBName"),
            spec.db_name.clone(),
            format!("Name of the initial database on the RDS DB Instance '{key}'"),
        ));
        self.add_arg(Arg::string(
            format!("{key}Username"),
            spec.username.clone(),
            format!("Master Username for RDS DB Instance '{key}'"),
        ));
        self.add_arg(Arg::password(
            format!("{key}Password"),
            spec.password.clone(),
            format!("Master User Password for RDS DB Instance '{key}'"),
        ));
        Ok(())
    }

    /// DynamoDB table from `(name, type)` attribute pairs and `(name, key type)`
    /// key schema pairs; `throughput` is `(read, write)` capacity.
    pub fn add_dynamo_table(
        &mut self,
        key: &str,
        name: impl Into<ArgValue>,
        attributes: &[(&str, &str)],
        key_schema: &[(&str, &str)],
        throughput: (u64, u64),
    ) {
        let schema = TableSchema {
            attribute_definitions: attributes
                .iter()
                .map(|(name, kind)| AttributeDefinition {
                    attribute_name: name.to_string(),
                    attribute_type: kind.to_string(),
                })
                .collect(),
            key_schema: key_schema
                .iter()
                .map(|(name, kind)| KeySchemaElement {
                    attribute_name: name.to_string(),
                    key_type: kind.to_string(),
                })
                .collect(),
            provisioned_throughput: ProvisionedThroughput {
                read_capacity_units: throughput.0,
                write_capacity_units: throughput.1,
            },
        };
        self.add_dynamo_table_from_schema(key, name, schema);
    }

    pub fn add_dynamo_table_from_schema(
        &mut self,
        key: &str,
        name: impl Into<ArgValue>,
        schema: TableSchema,
    ) {
        self.add_resource(
            key,
            Resource::new(
                "AWS::DynamoDB::Table",
                json!({
                    "TableName": reference(&format!("{key}TableName")),
                    "AttributeDefinitions": schema.attribute_definitions,
                    "KeySchema": schema.key_schema,
                    "ProvisionedThroughput": schema.provisioned_throughput,
                }),
            ),
        );
        self.add_arg(Arg::string(
            format!("{key}TableName"),
            name,
            format!("Name of the DynamoDB table created by instance '{key}'"),
        ));
    }

    /// Single-node Redis cluster and its `<key>SubnetGroup`.
    ///
    /// The provider exposes no address attribute for single-node Redis, so a
    /// spec asking for a DNS alias fails with `UnsupportedAlias` before
    /// anything is registered.
    pub fn add_redis_cluster(&mut self, spec: CacheSpec) -> Result<()> {
        let key = spec.key.as_str();
        if spec.dns_alias {
            AliasRole::SingleNodeCache.require_attribute(key)?;
        }
        let node_type = spec.resolved_node_type(self, DEFAULT_CACHE_NODE_TYPE);

        self.add_resource(
            key,
            Resource::new(
                "AWS::ElastiCache::CacheCluster",
                json!({
                    "CacheNodeType": node_type,
                    "CacheSubnetGroupName": reference(&format!("{key}SubnetGroup")),
                    "Engine": "redis",
                    "EngineVersion": spec.version,
                    "NumCacheNodes": "1",
                    "Port": spec.port,
                    "Tags": name_tags(reference(&format!("{key}Hostname"))),
                    "VpcSecurityGroupIds": references(&spec.security_groups),
                }),
            )
            .depends_on([format!("{key}SubnetGroup")]),
        );
        self.add_cache_subnet_group(&spec);
        Ok(())
    }

    /// Redis replication group, its `<key>SubnetGroup` and a `<key>Record`
    /// alias on the primary endpoint.
    pub fn add_redis_replication(&mut self, spec: CacheSpec) -> Result<()> {
        let key = spec.key.as_str();
        let clusters = spec.replicas.resolve(self.scenario(), 1);
        let node_type = spec.resolved_node_type(self, DEFAULT_REPLICATION_NODE_TYPE);

        if spec.dns_alias {
            self.add_dns_alias(key, &spec.hostname, AliasRole::ReplicaCache)?;
        }
        self.add_resource(
            key,
            Resource::new(
                "AWS::ElastiCache::ReplicationGroup",
                json!({
                    "AutomaticFailoverEnabled": bool_str(clusters > 1),
                    "CacheNodeType": node_type,
                    "CacheSubnetGroupName": reference(&format!("{key}SubnetGroup")),
                    "Engine": "redis",
                    "EngineVersion": spec.version,
                    "NumCacheClusters": clusters,
                    "Port": spec.port,
                    "ReplicationGroupDescription": reference(&format!("{key}Hostname")),
                    "SecurityGroupIds": references(&spec.security_groups),
                }),
            )
            .depends_on([format!("{key}SubnetGroup")]),
        );
        self.add_cache_subnet_group(&spec);
        Ok(())
    }

    fn add_cache_subnet_group(&mut self, spec: &CacheSpec) {
        let key = spec.key.as_str();
        self.add_resource(
            format!("{key}SubnetGroup"),
            Resource::new(
                "AWS::ElastiCache::SubnetGroup",
                json!({
                    "Description": reference(&format!("{key}Hostname")),
                    "SubnetIds": references(&spec.subnets),
                }),
            ),
        );
        self.add_arg(Arg::string(
            format!("{key}Hostname"),
            dashed(&spec.hostname),
            format!("Hostname of the Redis Cluster '{key}'"),
        ));
    }
}
