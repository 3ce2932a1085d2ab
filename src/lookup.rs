use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ipnet::Ipv4Net;
use serde::Deserialize;

use crate::error::{Result, StackError};

/// Domain name to CIDR block resolution.
pub trait DomainLookup {
    fn lookup(&self, domain: &str) -> Option<String>;
}

/// Static domain → CIDR table, usually loaded from a TOML file:
///
/// ```toml
/// [domains]
/// "example.boss" = "10.0.0.0/16"
/// "internal.example.boss" = "10.0.1.0/24"
/// ```
#[derive(Debug, Clone, Default)]
pub struct HostTable {
    entries: BTreeMap<String, Ipv4Net>,
}

#[derive(Debug, Deserialize)]
struct HostTableFile {
    #[serde(default)]
    domains: BTreeMap<String, String>,
}

impl HostTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let file: HostTableFile = toml::from_str(raw)?;
        let mut table = Self::default();
        for (domain, cidr) in file.domains {
            table.insert(&domain, &cidr)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, domain: &str, cidr: &str) -> Result<()> {
        let net = cidr.trim().parse::<Ipv4Net>().map_err(|err| {
            StackError::Config(format!("invalid CIDR '{cidr}' for domain '{domain}': {err}"))
        })?;
        self.entries.insert(domain.to_ascii_lowercase(), net);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DomainLookup for HostTable {
    fn lookup(&self, domain: &str) -> Option<String> {
        self.entries
            .get(&domain.to_ascii_lowercase())
            .map(|net| net.to_string())
    }
}

/// A machine image id plus the build commit it was baked from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRef {
    pub id: Option<String>,
    pub commit: Option<String>,
}

impl ImageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            commit: None,
        }
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }
}

impl From<&str> for ImageRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Option<String>> for ImageRef {
    fn from(value: Option<String>) -> Self {
        Self {
            id: value,
            commit: None,
        }
    }
}

/// Provider identifier lookups. `None` means "not provisioned yet" and must
/// not fail a template build.
pub trait ResourceLookup {
    fn vpc_id(&self, domain: &str) -> Result<Option<String>>;
    fn subnet_id(&self, domain: &str) -> Result<Option<String>>;
    fn image(&self, name: &str) -> Result<ImageRef>;
    fn security_group_id(&self, vpc_id: Option<&str>, name: &str) -> Result<Option<String>>;
    fn keypair(&self) -> Result<Option<String>>;
    /// `(zone, suffix)` pairs, e.g. `("us-east-1a", "a")`.
    fn availability_zones(&self) -> Result<Vec<(String, String)>>;
}

/// Lookup used for offline template generation: nothing is resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineLookup;

impl ResourceLookup for OfflineLookup {
    fn vpc_id(&self, _domain: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn subnet_id(&self, _domain: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn image(&self, _name: &str) -> Result<ImageRef> {
        Ok(ImageRef::default())
    }

    fn security_group_id(&self, _vpc_id: Option<&str>, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn keypair(&self) -> Result<Option<String>> {
        Ok(None)
    }

    fn availability_zones(&self) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}
