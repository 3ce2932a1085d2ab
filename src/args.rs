//! Typed template parameters and their bound arguments.
//!
//! Every constructor records the provider-side format constraints on the
//! [`ParameterSpec`] but never evaluates them: values are checked by the
//! provisioning service at submission time. This keeps offline template
//! generation working when lookups are still unresolved (`None`); the
//! provisioner refuses to submit while any argument is unbound.

use serde::{Deserialize, Serialize};

/// Declared provider value type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    String,
    Number,
    #[serde(rename = "AWS::EC2::VPC::Id")]
    VpcId,
    #[serde(rename = "AWS::EC2::Subnet::Id")]
    SubnetId,
    #[serde(rename = "AWS::EC2::Image::Id")]
    ImageId,
    #[serde(rename = "AWS::EC2::Instance::Id")]
    InstanceId,
    #[serde(rename = "AWS::EC2::KeyPair::KeyName")]
    KeyPairName,
    #[serde(rename = "AWS::EC2::SecurityGroup::Id")]
    SecurityGroupId,
    #[serde(rename = "AWS::ACM::Certificate::Id")]
    CertificateId,
}

/// Template `Parameters` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterSpec {
    pub description: String,
    #[serde(rename = "Type")]
    pub kind: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_echo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_description: Option<String>,
}

impl ParameterSpec {
    pub fn new(kind: ParameterType, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            kind,
            no_echo: None,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            default: None,
            allowed_pattern: None,
            constraint_description: None,
        }
    }

    /// True when consumers must not display the bound value.
    pub fn is_secret(&self) -> bool {
        self.no_echo.unwrap_or(false)
    }
}

/// One entry of the argument document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    #[serde(rename = "ParameterKey")]
    pub key: String,
    #[serde(rename = "ParameterValue")]
    pub value: Option<String>,
}

impl Argument {
    pub fn is_bound(&self) -> bool {
        self.value.is_some()
    }
}

/// A possibly unresolved argument value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgValue(pub Option<String>);

impl ArgValue {
    pub fn unresolved() -> Self {
        Self(None)
    }

    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self(Some(value.to_string()))
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self(Some(value))
    }
}

impl From<&String> for ArgValue {
    fn from(value: &String) -> Self {
        Self(Some(value.clone()))
    }
}

impl From<Option<String>> for ArgValue {
    fn from(value: Option<String>) -> Self {
        Self(value)
    }
}

impl From<Option<&str>> for ArgValue {
    fn from(value: Option<&str>) -> Self {
        Self(value.map(str::to_string))
    }
}

impl From<u16> for ArgValue {
    fn from(value: u16) -> Self {
        Self(Some(value.to_string()))
    }
}

impl From<Option<u16>> for ArgValue {
    fn from(value: Option<u16>) -> Self {
        Self(value.map(|port| port.to_string()))
    }
}

/// A parameter declaration together with its bound argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub key: String,
    pub parameter: ParameterSpec,
    pub argument: Argument,
}

impl Arg {
    fn build(key: impl Into<String>, value: impl Into<ArgValue>, parameter: ParameterSpec) -> Self {
        let key = key.into();
        Self {
            argument: Argument {
                key: key.clone(),
                value: value.into().into_inner(),
            },
            key,
            parameter,
        }
    }

    pub fn string(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        Self::build(key, value, ParameterSpec::new(ParameterType::String, description))
    }

    /// String argument whose typed characters are not displayed.
    pub fn password(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        let mut parameter = ParameterSpec::new(ParameterType::String, description);
        parameter.no_echo = Some(true);
        Self::build(key, value, parameter)
    }

    /// IPv4 address of the form x.x.x.x; octet ranges are not constrained.
    pub fn ip(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        let mut parameter = ParameterSpec::new(ParameterType::String, description);
        parameter.min_length = Some(7);
        parameter.max_length = Some(15);
        parameter.default = Some("0.0.0.0".to_string());
        parameter.allowed_pattern = Some(r"(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})".to_string());
        parameter.constraint_description = Some("must be a valid IP of the form x.x.x.x.".to_string());
        Self::build(key, value, parameter)
    }

    pub fn port(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        let mut parameter = ParameterSpec::new(ParameterType::Number, description);
        parameter.min_value = Some(1);
        parameter.max_value = Some(65535);
        Self::build(key, value, parameter)
    }

    /// IPv4 CIDR block of the form x.x.x.x/x; neither octets nor mask are range checked.
    pub fn cidr(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        let mut parameter = ParameterSpec::new(ParameterType::String, description);
        parameter.min_length = Some(9);
        parameter.max_length = Some(18);
        parameter.default = Some("0.0.0.0/0".to_string());
        parameter.allowed_pattern =
            Some(r"(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})/(\d{1,2})".to_string());
        parameter.constraint_description =
            Some("must be a valid IP CIDR range of the form x.x.x.x/x.".to_string());
        Self::build(key, value, parameter)
    }

    pub fn vpc(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        Self::build(key, value, ParameterSpec::new(ParameterType::VpcId, description))
    }

    pub fn subnet(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        Self::build(key, value, ParameterSpec::new(ParameterType::SubnetId, description))
    }

    pub fn ami(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        Self::build(key, value, ParameterSpec::new(ParameterType::ImageId, description))
    }

    pub fn instance(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        Self::build(key, value, ParameterSpec::new(ParameterType::InstanceId, description))
    }

    /// Key pair name; the description names the host it grants SSH access to.
    pub fn key_pair(key: impl Into<String>, value: impl Into<ArgValue>, hostname: &str) -> Self {
        let mut parameter = ParameterSpec::new(
            ParameterType::KeyPairName,
            format!("Name of an existing EC2 KeyPair to enable SSH access to '{hostname}'"),
        );
        parameter.constraint_description =
            Some("must be the name of an existing EC2 KeyPair.".to_string());
        Self::build(key, value, parameter)
    }

    pub fn security_group(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        Self::build(
            key,
            value,
            ParameterSpec::new(ParameterType::SecurityGroupId, description),
        )
    }

    /// Route table id. CloudFormation rejects `AWS::EC2::RouteTable::Id` as a
    /// parameter type, so this is a plain string.
    pub fn route_table(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        Self::build(key, value, ParameterSpec::new(ParameterType::String, description))
    }

    pub fn certificate(
        key: impl Into<String>,
        value: impl Into<ArgValue>,
        description: impl Into<String>,
    ) -> Self {
        Self::build(
            key,
            value,
            ParameterSpec::new(ParameterType::CertificateId, description),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_cidr_is_accepted_and_pattern_recorded() {
        let arg = Arg::cidr("RouteCidr", "not-a-cidr", "destination");
        assert_eq!(arg.argument.value.as_deref(), Some("not-a-cidr"));
        assert!(arg.parameter.allowed_pattern.as_deref().unwrap().ends_with(r"/(\d{1,2})"));
        assert_eq!(arg.parameter.min_length, Some(9));
    }

    #[test]
    fn unresolved_lookups_are_accepted() {
        let arg = Arg::subnet("ExternalSubnet", None::<String>, "subnet id");
        assert!(!arg.argument.is_bound());
        assert_eq!(arg.parameter.kind, ParameterType::SubnetId);
    }

    #[test]
    fn password_differs_only_by_no_echo() {
        let plain = Arg::string("DBPassword", "hunter2", "pw");
        let secret = Arg::password("DBPassword", "hunter2", "pw");
        assert!(secret.parameter.is_secret());
        assert!(!plain.parameter.is_secret());
        assert_eq!(plain.argument, secret.argument);
        assert_eq!(plain.parameter.kind, secret.parameter.kind);
    }

    #[test]
    fn route_table_is_a_plain_string() {
        let arg = Arg::route_table("InternalRouteTable", "rtb-123", "");
        assert_eq!(arg.parameter.kind, ParameterType::String);
    }

    #[test]
    fn serializes_parameter_with_provider_field_names() {
        let arg = Arg::key_pair("WebKey", "ops", "web.example.boss");
        let json = serde_json::to_value(&arg.parameter).unwrap();
        assert_eq!(json["Type"], "AWS::EC2::KeyPair::KeyName");
        assert!(
            json["Description"]
                .as_str()
                .unwrap()
                .contains("web.example.boss")
        );
        assert!(json.get("NoEcho").is_none());

        let argument = serde_json::to_value(&arg.argument).unwrap();
        assert_eq!(argument["ParameterKey"], "WebKey");
        assert_eq!(argument["ParameterValue"], "ops");
    }

    #[test]
    fn port_accepts_numbers() {
        let arg = Arg::port("DBPort", 3306u16, "port");
        assert_eq!(arg.argument.value.as_deref(), Some("3306"));
        assert_eq!(arg.parameter.kind, ParameterType::Number);
        assert_eq!(arg.parameter.max_value, Some(65535));
    }
}
