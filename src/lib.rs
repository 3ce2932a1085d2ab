#![forbid(unsafe_code)]

pub mod apply;
pub mod args;
pub mod aws_cli;
pub mod builder;
pub mod compensation;
pub mod config;
pub mod configuration;
pub mod error;
pub mod intrinsic;
pub mod lookup;
pub mod provisioner;
pub mod scenario;
pub mod secrets;
pub mod telemetry;
pub mod template;
pub mod user_data;

pub use args::{Arg, ArgValue, Argument, ParameterSpec, ParameterType};
pub use builder::{
    AliasRole, AutoScaleSpec, CacheSpec, DatabaseCredentials, DatabaseSpec, IngressRule,
    InstanceSpec, Listener, LoadBalancerSpec, RouteTarget,
};
pub use compensation::{SecretLedger, provision_with_compensation};
pub use config::{CliArgs, Command, ProvisionerConfig};
pub use configuration::{Configuration, Resource};
pub use error::{Result, StackError};
pub use lookup::{DomainLookup, HostTable, ImageRef, OfflineLookup, ResourceLookup};
pub use provisioner::{Provisioner, StackSession, SubmitOutcome};
pub use scenario::{Scenario, ScenarioValue};
pub use template::{RenderedStack, TemplateFormat};
pub use user_data::UserData;
