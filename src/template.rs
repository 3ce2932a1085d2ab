//! Template and argument documents.
//!
//! A stack is persisted as two files: `<name>.template` (JSON or YAML) and
//! `<name>.arguments` (a JSON list of `{ParameterKey, ParameterValue}`). The
//! argument file may contain `null` values for lookups that were unresolved at
//! generation time; those have to be filled in before the stack is submitted.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::args::{Argument, ParameterSpec};
use crate::configuration::{Configuration, Resource, dangling_references};
use crate::error::{Result, StackError};

pub const FORMAT_VERSION: &str = "2010-09-09";
pub const TEMPLATE_EXTENSION: &str = "template";
pub const ARGUMENTS_EXTENSION: &str = "arguments";

/// Serialization of the template document.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Parameters", default)]
    pub parameters: IndexMap<String, ParameterSpec>,
    #[serde(rename = "Resources")]
    pub resources: IndexMap<String, Resource>,
}

impl Template {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_bw::to_string(self)?)
    }

    /// Accepts either serialization; JSON documents always start with `{`.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim_start().starts_with('{') {
            Ok(serde_json::from_str(raw)?)
        } else {
            Ok(serde_yaml_bw::from_str(raw)?)
        }
    }
}

/// A template together with the ordered arguments for its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStack {
    pub template: Template,
    pub arguments: Vec<Argument>,
}

impl RenderedStack {
    pub fn unbound_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|argument| !argument.is_bound())
    }

    pub fn arguments_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.arguments)?)
    }

    /// Every parameter has exactly one argument and vice versa.
    pub fn check_bijection(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for argument in &self.arguments {
            if !seen.insert(argument.key.as_str()) {
                return Err(StackError::Config(format!(
                    "argument '{}' is listed more than once",
                    argument.key
                )));
            }
            if !self.template.parameters.contains_key(&argument.key) {
                return Err(StackError::Config(format!(
                    "argument '{}' has no matching template parameter",
                    argument.key
                )));
            }
        }
        if let Some(missing) = self
            .template
            .parameters
            .keys()
            .find(|key| !seen.contains(key.as_str()))
        {
            return Err(StackError::Config(format!(
                "template parameter '{missing}' has no argument"
            )));
        }
        Ok(())
    }

    pub fn validate_references(&self) -> Result<()> {
        let resources = &self.template.resources;
        let parameters = &self.template.parameters;
        let dangling = dangling_references(resources, |key| {
            resources.contains_key(key) || parameters.contains_key(key)
        });
        match dangling.into_iter().next() {
            Some((resource, target)) => Err(StackError::DanglingReference { resource, target }),
            None => Ok(()),
        }
    }
}

/// Paths written by [`generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackArtifacts {
    pub template: PathBuf,
    pub arguments: PathBuf,
}

impl StackArtifacts {
    pub fn in_folder(folder: &Path, name: &str) -> Self {
        Self {
            template: folder.join(format!("{name}.{TEMPLATE_EXTENSION}")),
            arguments: folder.join(format!("{name}.{ARGUMENTS_EXTENSION}")),
        }
    }
}

/// Snapshot `config` into a template plus its argument list. Fails on the
/// first dangling reference.
pub fn render(config: &Configuration, description: &str) -> Result<RenderedStack> {
    config.validate_references()?;
    Ok(RenderedStack {
        template: Template {
            format_version: FORMAT_VERSION.to_string(),
            description: description.to_string(),
            parameters: config.parameters().clone(),
            resources: config.resources().clone(),
        },
        arguments: config.arguments().to_vec(),
    })
}

pub fn generate(
    config: &Configuration,
    name: &str,
    folder: &Path,
    format: TemplateFormat,
) -> Result<StackArtifacts> {
    let rendered = render(config, "")?;
    write(&rendered, name, folder, format)
}

pub fn write(
    rendered: &RenderedStack,
    name: &str,
    folder: &Path,
    format: TemplateFormat,
) -> Result<StackArtifacts> {
    fs::create_dir_all(folder)?;
    let artifacts = StackArtifacts::in_folder(folder, name);
    let body = match format {
        TemplateFormat::Json => rendered.template.to_json()?,
        TemplateFormat::Yaml => rendered.template.to_yaml()?,
    };
    fs::write(&artifacts.template, body)?;
    fs::write(&artifacts.arguments, rendered.arguments_json()?)?;
    info!(
        stack = name,
        template = %artifacts.template.display(),
        "wrote stack artifacts"
    );
    Ok(artifacts)
}

/// Read back a template and its argument file.
pub fn load(template_path: &Path, arguments_path: &Path) -> Result<RenderedStack> {
    let template = Template::parse(&fs::read_to_string(template_path)?)?;
    let arguments: Vec<Argument> = serde_json::from_str(&fs::read_to_string(arguments_path)?)?;
    let rendered = RenderedStack {
        template,
        arguments,
    };
    rendered.check_bijection()?;
    Ok(rendered)
}
