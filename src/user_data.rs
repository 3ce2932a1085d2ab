use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Result, StackError};

/// INI-style instance configuration handed to EC2 as `UserData`.
///
/// Instances read the decoded payload with an INI parser, so sections and keys keep their
/// order and case. Usually seeded from a defaults file and then filled in per stack:
///
/// ```ignore
/// let mut data = UserData::from_path("boss.config.default".as_ref())?;
/// data.set("system", "fqdn", "endpoint.example.boss")
///     .set("aws", "db", "db.example.boss");
/// spec.user_data(&data);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserData {
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl UserData {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
            .map_err(|err| StackError::Config(format!("{}: {err}", path.display())))
    }

    /// Accepts `key = value` and `key: value` entries. Indented lines continue the previous
    /// value. Blank lines and lines starting with `#` or `;` are skipped.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut data = Self::default();
        let mut section: Option<String> = None;
        let mut last_key: Option<String> = None;

        for (index, line) in raw.lines().enumerate() {
            let number = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if line.starts_with(char::is_whitespace)
                && let (Some(section), Some(key)) = (&section, &last_key)
                && let Some(value) = data
                    .sections
                    .get_mut(section)
                    .and_then(|entries| entries.get_mut(key))
            {
                value.push('\n');
                value.push_str(trimmed);
                continue;
            }

            if let Some(name) = trimmed.strip_prefix('[') {
                let name = name.strip_suffix(']').ok_or_else(|| {
                    StackError::Config(format!("line {number}: unterminated section header"))
                })?;
                let name = name.trim().to_string();
                data.sections.entry(name.clone()).or_default();
                section = Some(name);
                last_key = None;
                continue;
            }

            let Some(current) = &section else {
                return Err(StackError::Config(format!(
                    "line {number}: entry outside of a section"
                )));
            };
            let split = trimmed
                .find(['=', ':'])
                .ok_or_else(|| StackError::Config(format!("line {number}: expected key = value")))?;
            let key = trimmed[..split].trim().to_string();
            let value = trimmed[split + 1..].trim().to_string();
            data.set(current, &key, value);
            last_key = Some(key);
        }

        Ok(data)
    }

    /// Sets `key` in `section`, creating the section when needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) -> &mut Self {
        self.section_mut(section).insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    pub fn section(&self, section: &str) -> Option<&IndexMap<String, String>> {
        self.sections.get(section)
    }

    pub fn section_mut(&mut self, section: &str) -> &mut IndexMap<String, String> {
        self.sections.entry(section.to_string()).or_default()
    }

    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

impl fmt::Display for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, entries) in &self.sections {
            writeln!(f, "[{name}]")?;
            for (key, value) in entries {
                writeln!(f, "{key} = {}", value.replace('\n', "\n\t"))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl From<&UserData> for Value {
    fn from(data: &UserData) -> Self {
        Value::String(data.to_string())
    }
}

impl From<UserData> for Value {
    fn from(data: UserData) -> Self {
        Value::from(&data)
    }
}
