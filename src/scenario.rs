use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Key consulted when a mapping has no entry for the active scenario.
pub const DEFAULT_SCENARIO_KEY: &str = "default";

/// Named deployment context (e.g. `development`, `production`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scenario(String);

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new("development")
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scenario {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A value that is either fixed or varies by deployment scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioValue<T> {
    ByScenario(BTreeMap<String, T>),
    Scalar(T),
}

impl<T: Clone> ScenarioValue<T> {
    pub fn by_scenario<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, T)>,
    {
        ScenarioValue::ByScenario(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Scalars resolve to themselves. Mappings try the scenario, then
    /// `"default"`, then `fallback`.
    pub fn resolve(&self, scenario: &Scenario, fallback: T) -> T {
        match self {
            ScenarioValue::Scalar(value) => value.clone(),
            ScenarioValue::ByScenario(map) => map
                .get(scenario.as_str())
                .or_else(|| map.get(DEFAULT_SCENARIO_KEY))
                .cloned()
                .unwrap_or(fallback),
        }
    }
}

impl<T> From<T> for ScenarioValue<T> {
    fn from(value: T) -> Self {
        ScenarioValue::Scalar(value)
    }
}

impl From<&str> for ScenarioValue<String> {
    fn from(value: &str) -> Self {
        ScenarioValue::Scalar(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized() -> ScenarioValue<u32> {
        ScenarioValue::by_scenario([("dev", 1), ("default", 2)])
    }

    #[test]
    fn scalar_ignores_scenario_and_fallback() {
        let value = ScenarioValue::Scalar("t2.micro".to_string());
        assert_eq!(
            value.resolve(&Scenario::new("prod"), "m4.large".to_string()),
            "t2.micro"
        );
    }

    #[test]
    fn mapping_prefers_active_scenario() {
        assert_eq!(sized().resolve(&Scenario::new("dev"), 9), 1);
    }

    #[test]
    fn mapping_falls_back_to_default_entry() {
        assert_eq!(sized().resolve(&Scenario::new("prod"), 9), 2);
    }

    #[test]
    fn mapping_without_default_uses_fallback() {
        let value = ScenarioValue::by_scenario([("dev", 1)]);
        assert_eq!(value.resolve(&Scenario::new("prod"), 9), 9);
    }

    #[test]
    fn deserializes_scalar_or_mapping() {
        let scalar: ScenarioValue<u32> = serde_json::from_str("3").unwrap();
        assert_eq!(scalar, ScenarioValue::Scalar(3));
        let mapped: ScenarioValue<u32> =
            serde_json::from_str(r#"{"production": 5, "default": 1}"#).unwrap();
        assert_eq!(mapped.resolve(&Scenario::new("production"), 0), 5);
    }
}
