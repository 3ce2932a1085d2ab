//! CloudFormation intrinsic function helpers.

use std::collections::BTreeSet;

use serde_json::{Value, json};

/// Prefix of provider pseudo parameters such as `AWS::StackName`.
pub const PSEUDO_PREFIX: &str = "AWS::";

pub fn reference(key: &str) -> Value {
    json!({ "Ref": key })
}

pub fn references<S: AsRef<str>>(keys: &[S]) -> Value {
    Value::Array(keys.iter().map(|key| reference(key.as_ref())).collect())
}

pub fn get_att(key: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [key, attribute] })
}

pub fn join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

pub fn base64(value: Value) -> Value {
    json!({ "Fn::Base64": value })
}

pub fn stack_name() -> Value {
    reference("AWS::StackName")
}

/// Standard `Stack` + `Name` tags.
pub fn name_tags(name: Value) -> Value {
    json!([
        { "Key": "Stack", "Value": stack_name() },
        { "Key": "Name", "Value": name },
    ])
}

/// Boolean rendered the way CloudFormation templates spell it.
pub fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Every key targeted by a `Ref` or `Fn::GetAtt` anywhere inside `value`,
/// excluding pseudo parameters.
pub fn referenced_keys(value: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect(value, &mut found);
    found
}

fn collect(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    if !target.starts_with(PSEUDO_PREFIX) {
                        found.insert(target.clone());
                    }
                    return;
                }
                if let Some(Value::Array(parts)) = map.get("Fn::GetAtt")
                    && let Some(Value::String(target)) = parts.first()
                {
                    found.insert(target.clone());
                    return;
                }
            }
            for nested in map.values() {
                collect(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, found);
            }
        }
        _ => {}
    }
}

/// Keys targeted by `Fn::GetAtt` inside `value`. Only resources expose attributes.
pub fn attribute_targets(value: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect_attribute_targets(value, &mut found);
    found
}

fn collect_attribute_targets(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1
                && let Some(Value::Array(parts)) = map.get("Fn::GetAtt")
                && let Some(Value::String(target)) = parts.first()
            {
                found.insert(target.clone());
            }
            for nested in map.values() {
                collect_attribute_targets(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_attribute_targets(item, found);
            }
        }
        _ => {}
    }
}
