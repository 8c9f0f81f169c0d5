//! Tool schema cleaning.
//!
//! Several OpenAI-compatible backends reject `"format": "uri"` in tool
//! parameter schemas while accepting every other `format`.

use serde_json::{Map, Value};

/// Return a copy of `schema` with every `"format": "uri"` entry removed.
///
/// Only an object key named `format` whose value is exactly the string `uri`
/// is dropped; everything else is copied unchanged.
pub fn clean_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => {
            let cleaned: Map<String, Value> = obj
                .iter()
                .filter(|(key, value)| !is_uri_format(key, value))
                .map(|(key, value)| (key.clone(), clean_schema(value)))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(clean_schema).collect()),
        other => other.clone(),
    }
}

fn is_uri_format(key: &str, value: &Value) -> bool {
    key == "format" && value.as_str() == Some("uri")
}
