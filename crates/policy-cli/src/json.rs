//! JSON view of a policy tree

use policy_store::{Policy, Value};
use serde_json::{json, Map};

/// Render `policy` as a JSON object
///
/// Single values become scalars, repeated values become arrays. File
/// references render as `{"file": path}`.
pub(crate) fn to_json(policy: &Policy) -> serde_json::Value {
    let mut object = Map::new();
    for (name, values) in policy.entries() {
        let mut items: Vec<serde_json::Value> = values.to_vec().iter().map(value_to_json).collect();
        let rendered = if items.len() == 1 {
            items.remove(0)
        } else {
            serde_json::Value::Array(items)
        };
        object.insert(name.to_string(), rendered);
    }
    serde_json::Value::Object(object)
}

pub(crate) fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        // serde_json maps non-finite doubles to null
        Value::Double(d) => json!(d),
        Value::String(s) => json!(s),
        Value::Policy(ptr) => to_json(&ptr.read()),
        Value::File(file) => json!({ "file": file.path() }),
    }
}

/// Plain-text rendering of one value for `get`
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::File(file) => format!("@{}", file.path()),
        Value::Policy(ptr) => serde_json::to_string(&to_json(&ptr.read())).unwrap_or_default(),
        other => value_to_json(other).to_string(),
    }
}
