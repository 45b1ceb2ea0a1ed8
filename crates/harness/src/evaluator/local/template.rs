//! Payload templates for JSONPath states (`Parameters`, `ItemSelector`,
//! `ResultSelector`, `Assign`).
//!
//! Keys ending in `.$` take their value from a reference:
//! - `$...` reads the current input
//! - `$$...` reads the context object
//! - `$name...` reads a workflow variable
//!
//! Intrinsic functions (`States.Format(...)` etc.) are not supported.

use serde_json::{Map, Value};

use super::path;
use super::Fault;

/// What references resolve against.
pub(crate) struct Bindings<'a> {
    pub input: &'a Value,
    pub context: &'a Value,
    pub variables: &'a Value,
}

pub(crate) fn resolve(template: &Value, bindings: &Bindings<'_>) -> Result<Value, Fault> {
    match template {
        Value::Object(fields) => {
            let mut out = Map::new();
            for (key, value) in fields {
                match key.strip_suffix(".$") {
                    Some(name) => {
                        let reference = value.as_str().ok_or_else(|| {
                            Fault::Runtime(format!("value of '{}' must be a reference string", key))
                        })?;
                        out.insert(name.to_string(), reference_value(reference, bindings)?);
                    }
                    None => {
                        out.insert(key.clone(), resolve(value, bindings)?);
                    }
                }
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve(item, bindings))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

pub(crate) fn reference_value(reference: &str, bindings: &Bindings<'_>) -> Result<Value, Fault> {
    let reference = reference.trim();
    if let Some(rest) = reference.strip_prefix("$$") {
        return path::select(bindings.context, &format!("${}", rest));
    }
    if reference == "$" || reference.starts_with("$.") || reference.starts_with("$[") {
        return path::select(bindings.input, reference);
    }
    if let Some(rest) = reference.strip_prefix('$') {
        let end = rest.find(['.', '[']).unwrap_or(rest.len());
        let name = &rest[..end];
        let variable = bindings.variables.get(name).ok_or_else(|| {
            Fault::Runtime(format!("variable '${}' is not defined", name))
        })?;
        return path::select(variable, &format!("${}", &rest[end..]));
    }
    Err(Fault::Unsupported(format!(
        "reference '{}' is not supported (intrinsic functions are not evaluated)",
        reference
    )))
}
