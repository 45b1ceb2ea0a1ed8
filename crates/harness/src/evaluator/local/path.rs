//! Reference paths: `$`, `$.a.b`, `$['a b']`, `$.list[0]`.
//!
//! No filters, wildcards, slices or recursive descent.

use serde_json::{Map, Value};

use super::Fault;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Field(String),
    Index(usize),
}

pub(crate) fn parse(path: &str) -> Result<Vec<Segment>, Fault> {
    let syntax = |message: &str| Fault::Runtime(format!("invalid path '{}': {}", path, message));

    let mut rest = path
        .trim()
        .strip_prefix('$')
        .ok_or_else(|| syntax("must start with '$'"))?;
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if let Some(after_dot) = rest.strip_prefix('.') {
            let end = after_dot.find(['.', '[']).unwrap_or(after_dot.len());
            let name = &after_dot[..end];
            if name.is_empty() {
                return Err(syntax("empty field name"));
            }
            segments.push(Segment::Field(name.to_string()));
            rest = &after_dot[end..];
        } else if let Some(after_bracket) = rest.strip_prefix('[') {
            let close = after_bracket
                .find(']')
                .ok_or_else(|| syntax("unclosed '['"))?;
            let inner = after_bracket[..close].trim();
            let quoted = inner
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
            match quoted {
                Some(name) => segments.push(Segment::Field(name.to_string())),
                None => {
                    let index = inner
                        .parse::<usize>()
                        .map_err(|_| syntax("only field names and array indices are supported"))?;
                    segments.push(Segment::Index(index));
                }
            }
            rest = &after_bracket[close + 1..];
        } else {
            return Err(syntax("expected '.' or '['"));
        }
    }

    Ok(segments)
}

/// Select the value at `path`. A missing field or index is a runtime fault.
pub(crate) fn select(value: &Value, path: &str) -> Result<Value, Fault> {
    let mut current = value;
    for segment in parse(path)? {
        let next = match (&segment, current) {
            (Segment::Field(name), Value::Object(obj)) => obj.get(name),
            (Segment::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        };
        current = next.ok_or_else(|| {
            Fault::Runtime(format!(
                "path '{}' could not be resolved against the input",
                path
            ))
        })?;
    }
    Ok(current.clone())
}

/// Write `value` into `target` at `path`, creating intermediate objects.
/// `$` replaces the whole target.
pub(crate) fn insert(target: Value, path: &str, value: Value) -> Result<Value, Fault> {
    let segments = parse(path)?;
    if segments.is_empty() {
        return Ok(value);
    }

    let mut root = target;
    let mut slot = &mut root;
    for segment in &segments {
        slot = match segment {
            Segment::Field(name) => {
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                let Value::Object(obj) = slot else {
                    return Err(Fault::Runtime(format!("path '{}' is not writable", path)));
                };
                obj.entry(name.clone()).or_insert(Value::Null)
            }
            Segment::Index(index) => match slot {
                Value::Array(items) if *index < items.len() => &mut items[*index],
                _ => {
                    return Err(Fault::Runtime(format!(
                        "path '{}' does not address an existing array element",
                        path
                    )))
                }
            },
        };
    }
    *slot = value;
    Ok(root)
}
