//! Choice rule evaluation (JSONPath `Variable` rules and JSONata
//! `Condition` rules).

use serde_json::Value;

use super::jsonata;
use super::template::{self, Bindings};
use super::Fault;

/// Evaluate one JSONPath choice rule against `input`.
///
/// Supports `And` / `Or` / `Not` and the comparison operators
/// `StringEquals`, `NumericEquals`, `NumericGreaterThan`,
/// `NumericGreaterThanEquals`, `NumericLessThan`, `NumericLessThanEquals`,
/// `BooleanEquals`, `IsPresent`, `IsNull`.
pub(crate) fn matches_jsonpath(rule: &Value, bindings: &Bindings<'_>) -> Result<bool, Fault> {
    if let Some(all) = rule.get("And").and_then(Value::as_array) {
        for inner in all {
            if !matches_jsonpath(inner, bindings)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }
    if let Some(any) = rule.get("Or").and_then(Value::as_array) {
        for inner in any {
            if matches_jsonpath(inner, bindings)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    if let Some(inner) = rule.get("Not") {
        return Ok(!matches_jsonpath(inner, bindings)?);
    }

    let variable = rule
        .get("Variable")
        .and_then(Value::as_str)
        .ok_or_else(|| Fault::Runtime("choice rule must declare 'Variable'".to_string()))?;
    let value = template::reference_value(variable, bindings).ok();

    if let Some(expected) = rule.get("IsPresent").and_then(Value::as_bool) {
        return Ok(value.is_some() == expected);
    }
    let Some(value) = value else {
        return Err(Fault::Runtime(format!(
            "choice variable '{}' could not be resolved",
            variable
        )));
    };
    if let Some(expected) = rule.get("IsNull").and_then(Value::as_bool) {
        return Ok(value.is_null() == expected);
    }
    if let Some(expected) = rule.get("StringEquals") {
        return Ok(value.is_string() && &value == expected);
    }
    if let Some(expected) = rule.get("BooleanEquals") {
        return Ok(value.is_boolean() && &value == expected);
    }

    let numeric: [(&str, fn(&f64, &f64) -> bool); 5] = [
        ("NumericEquals", f64::eq),
        ("NumericGreaterThan", f64::gt),
        ("NumericGreaterThanEquals", f64::ge),
        ("NumericLessThan", f64::lt),
        ("NumericLessThanEquals", f64::le),
    ];
    for (operator, compare) in numeric {
        if let Some(expected) = rule.get(operator).and_then(Value::as_f64) {
            return Ok(value.as_f64().is_some_and(|actual| compare(&actual, &expected)));
        }
    }

    Err(Fault::Unsupported(format!(
        "choice rule on '{}' uses an unsupported comparison operator",
        variable
    )))
}

/// Evaluate a JSONata `Condition`.
pub(crate) fn matches_jsonata(rule: &Value, bindings: &jsonata::Bindings<'_>) -> Result<bool, Fault> {
    let condition = rule
        .get("Condition")
        .ok_or_else(|| Fault::Runtime("choice rule must declare 'Condition'".to_string()))?;
    match jsonata::resolve_template(condition, bindings)? {
        Value::Bool(b) => Ok(b),
        other => Err(Fault::Runtime(format!(
            "choice condition evaluated to {} instead of a boolean",
            other
        ))),
    }
}
