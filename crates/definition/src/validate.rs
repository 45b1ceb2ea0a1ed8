//! Load-time structural validation.
//!
//! Checks every reachable scope once, before any state is dispatched, so
//! that a malformed definition surfaces as a configuration fault instead of
//! half-way through a run.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::language::declared_language;
use crate::state::{StateDef, StateKind, Transition};
use crate::DefinitionError;

/// Validate a whole definition document.
///
/// - every scope has a string `StartAt` naming one of its own `States`
/// - every state has a known `Type`, and a known `QueryLanguage` if any
/// - every state except Choice/Succeed/Fail declares `Next` or `End: true`
/// - `Next`, Choice and Catch targets exist in the same scope
/// - Parallel states declare a non-empty `Branches` array
/// - Map states declare an `ItemProcessor` (or `Iterator`)
/// - state names are unique across all reachable scopes
pub fn validate(definition: &Value) -> Result<(), DefinitionError> {
    let mut seen = HashSet::new();
    validate_scope(definition, "definition", &mut seen)
}

fn validate_scope(
    scope: &Value,
    label: &str,
    seen: &mut HashSet<String>,
) -> Result<(), DefinitionError> {
    declared_language(scope)?;

    let start_at = required_str(scope, "StartAt", label)?;
    let states = scope
        .get("States")
        .and_then(Value::as_object)
        .ok_or_else(|| missing(label, "States"))?;

    if !states.contains_key(start_at) {
        return Err(DefinitionError::UnknownTransition {
            state: format!("{} StartAt", label),
            target: start_at.to_string(),
        });
    }

    for (name, value) in states {
        if !seen.insert(name.clone()) {
            return Err(DefinitionError::DuplicateStateName {
                state: name.clone(),
            });
        }
        if !value.is_object() {
            return Err(DefinitionError::InvalidState {
                state: name.clone(),
                message: "state must be a JSON object".to_string(),
            });
        }
        validate_state(StateDef::new(name, value), states, seen)?;
    }

    Ok(())
}

fn validate_state(
    state: StateDef<'_>,
    siblings: &Map<String, Value>,
    seen: &mut HashSet<String>,
) -> Result<(), DefinitionError> {
    let kind = state.kind()?;
    state.query_language()?;

    if !kind.is_self_routing() {
        if let Transition::Next(target) = state.transition()? {
            check_target(&state, &target, siblings)?;
        }
    }
    for target in state.catch_targets() {
        check_target(&state, target, siblings)?;
    }
    if kind == StateKind::Choice {
        for target in state.choice_targets() {
            check_target(&state, target, siblings)?;
        }
    }

    match kind {
        StateKind::Parallel => {
            let branches = state.branches()?;
            if branches.is_empty() {
                return Err(DefinitionError::InvalidState {
                    state: state.name().to_string(),
                    message: "Parallel state must declare at least one branch".to_string(),
                });
            }
            for (index, branch) in branches.iter().enumerate() {
                let label = format!("branch {} of '{}'", index, state.name());
                validate_scope(branch, &label, seen)?;
            }
        }
        StateKind::Map => {
            let label = format!("item processor of '{}'", state.name());
            validate_scope(state.item_processor()?, &label, seen)?;
        }
        StateKind::Task
        | StateKind::Pass
        | StateKind::Choice
        | StateKind::Wait
        | StateKind::Succeed
        | StateKind::Fail => {}
    }

    Ok(())
}

fn check_target(
    state: &StateDef<'_>,
    target: &str,
    siblings: &Map<String, Value>,
) -> Result<(), DefinitionError> {
    if siblings.contains_key(target) {
        Ok(())
    } else {
        Err(DefinitionError::UnknownTransition {
            state: state.name().to_string(),
            target: target.to_string(),
        })
    }
}

fn required_str<'a>(obj: &'a Value, field: &str, label: &str) -> Result<&'a str, DefinitionError> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(label, field))
}

fn missing(label: &str, field: &str) -> DefinitionError {
    DefinitionError::MissingField {
        scope: label.to_string(),
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_definition() {
        validate(&json!({
            "StartAt": "A",
            "States": {"A": {"Type": "Pass", "End": true}}
        }))
        .unwrap();
    }

    #[test]
    fn missing_start_at() {
        let err = validate(&json!({"States": {}})).unwrap_err();
        assert_eq!(
            err,
            DefinitionError::MissingField {
                scope: "definition".to_string(),
                field: "StartAt".to_string()
            }
        );
    }

    #[test]
    fn start_at_must_exist() {
        let err = validate(&json!({
            "StartAt": "Nope",
            "States": {"A": {"Type": "Succeed"}}
        }))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownTransition { .. }));
    }

    #[test]
    fn missing_next_or_end() {
        let err = validate(&json!({
            "StartAt": "A",
            "States": {"A": {"Type": "Pass"}}
        }))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidState { .. }));
    }

    #[test]
    fn unknown_next_target() {
        let err = validate(&json!({
            "StartAt": "A",
            "States": {"A": {"Type": "Pass", "Next": "Ghost"}}
        }))
        .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::UnknownTransition {
                state: "A".to_string(),
                target: "Ghost".to_string()
            }
        );
    }

    #[test]
    fn catch_target_checked() {
        let err = validate(&json!({
            "StartAt": "A",
            "States": {
                "A": {
                    "Type": "Task",
                    "Resource": "arn:aws:states:::lambda:invoke",
                    "Catch": [{"ErrorEquals": ["States.ALL"], "Next": "Ghost"}],
                    "End": true
                }
            }
        }))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownTransition { .. }));
    }

    #[test]
    fn duplicate_names_across_scopes() {
        let err = validate(&json!({
            "StartAt": "Fan",
            "States": {
                "Fan": {
                    "Type": "Parallel",
                    "Branches": [
                        {"StartAt": "Work", "States": {"Work": {"Type": "Succeed"}}},
                        {"StartAt": "Work", "States": {"Work": {"Type": "Succeed"}}}
                    ],
                    "End": true
                }
            }
        }))
        .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::DuplicateStateName {
                state: "Work".to_string()
            }
        );
    }

    #[test]
    fn empty_branches_rejected() {
        let err = validate(&json!({
            "StartAt": "Fan",
            "States": {"Fan": {"Type": "Parallel", "Branches": [], "End": true}}
        }))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidState { .. }));
    }

    #[test]
    fn map_without_processor_rejected() {
        let err = validate(&json!({
            "StartAt": "M",
            "States": {"M": {"Type": "Map", "End": true}}
        }))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidState { .. }));
    }

    #[test]
    fn nested_scope_errors_name_the_scope() {
        let err = validate(&json!({
            "StartAt": "M",
            "States": {
                "M": {
                    "Type": "Map",
                    "ItemProcessor": {"States": {}},
                    "End": true
                }
            }
        }))
        .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::MissingField {
                scope: "item processor of 'M'".to_string(),
                field: "StartAt".to_string()
            }
        );
    }

    #[test]
    fn unknown_query_language_rejected() {
        let err = validate(&json!({
            "StartAt": "A",
            "QueryLanguage": "XPath",
            "States": {"A": {"Type": "Succeed"}}
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::UnsupportedQueryLanguage { .. }
        ));
    }
}
