//! In-process reference evaluator.
//!
//! Implements the single-state contract for a documented subset of the
//! language so the harness can be exercised without a remote endpoint:
//!
//! - `Pass`, `Succeed`, `Fail`, `Wait`, `Choice`
//! - `Task`, `Map` and `Parallel` when a mock is injected
//! - JSONPath `InputPath` / `Parameters` / `ItemsPath` / `ItemSelector` /
//!   `ResultSelector` / `ResultPath` / `OutputPath` / `Assign` with `.$`
//!   templates (see [`template`])
//! - JSONata `Arguments` / `Items` / `ItemSelector` / `Output` / `Assign` /
//!   `Condition` over the subset in [`jsonata`]
//! - Retry then Catch matching (see [`policy`])
//!
//! Failures inside the evaluator's own processing (an unresolvable path,
//! a bad expression) report `FAILED` with `States.Runtime`, which no
//! retrier or catcher intercepts. Features outside the subset are
//! reported as [`EvaluatorError::Unsupported`].

mod choice;
mod jsonata;
mod path;
mod policy;
mod template;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use stepcheck_definition::{DefinitionTree, QueryLanguage, StateDef, StateKind, Transition};

use super::{
    Diagnostics, EvaluationRequest, EvaluationResponse, EvaluatorError, StateEvaluator,
};
use crate::mock::MockEntry;
use policy::Handling;

/// Failure inside local processing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fault {
    /// Reported to the caller as a `States.Runtime` workflow failure.
    Runtime(String),
    /// Outside the supported subset.
    Unsupported(String),
}

const RUNTIME_ERROR: &str = "States.Runtime";
const NO_CHOICE_MATCHED: &str = "States.NoChoiceMatched";

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEvaluator;

impl LocalEvaluator {
    pub fn new() -> Self {
        LocalEvaluator
    }
}

#[async_trait]
impl StateEvaluator for LocalEvaluator {
    async fn evaluate(
        &self,
        request: EvaluationRequest,
    ) -> Result<EvaluationResponse, EvaluatorError> {
        evaluate_request(&request)
    }

    fn evaluator_id(&self) -> &str {
        "local"
    }
}

fn evaluate_request(request: &EvaluationRequest) -> Result<EvaluationResponse, EvaluatorError> {
    let rejected = |e: stepcheck_definition::DefinitionError| EvaluatorError::Rejected {
        message: e.to_string(),
    };
    let tree = DefinitionTree::scope(&request.definition, QueryLanguage::default())
        .map_err(rejected)?;
    let state = tree.require_state(&request.state_name).map_err(rejected)?;
    let kind = state.kind().map_err(rejected)?;
    let language = tree.language_of(&state).map_err(rejected)?;

    let step = Step {
        state,
        language,
        request,
        context: context_object(request),
    };

    match step.run(kind) {
        Ok(response) => Ok(response),
        Err(Fault::Runtime(message)) => Ok(EvaluationResponse::failed(RUNTIME_ERROR, message)),
        Err(Fault::Unsupported(message)) => Err(EvaluatorError::Unsupported {
            state: request.state_name.clone(),
            message,
        }),
    }
}

/// The `$$` object: whatever the caller supplied plus `State.Name` and
/// `State.RetryCount`.
fn context_object(request: &EvaluationRequest) -> Value {
    let mut context = request
        .context
        .clone()
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({}));
    context["State"] = json!({
        "Name": request.state_name,
        "RetryCount": request.attempt,
    });
    context
}

// ──────────────────────────────────────────────
// Single-state evaluation
// ──────────────────────────────────────────────

struct Step<'a> {
    state: StateDef<'a>,
    language: QueryLanguage,
    request: &'a EvaluationRequest,
    context: Value,
}

impl<'a> Step<'a> {
    fn run(&self, kind: StateKind) -> Result<EvaluationResponse, Fault> {
        match kind {
            StateKind::Pass => self.pass(),
            StateKind::Task => self.task(),
            StateKind::Map => self.map(),
            StateKind::Parallel => self.parallel(),
            StateKind::Choice => self.choice(),
            StateKind::Wait => self.wait(),
            StateKind::Succeed => self.succeed(),
            StateKind::Fail => self.fail(),
        }
    }

    fn field(&self, name: &str) -> Option<&'a Value> {
        self.state.value().get(name)
    }

    fn input(&self) -> &'a Value {
        &self.request.input
    }

    fn variables(&self) -> &'a Value {
        &self.request.variables
    }

    // ── state kinds ──────────────────────────

    fn pass(&self) -> Result<EvaluationResponse, Fault> {
        match self.language {
            QueryLanguage::JsonPath => {
                let mut diagnostics = Diagnostics::default();
                let effective = self.input_path(&mut diagnostics)?;
                let parameters = self.parameters("Parameters", &effective, &mut diagnostics)?;
                let result = self.field("Result").cloned().unwrap_or(parameters);
                self.finish(result, diagnostics)
            }
            QueryLanguage::Jsonata => self.finish(self.input().clone(), Diagnostics::default()),
        }
    }

    fn task(&self) -> Result<EvaluationResponse, Fault> {
        let mock = self.require_mock("Task")?;
        let diagnostics = self.arguments()?;
        self.complete_with_mock(mock, diagnostics)
    }

    fn parallel(&self) -> Result<EvaluationResponse, Fault> {
        let mock = self.require_mock("Parallel")?;
        let diagnostics = self.arguments()?;
        self.complete_with_mock(mock, diagnostics)
    }

    fn map(&self) -> Result<EvaluationResponse, Fault> {
        let mock = self.require_mock("Map")?;
        let mut diagnostics = Diagnostics::default();

        let selected = match self.language {
            QueryLanguage::JsonPath => {
                let effective = self.input_path(&mut diagnostics)?;
                let items = match self.state.items_path() {
                    Ok(Some(items_path)) => path::select(&effective, items_path)?,
                    Ok(None) => effective.clone(),
                    Err(e) => return Err(Fault::Runtime(e.to_string())),
                };
                diagnostics.after_items_path = Some(items.clone());
                let items = as_items(items)?;
                match self.state.item_selector() {
                    Some(selector) => items
                        .into_iter()
                        .enumerate()
                        .map(|(index, item)| {
                            let context = self.item_context(index, &item);
                            template::resolve(
                                selector,
                                &template::Bindings {
                                    input: &effective,
                                    context: &context,
                                    variables: self.variables(),
                                },
                            )
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    None => items,
                }
            }
            QueryLanguage::Jsonata => {
                let states = self.states_object(None, None);
                let items = match self.state.items_expression() {
                    Some(expression) => {
                        jsonata::resolve_template(expression, &self.jsonata_bindings(&states))?
                    }
                    None => self.input().clone(),
                };
                diagnostics.after_items_path = Some(items.clone());
                let items = as_items(items)?;
                match self.state.item_selector() {
                    Some(selector) => items
                        .into_iter()
                        .enumerate()
                        .map(|(index, item)| {
                            let mut states = states.clone();
                            states["context"] = self.item_context(index, &item);
                            jsonata::resolve_template(selector, &self.jsonata_bindings(&states))
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    None => items,
                }
            }
        };
        diagnostics.after_item_selector = Some(Value::Array(selected));

        self.complete_with_mock(mock, diagnostics)
    }

    fn choice(&self) -> Result<EvaluationResponse, Fault> {
        let rules = self
            .field("Choices")
            .and_then(Value::as_array)
            .ok_or_else(|| Fault::Runtime("Choice state must declare 'Choices'".to_string()))?;
        let default = self.field("Default").and_then(Value::as_str);

        let (next, output) = match self.language {
            QueryLanguage::JsonPath => {
                let mut diagnostics = Diagnostics::default();
                let effective = self.input_path(&mut diagnostics)?;
                let bindings = template::Bindings {
                    input: &effective,
                    context: &self.context,
                    variables: self.variables(),
                };
                let mut next = None;
                for rule in rules {
                    if choice::matches_jsonpath(rule, &bindings)? {
                        next = rule.get("Next").and_then(Value::as_str);
                        break;
                    }
                }
                (next.or(default), self.output_path(effective)?)
            }
            QueryLanguage::Jsonata => {
                let states = self.states_object(None, None);
                let bindings = self.jsonata_bindings(&states);
                let mut next = None;
                for rule in rules {
                    if choice::matches_jsonata(rule, &bindings)? {
                        next = rule.get("Next").and_then(Value::as_str);
                        break;
                    }
                }
                let output = match self.field("Output") {
                    Some(template) => jsonata::resolve_template(template, &bindings)?,
                    None => self.input().clone(),
                };
                (next.or(default), output)
            }
        };

        match next {
            Some(next) => Ok(EvaluationResponse::succeeded(
                Some(next.to_string()),
                output,
                self.variables().clone(),
            )),
            None => Ok(EvaluationResponse::failed(
                NO_CHOICE_MATCHED,
                format!("no choice rule matched in state '{}'", self.state.name()),
            )),
        }
    }

    fn wait(&self) -> Result<EvaluationResponse, Fault> {
        let output = self.passthrough_output()?;
        let next = self.next_state()?;
        Ok(EvaluationResponse::succeeded(next, output, self.variables().clone()))
    }

    fn succeed(&self) -> Result<EvaluationResponse, Fault> {
        let output = self.passthrough_output()?;
        Ok(EvaluationResponse::succeeded(None, output, self.variables().clone()))
    }

    fn fail(&self) -> Result<EvaluationResponse, Fault> {
        let read = |field: &str, path_field: &str| -> Result<String, Fault> {
            let value = match self.language {
                QueryLanguage::JsonPath => match self.field(path_field).and_then(Value::as_str) {
                    Some(reference) => Some(template::reference_value(
                        reference,
                        &template::Bindings {
                            input: self.input(),
                            context: &self.context,
                            variables: self.variables(),
                        },
                    )?),
                    None => self.field(field).cloned(),
                },
                QueryLanguage::Jsonata => match self.field(field) {
                    Some(template) => {
                        let states = self.states_object(None, None);
                        Some(jsonata::resolve_template(template, &self.jsonata_bindings(&states))?)
                    }
                    None => None,
                },
            };
            Ok(match value {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            })
        };
        let error = read("Error", "ErrorPath")?;
        let cause = read("Cause", "CausePath")?;
        Ok(EvaluationResponse::failed(error, cause))
    }

    // ── shared pipeline ──────────────────────

    fn require_mock(&self, kind: &str) -> Result<&'a MockEntry, Fault> {
        self.request.mock.as_ref().ok_or_else(|| {
            Fault::Unsupported(format!(
                "{} states can only be evaluated with an injected mock",
                kind
            ))
        })
    }

    /// Task/Parallel argument processing, recorded for diagnostics only:
    /// the mock stands in for whatever the arguments would have invoked.
    fn arguments(&self) -> Result<Diagnostics, Fault> {
        let mut diagnostics = Diagnostics::default();
        match self.language {
            QueryLanguage::JsonPath => {
                let effective = self.input_path(&mut diagnostics)?;
                self.parameters("Parameters", &effective, &mut diagnostics)?;
            }
            QueryLanguage::Jsonata => {
                if let Some(arguments) = self.field("Arguments") {
                    let states = self.states_object(None, None);
                    diagnostics.after_parameters = Some(jsonata::resolve_template(
                        arguments,
                        &self.jsonata_bindings(&states),
                    )?);
                }
            }
        }
        Ok(diagnostics)
    }

    fn complete_with_mock(
        &self,
        mock: &MockEntry,
        diagnostics: Diagnostics,
    ) -> Result<EvaluationResponse, Fault> {
        match mock {
            MockEntry::Return { payload, .. } => self.finish(payload.clone(), diagnostics),
            MockEntry::Fail { error, cause } => self.handle_error(error, cause),
        }
    }

    /// Result processing and transition for a state that produced `result`.
    fn finish(&self, result: Value, mut diagnostics: Diagnostics) -> Result<EvaluationResponse, Fault> {
        let (output, variables) = match self.language {
            QueryLanguage::JsonPath => {
                diagnostics.result = Some(result.clone());
                let selected = match self.field("ResultSelector") {
                    Some(selector) => {
                        let selected = template::resolve(
                            selector,
                            &template::Bindings {
                                input: &result,
                                context: &self.context,
                                variables: self.variables(),
                            },
                        )?;
                        diagnostics.after_result_selector = Some(selected.clone());
                        selected
                    }
                    None => result,
                };
                let variables = self.assign_jsonpath(&selected)?;
                let combined = self.result_path(self.field("ResultPath"), selected)?;
                diagnostics.after_result_path = Some(combined.clone());
                (self.output_path(combined)?, variables)
            }
            QueryLanguage::Jsonata => {
                diagnostics.result = Some(result.clone());
                let states = self.states_object(Some(&result), None);
                let bindings = self.jsonata_bindings(&states);
                let variables = self.assign_jsonata(self.field("Assign"), &bindings)?;
                let output = match self.field("Output") {
                    Some(template) => jsonata::resolve_template(template, &bindings)?,
                    None => result,
                };
                (output, variables)
            }
        };

        diagnostics.variables = Some(variables.clone());
        let next = self.next_state()?;
        Ok(EvaluationResponse::succeeded(next, output, variables).with_diagnostics(diagnostics))
    }

    /// Retry, then Catch, then fail.
    fn handle_error(&self, error: &str, cause: &str) -> Result<EvaluationResponse, Fault> {
        match policy::decide(self.state.value(), error, self.request.attempt) {
            Handling::Retry => Ok(EvaluationResponse::retriable(error, cause)),
            Handling::Unhandled => Ok(EvaluationResponse::failed(error, cause)),
            Handling::Catch(catcher) => {
                let next = catcher
                    .get("Next")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Fault::Runtime("catcher must declare 'Next'".to_string()))?;
                let error_output = json!({"Error": error, "Cause": cause});

                let (output, variables) = match self.language {
                    QueryLanguage::JsonPath => {
                        let output = self.result_path(catcher.get("ResultPath"), error_output)?;
                        (output, self.variables().clone())
                    }
                    QueryLanguage::Jsonata => {
                        let states = self.states_object(None, Some(&error_output));
                        let bindings = self.jsonata_bindings(&states);
                        let variables = self.assign_jsonata(catcher.get("Assign"), &bindings)?;
                        let output = match catcher.get("Output") {
                            Some(template) => jsonata::resolve_template(template, &bindings)?,
                            None => error_output,
                        };
                        (output, variables)
                    }
                };
                Ok(EvaluationResponse::caught(next.to_string(), output, variables))
            }
        }
    }

    fn passthrough_output(&self) -> Result<Value, Fault> {
        match self.language {
            QueryLanguage::JsonPath => {
                let effective = self.input_path(&mut Diagnostics::default())?;
                self.output_path(effective)
            }
            QueryLanguage::Jsonata => match self.field("Output") {
                Some(template) => {
                    let states = self.states_object(None, None);
                    jsonata::resolve_template(template, &self.jsonata_bindings(&states))
                }
                None => Ok(self.input().clone()),
            },
        }
    }

    fn next_state(&self) -> Result<Option<String>, Fault> {
        match self.state.transition() {
            Ok(Transition::Next(next)) => Ok(Some(next)),
            Ok(Transition::End) => Ok(None),
            Err(e) => Err(Fault::Runtime(e.to_string())),
        }
    }

    // ── JSONPath helpers ─────────────────────

    fn input_path(&self, diagnostics: &mut Diagnostics) -> Result<Value, Fault> {
        let effective = match self.field("InputPath") {
            None => self.input().clone(),
            Some(Value::Null) => json!({}),
            Some(Value::String(p)) => path::select(self.input(), p)?,
            Some(_) => return Err(Fault::Runtime("'InputPath' must be a string or null".to_string())),
        };
        diagnostics.after_input_path = Some(effective.clone());
        Ok(effective)
    }

    fn parameters(
        &self,
        field: &str,
        effective: &Value,
        diagnostics: &mut Diagnostics,
    ) -> Result<Value, Fault> {
        let value = match self.field(field) {
            Some(template) => template::resolve(
                template,
                &template::Bindings {
                    input: effective,
                    context: &self.context,
                    variables: self.variables(),
                },
            )?,
            None => effective.clone(),
        };
        diagnostics.after_parameters = Some(value.clone());
        Ok(value)
    }

    /// Merge `result` into the raw state input. Absent means replace,
    /// `null` means discard.
    fn result_path(&self, result_path: Option<&Value>, result: Value) -> Result<Value, Fault> {
        match result_path {
            None => Ok(result),
            Some(Value::Null) => Ok(self.input().clone()),
            Some(Value::String(p)) => path::insert(self.input().clone(), p, result),
            Some(_) => Err(Fault::Runtime("'ResultPath' must be a string or null".to_string())),
        }
    }

    fn output_path(&self, value: Value) -> Result<Value, Fault> {
        match self.field("OutputPath") {
            None => Ok(value),
            Some(Value::Null) => Ok(json!({})),
            Some(Value::String(p)) => path::select(&value, p),
            Some(_) => Err(Fault::Runtime("'OutputPath' must be a string or null".to_string())),
        }
    }

    fn assign_jsonpath(&self, result: &Value) -> Result<Value, Fault> {
        let Some(assign) = self.field("Assign") else {
            return Ok(self.variables().clone());
        };
        let assigned = template::resolve(
            assign,
            &template::Bindings {
                input: result,
                context: &self.context,
                variables: self.variables(),
            },
        )?;
        Ok(merge_variables(self.variables(), assigned))
    }

    // ── JSONata helpers ──────────────────────

    fn states_object(&self, result: Option<&Value>, error_output: Option<&Value>) -> Value {
        let mut states = Map::new();
        states.insert("input".to_string(), self.input().clone());
        states.insert("context".to_string(), self.context.clone());
        if let Some(result) = result {
            states.insert("result".to_string(), result.clone());
        }
        if let Some(error_output) = error_output {
            states.insert("errorOutput".to_string(), error_output.clone());
        }
        Value::Object(states)
    }

    fn jsonata_bindings<'b>(&'b self, states: &'b Value) -> jsonata::Bindings<'b> {
        jsonata::Bindings {
            states,
            variables: self.variables(),
        }
    }

    fn assign_jsonata(
        &self,
        assign: Option<&Value>,
        bindings: &jsonata::Bindings<'_>,
    ) -> Result<Value, Fault> {
        match assign {
            Some(assign) => {
                let assigned = jsonata::resolve_template(assign, bindings)?;
                Ok(merge_variables(self.variables(), assigned))
            }
            None => Ok(self.variables().clone()),
        }
    }

    fn item_context(&self, index: usize, item: &Value) -> Value {
        let mut context = self.context.clone();
        context["Map"] = json!({"Item": {"Index": index, "Value": item}});
        context
    }
}

fn as_items(value: Value) -> Result<Vec<Value>, Fault> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(Fault::Runtime(format!(
            "Map items must be an array, got {}",
            other
        ))),
    }
}

fn merge_variables(current: &Value, assigned: Value) -> Value {
    let mut merged = current.as_object().cloned().unwrap_or_default();
    if let Value::Object(assigned) = assigned {
        merged.extend(assigned);
    }
    Value::Object(merged)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvaluationStatus;

    fn single(state: Value) -> Value {
        json!({"StartAt": "S", "States": {"S": state, "Next": {"Type": "Succeed"}}})
    }

    fn eval(definition: Value, input: Value, mock: Option<MockEntry>, attempt: u32) -> EvaluationResponse {
        let mut request = EvaluationRequest::new(definition, "S", input);
        request.mock = mock;
        request.attempt = attempt;
        evaluate_request(&request).unwrap()
    }

    #[test]
    fn pass_result_and_result_path() {
        let response = eval(
            single(json!({
                "Type": "Pass",
                "Result": {"handled": true},
                "ResultPath": "$.Handled",
                "Next": "Next"
            })),
            json!({"a": 1}),
            None,
            0,
        );
        assert_eq!(response.status, EvaluationStatus::Succeeded);
        assert_eq!(response.next_state.as_deref(), Some("Next"));
        assert_eq!(response.output, Some(json!({"a": 1, "Handled": {"handled": true}})));
    }

    #[test]
    fn pass_input_path_selects() {
        let response = eval(
            single(json!({"Type": "Pass", "InputPath": "$.items", "End": true})),
            json!({"items": [1, 2]}),
            None,
            0,
        );
        assert_eq!(response.output, Some(json!([1, 2])));
        assert_eq!(response.next_state, None);
    }

    #[test]
    fn unresolvable_path_is_runtime_failure() {
        let response = eval(
            single(json!({"Type": "Pass", "InputPath": "$.missing", "End": true})),
            json!({}),
            None,
            0,
        );
        assert_eq!(response.status, EvaluationStatus::Failed);
        assert_eq!(response.error.as_deref(), Some(RUNTIME_ERROR));
    }

    #[test]
    fn jsonata_pass_output() {
        let response = eval(
            json!({
                "StartAt": "S",
                "QueryLanguage": "JSONata",
                "States": {"S": {"Type": "Pass", "Output": {"value": 15}, "End": true}}
            }),
            json!({"input": true}),
            None,
            0,
        );
        assert_eq!(response.output, Some(json!({"value": 15})));
    }

    #[test]
    fn task_without_mock_is_unsupported() {
        let mut request = EvaluationRequest::new(
            single(json!({"Type": "Task", "Resource": "arn:aws:states:::lambda:invoke", "End": true})),
            "S",
            json!({}),
        );
        request.mock = None;
        assert!(matches!(
            evaluate_request(&request),
            Err(EvaluatorError::Unsupported { .. })
        ));
    }

    #[test]
    fn task_mock_flows_through_result_selector() {
        let response = eval(
            single(json!({
                "Type": "Task",
                "Resource": "arn:aws:states:::lambda:invoke",
                "ResultSelector": {"value.$": "$.Payload.value"},
                "ResultPath": "$.out",
                "End": true
            })),
            json!({"keep": 1}),
            Some(MockEntry::returning(json!({"Payload": {"value": "v"}}))),
            0,
        );
        assert_eq!(response.output, Some(json!({"keep": 1, "out": {"value": "v"}})));
    }

    #[test]
    fn catch_applies_result_path() {
        let response = eval(
            single(json!({
                "Type": "Task",
                "Resource": "arn:aws:states:::lambda:invoke",
                "Catch": [{"ErrorEquals": ["CatchableError"], "ResultPath": "$.Err", "Next": "Next"}],
                "End": true
            })),
            json!({"a": 1}),
            Some(MockEntry::fail("CatchableError", None)),
            0,
        );
        assert_eq!(response.status, EvaluationStatus::CaughtError);
        assert_eq!(response.next_state.as_deref(), Some("Next"));
        assert_eq!(
            response.output,
            Some(json!({"a": 1, "Err": {"Error": "CatchableError", "Cause": "CatchableError"}}))
        );
    }

    #[test]
    fn retry_then_exhaustion() {
        let definition = single(json!({
            "Type": "Task",
            "Resource": "arn:aws:states:::lambda:invoke",
            "Retry": [{"ErrorEquals": ["RetryableError"], "MaxAttempts": 1}],
            "End": true
        }));
        let first = eval(
            definition.clone(),
            json!({}),
            Some(MockEntry::fail("RetryableError", None)),
            0,
        );
        assert_eq!(first.status, EvaluationStatus::Retriable);
        let second = eval(
            definition,
            json!({}),
            Some(MockEntry::fail("RetryableError", None)),
            1,
        );
        assert_eq!(second.status, EvaluationStatus::Failed);
        assert_eq!(second.error.as_deref(), Some("RetryableError"));
    }

    #[test]
    fn map_reports_item_selector_diagnostics() {
        let response = eval(
            single(json!({
                "Type": "Map",
                "ItemsPath": "$.items",
                "ItemSelector": {"value.$": "$$.Map.Item.Value", "index.$": "$$.Map.Item.Index"},
                "ItemProcessor": {"StartAt": "W", "States": {"W": {"Type": "Pass", "End": true}}},
                "End": true
            })),
            json!({"items": ["alpha", "beta"]}),
            Some(MockEntry::returning(json!([null, null]))),
            0,
        );
        assert_eq!(
            response.diagnostics.after_item_selector,
            Some(json!([{"value": "alpha", "index": 0}, {"value": "beta", "index": 1}]))
        );
        assert_eq!(response.output, Some(json!([null, null])));
    }

    #[test]
    fn jsonata_map_items_expression() {
        let response = eval(
            json!({
                "StartAt": "S",
                "QueryLanguage": "JSONata",
                "States": {
                    "S": {
                        "Type": "Map",
                        "Items": "{% $states.input.list %}",
                        "ItemSelector": {"v": "{% $states.context.Map.Item.Value * 2 %}"},
                        "ItemProcessor": {"StartAt": "W", "States": {"W": {"Type": "Pass", "End": true}}},
                        "End": true
                    }
                }
            }),
            json!({"list": [1, 2]}),
            Some(MockEntry::returning(json!([null, null]))),
            0,
        );
        assert_eq!(
            response.diagnostics.after_item_selector,
            Some(json!([{"v": 2}, {"v": 4}]))
        );
    }

    #[test]
    fn choice_routes_and_defaults() {
        let definition = json!({
            "StartAt": "S",
            "States": {
                "S": {
                    "Type": "Choice",
                    "Choices": [{"Variable": "$.n", "NumericGreaterThan": 3, "Next": "Big"}],
                    "Default": "Small"
                },
                "Big": {"Type": "Succeed"},
                "Small": {"Type": "Succeed"}
            }
        });
        let big = eval(definition.clone(), json!({"n": 5}), None, 0);
        assert_eq!(big.next_state.as_deref(), Some("Big"));
        let small = eval(definition, json!({"n": 1}), None, 0);
        assert_eq!(small.next_state.as_deref(), Some("Small"));
    }

    #[test]
    fn fail_state_reports_error_and_cause() {
        let response = eval(
            single(json!({"Type": "Fail", "Error": "Custom", "Cause": "because"})),
            json!({}),
            None,
            0,
        );
        assert_eq!(response.status, EvaluationStatus::Failed);
        assert_eq!(response.error.as_deref(), Some("Custom"));
        assert_eq!(response.cause.as_deref(), Some("because"));
    }

    #[test]
    fn task_token_context_is_visible() {
        let mut request = EvaluationRequest::new(
            single(json!({
                "Type": "Task",
                "Resource": "arn:aws:states:::sqs:sendMessage.waitForTaskToken",
                "Parameters": {"token.$": "$$.Task.Token"},
                "End": true
            })),
            "S",
            json!({}),
        );
        request.mock = Some(MockEntry::returning(json!({})));
        request.context = Some(json!({"Task": {"Token": "tok"}}));
        let response = evaluate_request(&request).unwrap();
        assert_eq!(
            response.diagnostics.after_parameters,
            Some(json!({"token": "tok"}))
        );
    }
}
