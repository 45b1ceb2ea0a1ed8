//! Expression bridge.
//!
//! Evaluates a bare selector expression by wrapping it in a synthetic
//! single-state definition and sending that through the evaluator, so the
//! harness never interprets JSONPath or JSONata itself.

use serde::Serialize;
use serde_json::{json, Value};
use stepcheck_definition::{DefinitionTree, QueryLanguage};
use tracing::debug;

use super::Run;
use crate::context::{ExecutionContext, StateContext};
use crate::result::StateResult;
use crate::HarnessError;

/// Name of the synthetic state. Reserved: definitions must not use it.
pub(crate) const BRIDGE_STATE: &str = "__stepcheck_expression";

/// What an expression evaluated to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpressionOutcome {
    Value { value: Value },
    Failed { error: String, cause: String },
}

impl Run<'_> {
    /// Evaluate `expression` against `input` and `variables`.
    ///
    /// JSONPath expressions must be reference paths (`$.items`, `$$.Map`,
    /// `$var`) and travel as the synthetic state's `InputPath`. JSONata
    /// expressions (a `{% %}` string or any template value) travel as its
    /// `Output`. The attempt counter the synthetic state records is thrown
    /// away with the forked context.
    pub(crate) async fn bridge(
        &self,
        ctx: &ExecutionContext,
        language: QueryLanguage,
        expression: &Value,
        input: Value,
        variables: Value,
    ) -> Result<ExpressionOutcome, HarnessError> {
        let state = match language {
            QueryLanguage::JsonPath => {
                let path = expression.as_str().ok_or_else(|| {
                    HarnessError::configuration(format!(
                        "JSONPath expression must be a string, got {}",
                        expression
                    ))
                })?;
                json!({"Type": "Pass", "InputPath": path, "End": true})
            }
            QueryLanguage::Jsonata => json!({"Type": "Pass", "Output": expression, "End": true}),
        };
        let document = json!({
            "StartAt": BRIDGE_STATE,
            "QueryLanguage": language.as_str(),
            "States": { BRIDGE_STATE: state },
        });

        debug!(language = language.as_str(), "evaluating expression");

        let fork = ctx.narrow(DefinitionTree::from_value(document)?);
        let hop = StateContext::new(BRIDGE_STATE, language, input, variables);
        let (_, result) = self.dispatch_with(fork, &hop, None).await?;

        match result {
            StateResult::Success { next: None, output, .. } => {
                Ok(ExpressionOutcome::Value { value: output })
            }
            StateResult::Failed { error, cause } => Ok(ExpressionOutcome::Failed { error, cause }),
            other => Err(HarnessError::configuration(format!(
                "expression evaluation produced an unexpected result: {:?}",
                other
            ))),
        }
    }
}
