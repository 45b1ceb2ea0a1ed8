//! The single-state evaluator boundary.
//!
//! A [`StateEvaluator`] executes exactly one named state of a definition,
//! given an input, variables and an optional injected mock. It owns the
//! state's input/output processing, expression evaluation and Retry/Catch
//! matching, and reports one of four outcomes. It cannot run Map or
//! Parallel states on its own unless they are mocked; the harness
//! simulates those on top of it.
//!
//! Two implementations ship with the crate:
//! - [`http::HttpEvaluator`] speaks the TestState JSON protocol to a
//!   configured endpoint (feature `http`)
//! - [`local::LocalEvaluator`] is an in-process reference evaluator for a
//!   documented subset of the language (feature `local`)

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "local")]
pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mock::MockEntry;

// ──────────────────────────────────────────────
// Request / response
// ──────────────────────────────────────────────

/// One single-state evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    /// The scope document that declares `state_name`.
    pub definition: Value,
    pub state_name: String,
    pub input: Value,
    pub variables: Value,
    pub mock: Option<MockEntry>,
    /// Zero-based attempt index of this state. Only meaningful when a mock
    /// is injected; the evaluator compares it against Retry budgets.
    pub attempt: u32,
    /// Context object (`$$`), e.g. a synthetic task token.
    pub context: Option<Value>,
    pub role_arn: Option<String>,
}

impl EvaluationRequest {
    pub fn new(definition: Value, state_name: impl Into<String>, input: Value) -> Self {
        EvaluationRequest {
            definition,
            state_name: state_name.into(),
            input,
            variables: Value::Object(Default::default()),
            mock: None,
            attempt: 0,
            context: None,
            role_arn: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationStatus {
    Succeeded,
    Failed,
    CaughtError,
    Retriable,
}

/// The evaluator's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResponse {
    pub status: EvaluationStatus,
    pub next_state: Option<String>,
    pub output: Option<Value>,
    pub variables: Option<Value>,
    pub error: Option<String>,
    pub cause: Option<String>,
    pub diagnostics: Diagnostics,
}

impl EvaluationResponse {
    pub fn succeeded(next_state: Option<String>, output: Value, variables: Value) -> Self {
        EvaluationResponse {
            status: EvaluationStatus::Succeeded,
            next_state,
            output: Some(output),
            variables: Some(variables),
            error: None,
            cause: None,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn failed(error: impl Into<String>, cause: impl Into<String>) -> Self {
        EvaluationResponse {
            status: EvaluationStatus::Failed,
            next_state: None,
            output: None,
            variables: None,
            error: Some(error.into()),
            cause: Some(cause.into()),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn caught(next_state: String, output: Value, variables: Value) -> Self {
        EvaluationResponse {
            status: EvaluationStatus::CaughtError,
            next_state: Some(next_state),
            output: Some(output),
            variables: Some(variables),
            error: None,
            cause: None,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn retriable(error: impl Into<String>, cause: impl Into<String>) -> Self {
        EvaluationResponse {
            status: EvaluationStatus::Retriable,
            ..Self::failed(error, cause)
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// Intermediate values the evaluator observed while processing one state.
///
/// `after_item_selector` is the one the Map simulator depends on: it is
/// the only way to observe the per-item shape an `ItemSelector` produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_input_path: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_items_path: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_item_selector: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_result_selector: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_result_path: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

// ──────────────────────────────────────────────
// EvaluatorError
// ──────────────────────────────────────────────

/// Failures of the evaluator itself, as opposed to workflow failures it
/// reports through [`EvaluationStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluatorError {
    #[error("transport failure: {message}")]
    Transport { message: String },
    #[error("invalid evaluator response: {message}")]
    InvalidResponse { message: String },
    #[error("state '{state}': {message}")]
    Unsupported { state: String, message: String },
    #[error("request rejected: {message}")]
    Rejected { message: String },
}

// ──────────────────────────────────────────────
// StateEvaluator trait
// ──────────────────────────────────────────────

/// Executes one state of a definition.
#[async_trait]
pub trait StateEvaluator: Send + Sync {
    async fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResponse, EvaluatorError>;

    /// Identifier used in logs (e.g. "http", "local").
    fn evaluator_id(&self) -> &str;
}
