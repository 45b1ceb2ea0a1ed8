//! State results and terminal run results.

use serde::Serialize;
use serde_json::Value;

use crate::evaluator::{Diagnostics, EvaluationResponse, EvaluationStatus, EvaluatorError};
use crate::HarnessError;

/// The outcome of evaluating one state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateResult {
    /// No `next` means the scope is done.
    Success {
        next: Option<String>,
        output: Value,
        variables: Value,
        diagnostics: Diagnostics,
    },
    /// Terminal for the current scope.
    Failed { error: String, cause: String },
    /// A Catch policy matched; continue at the handler.
    CaughtError {
        next: String,
        output: Value,
        variables: Value,
    },
    /// A Retry policy matched; evaluate the same state again.
    Retriable,
}

impl StateResult {
    /// Translate an evaluator response 1:1.
    pub fn from_response(response: EvaluationResponse) -> Result<Self, HarnessError> {
        let variables = response
            .variables
            .unwrap_or_else(|| Value::Object(Default::default()));

        match response.status {
            EvaluationStatus::Succeeded => Ok(StateResult::Success {
                next: response.next_state,
                output: response.output.ok_or_else(|| missing("SUCCEEDED", "output"))?,
                variables,
                diagnostics: response.diagnostics,
            }),
            EvaluationStatus::Failed => Ok(StateResult::Failed {
                error: response.error.unwrap_or_default(),
                cause: response.cause.unwrap_or_default(),
            }),
            EvaluationStatus::CaughtError => Ok(StateResult::CaughtError {
                next: response
                    .next_state
                    .ok_or_else(|| missing("CAUGHT_ERROR", "next state"))?,
                output: response
                    .output
                    .ok_or_else(|| missing("CAUGHT_ERROR", "output"))?,
                variables,
            }),
            EvaluationStatus::Retriable => Ok(StateResult::Retriable),
        }
    }
}

fn missing(status: &str, field: &str) -> HarnessError {
    HarnessError::Evaluator(EvaluatorError::InvalidResponse {
        message: format!("{} response without {}", status, field),
    })
}

/// How a run (or a nested scope) ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Terminal {
    Succeeded { output: Value, variables: Value },
    Failed { error: String, cause: String },
}

impl Terminal {
    pub fn is_success(&self) -> bool {
        matches!(self, Terminal::Succeeded { .. })
    }

    pub fn output(&self) -> Option<&Value> {
        match self {
            Terminal::Succeeded { output, .. } => Some(output),
            Terminal::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Terminal::Succeeded { .. } => None,
            Terminal::Failed { error, .. } => Some(error),
        }
    }

    pub fn cause(&self) -> Option<&str> {
        match self {
            Terminal::Succeeded { .. } => None,
            Terminal::Failed { cause, .. } => Some(cause),
        }
    }
}
