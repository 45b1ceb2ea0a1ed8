use stepcheck_definition::DefinitionError;

use crate::config::ConfigError;
use crate::evaluator::EvaluatorError;
use crate::mock::MockError;

/// Harness faults.
///
/// A fault aborts the run immediately. Faults never become workflow
/// failures and are never routed through a Catch policy; workflow errors
/// travel as [`crate::StateResult`] values instead.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The definition uses a feature the harness does not simulate.
    #[error("state '{state}': {feature} is not supported")]
    Unsupported { state: String, feature: String },
    #[error("configuration error: {message}")]
    Configuration { message: String },
    /// Strict mock mode is on and a Task state has no mock.
    #[error("state '{state}' requires a mock, but none was provided")]
    MissingMock { state: String },
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("mock error: {0}")]
    Mock(#[from] MockError),
    #[error("evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("run cancelled")]
    Cancelled,
    #[error("run exceeded the maximum of {limit} state transitions")]
    StepLimitExceeded { limit: usize },
}

impl HarnessError {
    /// Whether this fault reflects a harness limitation rather than a
    /// problem with the definition, mocks or configuration.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            HarnessError::Unsupported { .. }
                | HarnessError::Evaluator(EvaluatorError::Unsupported { .. })
                | HarnessError::Definition(DefinitionError::UnsupportedQueryLanguage { .. })
        )
    }

    pub(crate) fn unsupported(state: &str, feature: impl Into<String>) -> Self {
        HarnessError::Unsupported {
            state: state.to_string(),
            feature: feature.into(),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        HarnessError::Configuration {
            message: message.into(),
        }
    }
}
