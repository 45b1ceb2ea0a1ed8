//! stepcheck: a deterministic test harness for Step Functions state
//! machines.
//!
//! A [`Runner`] walks a definition state by state. Each state is executed
//! by a [`StateEvaluator`](evaluator::StateEvaluator), the single-state
//! evaluation service (remote TestState endpoint or the in-process
//! [`LocalEvaluator`](evaluator::local::LocalEvaluator)). Task results come
//! from a [`MockRegistry`]; Retry and Catch are driven by per-state attempt
//! counters so that each attempt draws the next mock entry. Map and
//! Parallel states, which the evaluator cannot run on its own, are
//! simulated on top of it.

pub mod config;
pub mod context;
pub mod evaluator;
pub mod mock;
pub mod result;

mod error;
mod runner;

pub use config::{ConfigError, HarnessConfig, HttpEvaluatorConfig};
pub use context::{Attempts, ExecutionContext, StateContext};
pub use error::HarnessError;
pub use evaluator::{
    Diagnostics, EvaluationRequest, EvaluationResponse, EvaluationStatus, EvaluatorError,
    StateEvaluator,
};
pub use mock::{
    FieldValidationMode, MockEntry, MockError, MockProvider, MockRegistry, MockSequence,
    TailPolicy,
};
pub use result::{StateResult, Terminal};
pub use runner::{ExpressionOutcome, RunOptions, Runner};

pub use stepcheck_definition as definition;
pub use stepcheck_definition::{DefinitionTree, QueryLanguage};
pub use tokio_util::sync::CancellationToken;
