//! Orchestration loop.
//!
//! Walks a chain of states until the scope succeeds or fails, delegating
//! Map and Parallel states to their simulators and everything else to the
//! evaluator adapter ([`dispatch`]). Simulators re-enter the loop for each
//! branch or item, so the recursion goes through boxed futures.

mod bridge;
mod dispatch;
mod map;
mod parallel;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use stepcheck_definition::{resolve, DefinitionTree, QueryLanguage, StateKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::context::{ExecutionContext, StateContext};
use crate::evaluator::{Diagnostics, StateEvaluator};
use crate::mock::MockRegistry;
use crate::result::{StateResult, Terminal};
use crate::HarnessError;

pub use bridge::ExpressionOutcome;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Start at this state instead of the definition's `StartAt`. The name
    /// may belong to a nested scope (a Parallel branch or Map processor),
    /// in which case only that scope is run.
    pub start_at: Option<String>,
    /// Aborts the in-flight evaluator call and unwinds the run.
    pub cancellation: CancellationToken,
}

impl RunOptions {
    pub fn start_at(mut self, state_name: impl Into<String>) -> Self {
        self.start_at = Some(state_name.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

// ──────────────────────────────────────────────
// Runner
// ──────────────────────────────────────────────

/// Drives a definition to completion against a [`StateEvaluator`].
///
/// ```no_run
/// # async fn demo() -> Result<(), stepcheck::HarnessError> {
/// use std::sync::Arc;
/// use serde_json::json;
/// use stepcheck::evaluator::local::LocalEvaluator;
/// use stepcheck::{HarnessConfig, MockRegistry, MockSequence, Runner};
///
/// let runner = Runner::from_json(
///     Arc::new(LocalEvaluator::new()),
///     r#"{"StartAt": "Fetch", "States": {"Fetch": {
///         "Type": "Task", "Resource": "arn:aws:states:::lambda:invoke", "End": true}}}"#,
///     HarnessConfig::default(),
/// )?;
/// let mocks = MockRegistry::new().with("Fetch", MockSequence::new().then_return(json!({"ok": true})));
/// let terminal = runner.run(json!({}), &mocks).await?;
/// assert!(terminal.is_success());
/// # Ok(())
/// # }
/// ```
pub struct Runner {
    evaluator: Arc<dyn StateEvaluator>,
    definition: DefinitionTree,
    config: Arc<HarnessConfig>,
}

impl Runner {
    pub fn new(
        evaluator: Arc<dyn StateEvaluator>,
        definition: DefinitionTree,
        config: HarnessConfig,
    ) -> Self {
        Runner {
            evaluator,
            definition,
            config: Arc::new(config),
        }
    }

    /// Parse and validate `definition`, then build a runner for it.
    pub fn from_json(
        evaluator: Arc<dyn StateEvaluator>,
        definition: &str,
        config: HarnessConfig,
    ) -> Result<Self, HarnessError> {
        Ok(Self::new(evaluator, DefinitionTree::parse(definition)?, config))
    }

    pub fn definition(&self) -> &DefinitionTree {
        &self.definition
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub async fn run(&self, input: Value, mocks: &MockRegistry) -> Result<Terminal, HarnessError> {
        self.run_with(input, mocks, RunOptions::default()).await
    }

    pub async fn run_with(
        &self,
        input: Value,
        mocks: &MockRegistry,
        options: RunOptions,
    ) -> Result<Terminal, HarnessError> {
        let (tree, start_at) = match options.start_at {
            Some(name) => {
                let found = resolve(&self.definition, &name)?;
                (found.scope, found.state_name)
            }
            None => (
                self.definition.clone(),
                self.definition.start_at().to_string(),
            ),
        };

        info!(
            evaluator = self.evaluator.evaluator_id(),
            start_at = %start_at,
            mocked_states = mocks.len(),
            "run started"
        );

        let state = StateContext::new(
            start_at,
            tree.query_language(),
            input,
            Value::Object(Default::default()),
        );
        let ctx = ExecutionContext::new(tree, mocks.clone(), Arc::clone(&self.config));
        let run = Run::new(self.evaluator.as_ref(), &self.config, options.cancellation);

        let (_, terminal) = run.run_chain(ctx, state).await?;

        match &terminal {
            Terminal::Succeeded { .. } => info!(status = "SUCCEEDED", "run finished"),
            Terminal::Failed { error, .. } => info!(status = "FAILED", error = %error, "run finished"),
        }
        Ok(terminal)
    }

    /// Evaluate a bare selector expression against `input` through the
    /// evaluator: a JSONPath reference path, or a JSONata value/template.
    pub async fn evaluate_expression(
        &self,
        language: QueryLanguage,
        expression: &Value,
        input: Value,
    ) -> Result<ExpressionOutcome, HarnessError> {
        let ctx = ExecutionContext::new(
            self.definition.clone(),
            MockRegistry::new(),
            Arc::clone(&self.config),
        );
        let run = Run::new(self.evaluator.as_ref(), &self.config, CancellationToken::new());
        run.bridge(
            &ctx,
            language,
            expression,
            input,
            Value::Object(Default::default()),
        )
        .await
    }
}

// ──────────────────────────────────────────────
// Run
// ──────────────────────────────────────────────

/// State shared by every hop of one run, at every nesting depth.
pub(crate) struct Run<'r> {
    evaluator: &'r dyn StateEvaluator,
    cancellation: CancellationToken,
    transitions: AtomicUsize,
    max_transitions: usize,
}

impl<'r> Run<'r> {
    fn new(
        evaluator: &'r dyn StateEvaluator,
        config: &HarnessConfig,
        cancellation: CancellationToken,
    ) -> Self {
        Run {
            evaluator,
            cancellation,
            transitions: AtomicUsize::new(0),
            max_transitions: config.max_transitions,
        }
    }

    /// Walk the chain starting at `state` until the scope settles.
    ///
    /// Success and Failed end the scope; CaughtError continues at the
    /// handler; Retriable evaluates the same state again, and the next
    /// dispatch picks up the bumped attempt counter.
    pub(crate) fn run_chain<'a>(
        &'a self,
        mut ctx: ExecutionContext,
        mut state: StateContext,
    ) -> BoxFuture<'a, Result<(ExecutionContext, Terminal), HarnessError>> {
        Box::pin(async move {
            loop {
                self.tick()?;
                debug!(state = state.state_name(), "entering state");

                let (next_ctx, result) = self.execute_state(ctx, &state).await?;
                ctx = next_ctx;

                match result {
                    StateResult::Success {
                        next: Some(next),
                        output,
                        variables,
                        ..
                    }
                    | StateResult::CaughtError {
                        next,
                        output,
                        variables,
                    } => {
                        state = state.at(next, output, variables);
                    }
                    StateResult::Success {
                        next: None,
                        output,
                        variables,
                        ..
                    } => return Ok((ctx, Terminal::Succeeded { output, variables })),
                    StateResult::Failed { error, cause } => {
                        return Ok((ctx, Terminal::Failed { error, cause }))
                    }
                    StateResult::Retriable => {
                        debug!(state = state.state_name(), "retrying state");
                    }
                }
            }
        })
    }

    async fn execute_state(
        &self,
        ctx: ExecutionContext,
        state: &StateContext,
    ) -> Result<(ExecutionContext, StateResult), HarnessError> {
        let (kind, language, transition) = {
            let def = ctx.tree().require_state(state.state_name())?;
            (def.kind()?, ctx.tree().language_of(&def)?, def.transition())
        };
        let state = state.clone().with_language(language);

        match kind {
            StateKind::Wait if ctx.config().skip_wait_states => {
                debug!(state = state.state_name(), "skipping wait state");
                let next = transition?.next_state().map(str::to_string);
                let result = StateResult::Success {
                    next,
                    output: state.input().clone(),
                    variables: state.variables().clone(),
                    diagnostics: Diagnostics::default(),
                };
                Ok((ctx, result))
            }
            StateKind::Map => self.simulate_map(ctx, state).await,
            StateKind::Parallel => self.simulate_parallel(ctx, state).await,
            StateKind::Task
            | StateKind::Pass
            | StateKind::Choice
            | StateKind::Wait
            | StateKind::Succeed
            | StateKind::Fail => self.dispatch(ctx, &state).await,
        }
    }

    fn tick(&self) -> Result<(), HarnessError> {
        if self.cancellation.is_cancelled() {
            return Err(HarnessError::Cancelled);
        }
        let hops = self.transitions.fetch_add(1, Ordering::Relaxed) + 1;
        if hops > self.max_transitions {
            warn!(limit = self.max_transitions, "transition limit exceeded");
            return Err(HarnessError::StepLimitExceeded {
                limit: self.max_transitions,
            });
        }
        Ok(())
    }
}
