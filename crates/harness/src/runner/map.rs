//! Map simulation.
//!
//! The evaluator only ever sees the Map node itself, with a mock standing
//! in for the iterations. Items are selected through the expression
//! bridge. The `ItemSelector` shape is observed by dispatching the node
//! with placeholder items, and each item runs through the processor scope
//! on the orchestration loop.
//! The collected outputs (or the first failure) are then injected back as
//! the Map's own mock so its result processing and Retry/Catch apply.

use serde_json::Value;
use stepcheck_definition::{DefinitionTree, QueryLanguage};
use tracing::debug;

use super::bridge::ExpressionOutcome;
use super::Run;
use crate::context::{ExecutionContext, StateContext};
use crate::mock::MockEntry;
use crate::result::{StateResult, Terminal};
use crate::HarnessError;

const INLINE: &str = "INLINE";

/// Either the items to iterate, or the error the Map node fails with.
enum Selected {
    Items(Vec<Value>),
    Failed(MockEntry),
}

impl Run<'_> {
    #[tracing::instrument(skip_all, fields(state = %state.state_name()))]
    pub(crate) async fn simulate_map(
        &self,
        ctx: ExecutionContext,
        state: StateContext,
    ) -> Result<(ExecutionContext, StateResult), HarnessError> {
        let name = state.state_name();
        if ctx.mocks().contains(name) {
            debug!("map state is mocked, skipping simulation");
            return self.dispatch(ctx, &state).await;
        }

        let tree = ctx.tree().clone();
        let def = tree.require_state(name)?;

        if def.has_item_reader() {
            return Err(HarnessError::unsupported(name, "ItemReader"));
        }
        if def.has_item_batcher() {
            return Err(HarnessError::unsupported(name, "ItemBatcher"));
        }
        if let Some(mode) = def.processor_mode().filter(|mode| *mode != INLINE) {
            return Err(HarnessError::unsupported(
                name,
                format!("ProcessorConfig.Mode '{}'", mode),
            ));
        }
        let processor = DefinitionTree::scope(def.item_processor()?, state.query_language())?;

        let items = match self.select_items(&ctx, &state).await? {
            Selected::Items(items) => items,
            Selected::Failed(mock) => return self.dispatch_with(ctx, &state, Some(mock)).await,
        };

        let (mut ctx, items) = match def.item_selector() {
            Some(_) if !items.is_empty() => {
                let count = items.len();
                match self.observe_item_selector(ctx, &state, count).await? {
                    (ctx, Selected::Items(selected)) => (ctx, selected),
                    (ctx, Selected::Failed(mock)) => {
                        return self.dispatch_with(ctx, &state, Some(mock)).await
                    }
                }
            }
            _ => (ctx, items),
        };

        debug!(items = items.len(), "iterating map items");

        let mut outputs = Vec::with_capacity(items.len());
        let mut failure = None;
        for (index, item) in items.into_iter().enumerate() {
            let start = StateContext::new(
                processor.start_at(),
                processor.query_language(),
                item,
                state.variables().clone(),
            );
            let (iteration, terminal) = self.run_chain(ctx.narrow(processor.clone()), start).await?;
            ctx = ctx.merge_attempts(&iteration);

            match terminal {
                Terminal::Succeeded { output, .. } => outputs.push(output),
                Terminal::Failed { error, cause } => {
                    debug!(index, error = %error, "map item failed");
                    failure = Some(MockEntry::fail(error, Some(cause)));
                    break;
                }
            }
        }

        let mock = failure.unwrap_or_else(|| MockEntry::returning(Value::Array(outputs)));
        self.dispatch_with(ctx, &state, Some(mock)).await
    }

    /// `InputPath` then `ItemsPath` (JSONPath), or `Items` (JSONata).
    async fn select_items(
        &self,
        ctx: &ExecutionContext,
        state: &StateContext,
    ) -> Result<Selected, HarnessError> {
        let def = ctx.tree().require_state(state.state_name())?;
        let language = state.query_language();

        let selected = match language {
            QueryLanguage::JsonPath => {
                let mut current = state.input().clone();
                let paths = [
                    def.value().get("InputPath").and_then(Value::as_str),
                    def.items_path()?,
                ];
                for path in paths.into_iter().flatten().filter(|path| *path != "$") {
                    let path = Value::String(path.to_string());
                    match self
                        .bridge(ctx, language, &path, current, state.variables().clone())
                        .await?
                    {
                        ExpressionOutcome::Value { value } => current = value,
                        ExpressionOutcome::Failed { error, cause } => {
                            return Ok(Selected::Failed(MockEntry::fail(error, Some(cause))))
                        }
                    }
                }
                current
            }
            QueryLanguage::Jsonata => match def.items_expression() {
                Some(expression) => {
                    match self
                        .bridge(ctx, language, expression, state.input().clone(), state.variables().clone())
                        .await?
                    {
                        ExpressionOutcome::Value { value } => value,
                        ExpressionOutcome::Failed { error, cause } => {
                            return Ok(Selected::Failed(MockEntry::fail(error, Some(cause))))
                        }
                    }
                }
                None => state.input().clone(),
            },
        };

        match selected {
            Value::Array(items) => Ok(Selected::Items(items)),
            other => Ok(Selected::Failed(MockEntry::fail(
                "States.Runtime",
                Some(format!("Map items must be an array, got {}", other)),
            ))),
        }
    }

    /// Dispatch the Map node with a placeholder result of `count` nulls and
    /// read back the per-item values its `ItemSelector` produced. Like any
    /// dispatch, this records an attempt for the Map node.
    async fn observe_item_selector(
        &self,
        ctx: ExecutionContext,
        state: &StateContext,
        count: usize,
    ) -> Result<(ExecutionContext, Selected), HarnessError> {
        let placeholder = MockEntry::returning(Value::Array(vec![Value::Null; count]));
        let (ctx, observed) = self.dispatch_with(ctx, state, Some(placeholder)).await?;

        let selected = match observed {
            StateResult::Success { diagnostics, .. } => match diagnostics.after_item_selector {
                Some(Value::Array(selected)) if selected.len() == count => Selected::Items(selected),
                Some(other) => {
                    return Err(HarnessError::configuration(format!(
                        "state '{}': evaluator reported {} for the item selector, expected {} items",
                        state.state_name(),
                        other,
                        count
                    )))
                }
                None => {
                    return Err(HarnessError::configuration(format!(
                        "state '{}': evaluator did not report the item selector result",
                        state.state_name()
                    )))
                }
            },
            StateResult::Failed { error, cause } => Selected::Failed(MockEntry::fail(error, Some(cause))),
            other => {
                return Err(HarnessError::configuration(format!(
                    "state '{}': item selector evaluation produced an unexpected result: {:?}",
                    state.state_name(),
                    other
                )))
            }
        };
        Ok((ctx, selected))
    }
}
