//! Parallel simulation.
//!
//! Branches run one after another, in declaration order, each on a forked
//! context starting from the Parallel state's raw input. The outcome is
//! injected back as the Parallel node's mock.

use serde_json::Value;
use stepcheck_definition::DefinitionTree;
use tracing::debug;

use super::Run;
use crate::context::{ExecutionContext, StateContext};
use crate::mock::MockEntry;
use crate::result::{StateResult, Terminal};
use crate::HarnessError;

impl Run<'_> {
    #[tracing::instrument(skip_all, fields(state = %state.state_name()))]
    pub(crate) async fn simulate_parallel(
        &self,
        ctx: ExecutionContext,
        state: StateContext,
    ) -> Result<(ExecutionContext, StateResult), HarnessError> {
        if ctx.mocks().contains(state.state_name()) {
            debug!("parallel state is mocked, skipping simulation");
            return self.dispatch(ctx, &state).await;
        }

        let branches = {
            let def = ctx.tree().require_state(state.state_name())?;
            def.branches()?
                .iter()
                .map(|branch| DefinitionTree::scope(branch, state.query_language()))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut ctx = ctx;
        let mut outputs = Vec::with_capacity(branches.len());
        let mut failure = None;
        for (index, branch) in branches.into_iter().enumerate() {
            let start = StateContext::new(
                branch.start_at(),
                branch.query_language(),
                state.input().clone(),
                state.variables().clone(),
            );
            let (forked, terminal) = self.run_chain(ctx.narrow(branch), start).await?;
            ctx = ctx.merge_attempts(&forked);

            match terminal {
                Terminal::Succeeded { output, .. } => outputs.push(output),
                Terminal::Failed { error, cause } => {
                    debug!(branch = index, error = %error, "parallel branch failed");
                    failure = Some(MockEntry::fail(error, Some(cause)));
                    break;
                }
            }
        }

        let mock = failure.unwrap_or_else(|| MockEntry::returning(Value::Array(outputs)));
        self.dispatch_with(ctx, &state, Some(mock)).await
    }
}
