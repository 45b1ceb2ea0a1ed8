//! The state evaluator adapter: one hop through the
//! [`StateEvaluator`](crate::evaluator::StateEvaluator).

use serde_json::json;
use stepcheck_definition::StateKind;
use tracing::{debug, warn};

use super::Run;
use crate::context::{ExecutionContext, StateContext};
use crate::evaluator::EvaluationRequest;
use crate::mock::MockEntry;
use crate::result::StateResult;
use crate::HarnessError;

impl Run<'_> {
    /// Evaluate a state with whatever mock the registry holds for its
    /// current attempt.
    pub(crate) async fn dispatch(
        &self,
        ctx: ExecutionContext,
        state: &StateContext,
    ) -> Result<(ExecutionContext, StateResult), HarnessError> {
        let name = state.state_name();
        let mock = match ctx.mocks().get(name) {
            Some(provider) => Some(provider.entry(ctx.attempts().get(name))?),
            None => None,
        };
        self.dispatch_with(ctx, state, mock).await
    }

    /// Evaluate a state with an explicit mock (or none). Records one
    /// attempt for the state on the returned context.
    pub(crate) async fn dispatch_with(
        &self,
        ctx: ExecutionContext,
        state: &StateContext,
        mock: Option<MockEntry>,
    ) -> Result<(ExecutionContext, StateResult), HarnessError> {
        let name = state.state_name();
        let (kind, wants_token) = {
            let def = ctx.tree().require_state(name)?;
            (def.kind()?, def.requires_task_token())
        };

        if kind == StateKind::Task && mock.is_none() && ctx.config().require_mocks_for_task_states {
            warn!(state = name, "task state has no mock");
            return Err(HarnessError::MissingMock {
                state: name.to_string(),
            });
        }

        let (attempts, attempt) = ctx.attempts().incremented(name);

        let context = (wants_token && mock.is_some())
            .then(|| json!({"Task": {"Token": uuid::Uuid::new_v4().to_string()}}));

        debug!(
            state = name,
            kind = kind.as_str(),
            attempt,
            mocked = mock.is_some(),
            "dispatching state"
        );

        let request = EvaluationRequest {
            definition: ctx.tree().document().clone(),
            state_name: name.to_string(),
            input: state.input().clone(),
            variables: state.variables().clone(),
            mock,
            attempt,
            context,
            role_arn: ctx.config().execution_role_arn.clone(),
        };

        let mut response = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => return Err(HarnessError::Cancelled),
            response = self.evaluator.evaluate(request) => response?,
        };

        if response.variables.is_none() {
            response.variables = Some(state.variables().clone());
        }
        let result = StateResult::from_response(response)?;
        if let StateResult::Failed { error, .. } = &result {
            debug!(state = name, error = %error, "state failed");
        }

        Ok((ctx.with_attempts(attempts), result))
    }
}

