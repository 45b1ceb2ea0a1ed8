//! Orchestration loop integration tests.
//!
//! Chains of non-composite states driven end to end through the local
//! evaluator, with a recorder in front of it to check what was dispatched.

mod common;

use common::{recording_runner, recording_runner_with, LAMBDA};
use serde_json::json;
use stepcheck::{
    EvaluatorError, FieldValidationMode, HarnessConfig, HarnessError, MockEntry, MockRegistry,
    MockSequence, Terminal,
};

// ──────────────────────────────────────────────
// Sequential chains
// ──────────────────────────────────────────────

#[tokio::test]
async fn jsonpath_chain_threads_output_between_states() {
    let (recorder, runner) = recording_runner(json!({
        "StartAt": "Seed",
        "States": {
            "Seed": {"Type": "Pass", "Result": {"id": 7}, "ResultPath": "$.seed", "Next": "Fetch"},
            "Fetch": {
                "Type": "Task",
                "Resource": LAMBDA,
                "Parameters": {"id.$": "$.seed.id"},
                "ResultSelector": {"name.$": "$.Payload.name"},
                "ResultPath": "$.customer",
                "Next": "Done"
            },
            "Done": {"Type": "Succeed"}
        }
    }));
    let mocks = MockRegistry::new().with(
        "Fetch",
        MockSequence::new().then_return(json!({"Payload": {"name": "Ada"}})),
    );

    let terminal = runner.run(json!({"region": "eu"}), &mocks).await.unwrap();

    assert_eq!(
        terminal.output(),
        Some(&json!({"region": "eu", "seed": {"id": 7}, "customer": {"name": "Ada"}}))
    );
    assert_eq!(recorder.dispatched(), vec!["Seed", "Fetch", "Done"]);
}

#[tokio::test]
async fn jsonata_output_and_assign_flow_to_later_states() {
    let (_, runner) = recording_runner(json!({
        "QueryLanguage": "JSONata",
        "StartAt": "Setup",
        "States": {
            "Setup": {
                "Type": "Pass",
                "Assign": {"greeting": "{% 'hi ' & $states.input.name %}"},
                "Output": "{% $states.input.name %}",
                "Next": "Use"
            },
            "Use": {"Type": "Pass", "Output": {"who": "{% $states.input %}", "msg": "{% $greeting %}"}, "End": true}
        }
    }));

    let terminal = runner.run(json!({"name": "Ada"}), &MockRegistry::new()).await.unwrap();

    assert_eq!(
        terminal,
        Terminal::Succeeded {
            output: json!({"who": "Ada", "msg": "hi Ada"}),
            variables: json!({"greeting": "hi Ada"}),
        }
    );
}

#[tokio::test]
async fn choice_routes_to_matching_branch() {
    let (recorder, runner) = recording_runner(json!({
        "StartAt": "Route",
        "States": {
            "Route": {
                "Type": "Choice",
                "Choices": [{"Variable": "$.size", "NumericGreaterThan": 10, "Next": "Big"}],
                "Default": "Small"
            },
            "Big": {"Type": "Pass", "Result": "big", "End": true},
            "Small": {"Type": "Pass", "Result": "small", "End": true}
        }
    }));

    let terminal = runner.run(json!({"size": 42}), &MockRegistry::new()).await.unwrap();
    assert_eq!(terminal.output(), Some(&json!("big")));
    assert!(!recorder.dispatched().contains(&"Small".to_string()));
}

#[tokio::test]
async fn fail_state_ends_the_run() {
    let (_, runner) = recording_runner(json!({
        "StartAt": "Stop",
        "States": {"Stop": {"Type": "Fail", "Error": "Order.Rejected", "Cause": "out of stock"}}
    }));

    let terminal = runner.run(json!({}), &MockRegistry::new()).await.unwrap();
    assert_eq!(
        terminal,
        Terminal::Failed {
            error: "Order.Rejected".to_string(),
            cause: "out of stock".to_string(),
        }
    );
    assert_eq!(terminal.error(), Some("Order.Rejected"));
    assert_eq!(terminal.cause(), Some("out of stock"));
}

#[tokio::test]
async fn mock_field_validation_reaches_the_evaluator() {
    let (recorder, runner) = recording_runner(json!({
        "StartAt": "Call",
        "States": {"Call": {"Type": "Task", "Resource": LAMBDA, "End": true}}
    }));
    let payload = json!({"Payload": {"ok": true}});
    let mocks = MockRegistry::new().with(
        "Call",
        MockSequence::new().then_return_with(payload.clone(), FieldValidationMode::Present),
    );

    let terminal = runner.run(json!({}), &mocks).await.unwrap();

    assert_eq!(terminal.output(), Some(&payload));
    assert_eq!(
        recorder.requests()[0].mock,
        Some(MockEntry::Return {
            payload,
            validation: FieldValidationMode::Present,
        })
    );
}

// ──────────────────────────────────────────────
// Configuration
// ──────────────────────────────────────────────

fn wait_then_succeed() -> serde_json::Value {
    json!({
        "StartAt": "Pause",
        "States": {
            "Pause": {"Type": "Wait", "Seconds": 3600, "Next": "Done"},
            "Done": {"Type": "Succeed"}
        }
    })
}

#[tokio::test]
async fn wait_states_are_dispatched_by_default() {
    let (recorder, runner) = recording_runner(wait_then_succeed());
    runner.run(json!({"a": 1}), &MockRegistry::new()).await.unwrap();
    assert_eq!(recorder.dispatched(), vec!["Pause", "Done"]);
}

#[tokio::test]
async fn skip_wait_states_passes_through_locally() {
    let config = HarnessConfig {
        skip_wait_states: true,
        ..HarnessConfig::default()
    };
    let (recorder, runner) = recording_runner_with(wait_then_succeed(), config);

    let terminal = runner.run(json!({"a": 1}), &MockRegistry::new()).await.unwrap();

    assert_eq!(terminal.output(), Some(&json!({"a": 1})));
    assert_eq!(recorder.dispatched(), vec!["Done"]);
}

#[tokio::test]
async fn strict_mocks_fail_fast_without_dispatching() {
    let config = HarnessConfig {
        require_mocks_for_task_states: true,
        ..HarnessConfig::default()
    };
    let (recorder, runner) = recording_runner_with(
        json!({
            "StartAt": "Prep",
            "States": {
                "Prep": {"Type": "Pass", "Next": "Call"},
                "Call": {"Type": "Task", "Resource": LAMBDA, "End": true}
            }
        }),
        config,
    );

    let err = runner.run(json!({}), &MockRegistry::new()).await.unwrap_err();

    assert!(matches!(err, HarnessError::MissingMock { ref state } if state == "Call"));
    assert_eq!(recorder.dispatched(), vec!["Prep"]);
}

#[tokio::test]
async fn unmocked_task_is_an_evaluator_limitation() {
    let (_, runner) = recording_runner(json!({
        "StartAt": "Call",
        "States": {"Call": {"Type": "Task", "Resource": LAMBDA, "End": true}}
    }));

    let err = runner.run(json!({}), &MockRegistry::new()).await.unwrap_err();
    assert!(matches!(err, HarnessError::Evaluator(EvaluatorError::Unsupported { .. })));
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn role_reference_is_attached_to_every_request() {
    let config = HarnessConfig {
        execution_role_arn: Some("arn:aws:iam::123456789012:role/test".to_string()),
        ..HarnessConfig::default()
    };
    let (recorder, runner) = recording_runner_with(wait_then_succeed(), config);
    runner.run(json!({}), &MockRegistry::new()).await.unwrap();

    assert!(recorder
        .requests()
        .iter()
        .all(|r| r.role_arn.as_deref() == Some("arn:aws:iam::123456789012:role/test")));
}

#[tokio::test]
async fn runaway_loops_hit_the_transition_limit() {
    let config = HarnessConfig {
        max_transitions: 25,
        ..HarnessConfig::default()
    };
    let (recorder, runner) = recording_runner_with(
        json!({
            "StartAt": "Ping",
            "States": {
                "Ping": {"Type": "Pass", "Next": "Pong"},
                "Pong": {"Type": "Pass", "Next": "Ping"}
            }
        }),
        config,
    );

    let err = runner.run(json!({}), &MockRegistry::new()).await.unwrap_err();
    assert!(matches!(err, HarnessError::StepLimitExceeded { limit: 25 }));
    assert_eq!(recorder.requests().len(), 25);
}

// ──────────────────────────────────────────────
// Task tokens
// ──────────────────────────────────────────────

#[tokio::test]
async fn mocked_callback_task_receives_a_synthetic_token() {
    let (recorder, runner) = recording_runner(json!({
        "StartAt": "Notify",
        "States": {
            "Notify": {
                "Type": "Task",
                "Resource": "arn:aws:states:::sqs:sendMessage.waitForTaskToken",
                "Parameters": {"token.$": "$$.Task.Token"},
                "End": true
            }
        }
    }));
    let mocks = MockRegistry::new().with("Notify", MockSequence::new().then_return(json!({"approved": true})));

    let terminal = runner.run(json!({}), &mocks).await.unwrap();
    assert!(terminal.is_success());

    let requests = recorder.requests();
    let token = requests[0]
        .context
        .as_ref()
        .and_then(|c| c.pointer("/Task/Token"))
        .and_then(|t| t.as_str())
        .unwrap();
    assert_eq!(token.len(), 36);
}

#[tokio::test]
async fn plain_tasks_get_no_token() {
    let (recorder, runner) = recording_runner(json!({
        "StartAt": "Call",
        "States": {"Call": {"Type": "Task", "Resource": LAMBDA, "End": true}}
    }));
    let mocks = MockRegistry::new().with("Call", MockSequence::new().then_return(json!(1)));

    runner.run(json!({}), &mocks).await.unwrap();
    assert!(recorder.requests()[0].context.is_none());
}
