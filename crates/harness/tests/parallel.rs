//! Parallel simulation: happy path, retry, catch and unhandled failure at
//! the Parallel node.

mod common;

use common::{recording_runner, LAMBDA};
use serde_json::{json, Value};
use stepcheck::{MockRegistry, MockSequence, Terminal};

fn fork() -> Value {
    json!({
        "StartAt": "Fork",
        "States": {
            "Fork": {
                "Type": "Parallel",
                "Branches": [
                    {"StartAt": "Left", "States": {"Left": {"Type": "Task", "Resource": LAMBDA, "End": true}}},
                    {"StartAt": "Right", "States": {"Right": {"Type": "Task", "Resource": LAMBDA, "End": true}}}
                ],
                "Retry": [{"ErrorEquals": ["RetryMe"], "MaxAttempts": 1}],
                "Catch": [{"ErrorEquals": ["CatchMe"], "ResultPath": "$.error", "Next": "Recover"}],
                "Next": "Done"
            },
            "Recover": {"Type": "Pass", "End": true},
            "Done": {"Type": "Succeed"}
        }
    })
}

#[tokio::test]
async fn happy_branches_collect_in_declaration_order() {
    let (recorder, runner) = recording_runner(fork());
    let mocks = MockRegistry::new()
        .with("Left", MockSequence::new().then_return(json!("L")))
        .with("Right", MockSequence::new().then_return(json!("R")));

    let terminal = runner.run(json!({"x": 1}), &mocks).await.unwrap();

    assert_eq!(terminal.output(), Some(&json!(["L", "R"])));
    assert_eq!(recorder.dispatched(), vec!["Left", "Right", "Fork", "Done"]);
}

#[tokio::test]
async fn branches_start_from_the_parallel_input() {
    let (recorder, runner) = recording_runner(fork());
    let mocks = MockRegistry::new()
        .with("Left", MockSequence::new().then_return(json!("L")))
        .with("Right", MockSequence::new().then_return(json!("R")));

    runner.run(json!({"x": 1}), &mocks).await.unwrap();

    for request in recorder.requests().iter().filter(|r| r.state_name != "Done") {
        assert_eq!(request.input, json!({"x": 1}), "{}", request.state_name);
    }
}

#[tokio::test]
async fn retry_on_the_parallel_node_reruns_every_branch() {
    let (recorder, runner) = recording_runner(fork());
    let mocks = MockRegistry::new()
        .with(
            "Left",
            MockSequence::new().then_fail("RetryMe").then_return(json!("L2")),
        )
        .with("Right", MockSequence::new().then_return(json!("R")));

    let terminal = runner.run(json!({}), &mocks).await.unwrap();

    assert_eq!(terminal.output(), Some(&json!(["L2", "R"])));
    assert_eq!(recorder.attempts_for("Fork"), vec![0, 1]);
    assert_eq!(recorder.attempts_for("Left"), vec![0, 1]);
    // The first round stopped at Left, so Right only ran in the second.
    assert_eq!(recorder.attempts_for("Right"), vec![0]);
}

#[tokio::test]
async fn caught_error_continues_at_the_handler() {
    let (recorder, runner) = recording_runner(fork());
    let mocks = MockRegistry::new()
        .with("Left", MockSequence::new().then_fail_with_cause("CatchMe", "boom"))
        .with("Right", MockSequence::new().then_return(json!("R")));

    let terminal = runner.run(json!({"x": 1}), &mocks).await.unwrap();

    assert_eq!(
        terminal.output(),
        Some(&json!({"x": 1, "error": {"Error": "CatchMe", "Cause": "boom"}}))
    );
    assert!(!recorder.dispatched().contains(&"Right".to_string()));
    assert!(recorder.dispatched().contains(&"Recover".to_string()));
}

#[tokio::test]
async fn unhandled_branch_error_fails_the_run() {
    let (recorder, runner) = recording_runner(fork());
    let mocks = MockRegistry::new()
        .with("Left", MockSequence::new().then_return(json!("L")))
        .with("Right", MockSequence::new().then_fail_with_cause("Boom", "bad"));

    let terminal = runner.run(json!({}), &mocks).await.unwrap();

    assert_eq!(
        terminal,
        Terminal::Failed {
            error: "Boom".to_string(),
            cause: "bad".to_string(),
        }
    );
    assert!(!recorder.dispatched().contains(&"Done".to_string()));
}

#[tokio::test]
async fn mocked_parallel_skips_branches() {
    let (recorder, runner) = recording_runner(fork());
    let mocks = MockRegistry::new().with("Fork", MockSequence::new().then_return(json!(["canned"])));

    let terminal = runner.run(json!({}), &mocks).await.unwrap();

    assert_eq!(terminal.output(), Some(&json!(["canned"])));
    assert_eq!(recorder.dispatched(), vec!["Fork", "Done"]);
}
