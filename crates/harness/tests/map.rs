//! Map simulation: item selection, per-item execution, and finalization
//! through the Map node.

mod common;

use common::{recording_runner, LAMBDA};
use serde_json::{json, Value};
use stepcheck::{MockRegistry, MockSequence, Terminal};

fn charge_each(catch: Option<Value>) -> Value {
    let mut each = json!({
        "Type": "Map",
        "ItemsPath": "$.orders",
        "ItemProcessor": {
            "StartAt": "Charge",
            "States": {"Charge": {"Type": "Task", "Resource": LAMBDA, "End": true}}
        },
        "End": true
    });
    if let Some(catch) = catch {
        each["Catch"] = catch;
    }
    json!({
        "StartAt": "Each",
        "States": {
            "Each": each,
            "Refund": {"Type": "Pass", "End": true}
        }
    })
}

#[tokio::test]
async fn items_run_in_order_and_share_attempt_counters() {
    let (recorder, runner) = recording_runner(charge_each(None));
    let mocks = MockRegistry::new().with(
        "Charge",
        MockSequence::new()
            .then_return(json!({"ok": 1}))
            .then_return(json!({"ok": 2}))
            .then_return(json!({"ok": 3})),
    );

    let terminal = runner
        .run(json!({"orders": ["a", "b", "c"]}), &mocks)
        .await
        .unwrap();

    assert_eq!(terminal.output(), Some(&json!([{"ok": 1}, {"ok": 2}, {"ok": 3}])));
    assert_eq!(recorder.attempts_for("Charge"), vec![0, 1, 2]);
    let inputs: Vec<Value> = recorder
        .requests()
        .into_iter()
        .filter(|r| r.state_name == "Charge")
        .map(|r| r.input)
        .collect();
    assert_eq!(inputs, vec![json!("a"), json!("b"), json!("c")]);
}

#[tokio::test]
async fn failed_item_stops_later_items() {
    let (recorder, runner) = recording_runner(charge_each(None));
    let mocks = MockRegistry::new().with(
        "Charge",
        MockSequence::new()
            .then_return(json!({"ok": 1}))
            .then_fail("Declined")
            .then_return(json!({"ok": 3})),
    );

    let terminal = runner
        .run(json!({"orders": ["a", "b", "c"]}), &mocks)
        .await
        .unwrap();

    assert_eq!(
        terminal,
        Terminal::Failed {
            error: "Declined".to_string(),
            cause: "Declined".to_string(),
        }
    );
    assert_eq!(recorder.attempts_for("Charge"), vec![0, 1]);
}

#[tokio::test]
async fn catch_on_the_map_node_handles_item_failure() {
    let (recorder, runner) = recording_runner(charge_each(Some(json!([
        {"ErrorEquals": ["States.ALL"], "ResultPath": "$.failure", "Next": "Refund"}
    ]))));
    let mocks = MockRegistry::new().with("Charge", MockSequence::new().then_fail("Declined"));

    let terminal = runner.run(json!({"orders": ["a", "b"]}), &mocks).await.unwrap();

    assert_eq!(
        terminal.output(),
        Some(&json!({
            "orders": ["a", "b"],
            "failure": {"Error": "Declined", "Cause": "Declined"}
        }))
    );
    assert_eq!(recorder.attempts_for("Charge"), vec![0]);
}

#[tokio::test]
async fn item_selector_is_observed_through_an_extra_dispatch() {
    let (recorder, runner) = recording_runner(json!({
        "StartAt": "Each",
        "States": {
            "Each": {
                "Type": "Map",
                "ItemsPath": "$.orders",
                "ItemSelector": {"order.$": "$$.Map.Item.Value", "index.$": "$$.Map.Item.Index"},
                "ItemProcessor": {
                    "StartAt": "Echo",
                    "States": {"Echo": {"Type": "Pass", "End": true}}
                },
                "End": true
            }
        }
    }));

    let terminal = runner
        .run(json!({"orders": ["a", "b"]}), &MockRegistry::new())
        .await
        .unwrap();

    assert_eq!(
        terminal.output(),
        Some(&json!([{"order": "a", "index": 0}, {"order": "b", "index": 1}]))
    );
    // Selector pass and finalize both hit the Map node, and both count.
    assert_eq!(recorder.attempts_for("Each"), vec![0, 1]);
    assert_eq!(recorder.attempts_for("Echo"), vec![0, 1]);
}

#[tokio::test]
async fn item_selector_dispatch_consumes_retry_budget() {
    let (recorder, runner) = recording_runner(json!({
        "StartAt": "Each",
        "States": {
            "Each": {
                "Type": "Map",
                "ItemsPath": "$.orders",
                "ItemSelector": {"order.$": "$$.Map.Item.Value"},
                "ItemProcessor": {
                    "StartAt": "Charge",
                    "States": {"Charge": {"Type": "Task", "Resource": LAMBDA, "End": true}}
                },
                "Retry": [{"ErrorEquals": ["States.ALL"], "MaxAttempts": 1}],
                "End": true
            }
        }
    }));
    let mocks = MockRegistry::new().with("Charge", MockSequence::new().then_fail("Declined"));

    let terminal = runner.run(json!({"orders": ["a"]}), &mocks).await.unwrap();

    assert_eq!(terminal.error(), Some("Declined"));
    assert_eq!(recorder.attempts_for("Each"), vec![0, 1]);
    assert_eq!(recorder.attempts_for("Charge"), vec![0]);
}

#[tokio::test]
async fn jsonata_items_and_outer_variables() {
    let (_, runner) = recording_runner(json!({
        "QueryLanguage": "JSONata",
        "StartAt": "Setup",
        "States": {
            "Setup": {"Type": "Pass", "Assign": {"factor": 10}, "Next": "Scale"},
            "Scale": {
                "Type": "Map",
                "Items": "{% $states.input.values %}",
                "ItemProcessor": {
                    "StartAt": "Times",
                    "States": {"Times": {"Type": "Pass", "Output": "{% $states.input * $factor %}", "End": true}}
                },
                "End": true
            }
        }
    }));

    let terminal = runner
        .run(json!({"values": [1, 2, 3]}), &MockRegistry::new())
        .await
        .unwrap();
    assert_eq!(terminal.output(), Some(&json!([10, 20, 30])));
}

#[tokio::test]
async fn legacy_iterator_is_accepted() {
    let (_, runner) = recording_runner(json!({
        "StartAt": "Each",
        "States": {
            "Each": {
                "Type": "Map",
                "Iterator": {"StartAt": "Echo", "States": {"Echo": {"Type": "Pass", "End": true}}},
                "End": true
            }
        }
    }));

    let terminal = runner.run(json!([1, 2]), &MockRegistry::new()).await.unwrap();
    assert_eq!(terminal.output(), Some(&json!([1, 2])));
}

#[tokio::test]
async fn item_batcher_is_unsupported_before_any_dispatch() {
    let (recorder, runner) = recording_runner(json!({
        "StartAt": "Each",
        "States": {
            "Each": {
                "Type": "Map",
                "ItemsPath": "$.orders",
                "ItemBatcher": {"MaxItemsPerBatch": 10},
                "ItemProcessor": {
                    "StartAt": "Echo",
                    "States": {"Echo": {"Type": "Pass", "End": true}}
                },
                "End": true
            }
        }
    }));

    let err = runner
        .run(json!({"orders": ["a", "b"]}), &MockRegistry::new())
        .await
        .unwrap_err();

    assert!(err.is_unsupported());
    assert!(recorder.dispatched().is_empty());
}
