//! Shared fixtures for the harness integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use stepcheck::evaluator::local::LocalEvaluator;
use stepcheck::{
    EvaluationRequest, EvaluationResponse, EvaluatorError, HarnessConfig, Runner, StateEvaluator,
};

/// Wraps the local evaluator and remembers every request it served.
#[derive(Default)]
pub struct RecordingEvaluator {
    inner: LocalEvaluator,
    requests: Mutex<Vec<EvaluationRequest>>,
}

impl RecordingEvaluator {
    pub fn requests(&self) -> Vec<EvaluationRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Attempt indices sent for `state`, in dispatch order.
    pub fn attempts_for(&self, state: &str) -> Vec<u32> {
        self.requests()
            .into_iter()
            .filter(|r| r.state_name == state)
            .map(|r| r.attempt)
            .collect()
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.state_name).collect()
    }
}

#[async_trait]
impl StateEvaluator for RecordingEvaluator {
    async fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResponse, EvaluatorError> {
        self.requests.lock().unwrap().push(request.clone());
        self.inner.evaluate(request).await
    }

    fn evaluator_id(&self) -> &str {
        "recording"
    }
}

/// Never answers.
pub struct StalledEvaluator;

#[async_trait]
impl StateEvaluator for StalledEvaluator {
    async fn evaluate(&self, _request: EvaluationRequest) -> Result<EvaluationResponse, EvaluatorError> {
        std::future::pending().await
    }

    fn evaluator_id(&self) -> &str {
        "stalled"
    }
}

pub fn recording_runner(definition: Value) -> (Arc<RecordingEvaluator>, Runner) {
    recording_runner_with(definition, HarnessConfig::default())
}

pub fn recording_runner_with(
    definition: Value,
    config: HarnessConfig,
) -> (Arc<RecordingEvaluator>, Runner) {
    let evaluator = Arc::new(RecordingEvaluator::default());
    let runner = Runner::from_json(evaluator.clone(), &definition.to_string(), config).unwrap();
    (evaluator, runner)
}

pub const LAMBDA: &str = "arn:aws:states:::lambda:invoke";
