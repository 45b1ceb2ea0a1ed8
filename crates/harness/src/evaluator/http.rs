//! HTTP state evaluator speaking the TestState JSON protocol.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Requests are not signed: the endpoint is
//! expected to be a local emulator or a signing proxy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    Diagnostics, EvaluationRequest, EvaluationResponse, EvaluationStatus, EvaluatorError,
    StateEvaluator,
};
use crate::config::HttpEvaluatorConfig;
use crate::mock::MockEntry;

const TARGET_HEADER: &str = "AWSStepFunctions.TestState";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Evaluator that posts each request to a TestState endpoint.
///
/// - `endpoint` from config (required)
/// - `auth_token` from config, sent as a bearer token when present
pub struct HttpEvaluator {
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpEvaluator {
    pub fn new(config: &HttpEvaluatorConfig) -> Result<Self, EvaluatorError> {
        let endpoint = config
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| EvaluatorError::Transport {
                message: "no evaluator endpoint configured (set [evaluator].endpoint or STEPCHECK_EVALUATOR_ENDPOINT)".to_string(),
            })?;
        Ok(HttpEvaluator {
            endpoint,
            auth_token: config.auth_token.clone(),
        })
    }
}

#[async_trait]
impl StateEvaluator for HttpEvaluator {
    async fn evaluate(
        &self,
        request: EvaluationRequest,
    ) -> Result<EvaluationResponse, EvaluatorError> {
        let body = serde_json::to_string(&TestStateRequest::from_request(&request)?).map_err(
            |e| EvaluatorError::Rejected {
                message: format!("could not encode request: {}", e),
            },
        )?;

        let url = self.endpoint.clone();
        let auth_token = self.auth_token.clone();

        let wire: TestStateResponse = tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let mut call = agent
                .post(&url)
                .header("X-Amz-Target", TARGET_HEADER)
                .header("Content-Type", CONTENT_TYPE);

            if let Some(ref token) = auth_token {
                call = call.header("Authorization", &format!("Bearer {}", token));
            }

            let response = call.send(body).map_err(|e| match e {
                ureq::Error::StatusCode(code) => EvaluatorError::Rejected {
                    message: format!("endpoint returned HTTP {}", code),
                },
                other => EvaluatorError::Transport {
                    message: other.to_string(),
                },
            })?;

            response
                .into_body()
                .read_json::<TestStateResponse>()
                .map_err(|e| EvaluatorError::InvalidResponse {
                    message: format!("failed to parse response as JSON: {}", e),
                })
        })
        .await
        .map_err(|e| EvaluatorError::Transport {
            message: format!("task join error: {}", e),
        })??;

        wire.into_response()
    }

    fn evaluator_id(&self) -> &str {
        "http"
    }
}

// ──────────────────────────────────────────────
// Wire format
// ──────────────────────────────────────────────

/// JSON documents travel as strings on this protocol.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TestStateRequest {
    definition: String,
    state_name: String,
    input: String,
    variables: String,
    inspection_level: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mock: Option<WireMock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_configuration: Option<WireStateConfiguration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMock {
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_output: Option<WireErrorOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_validation_mode: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireErrorOutput {
    error: String,
    cause: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireStateConfiguration {
    retrier_retry_count: u32,
}

impl TestStateRequest {
    fn from_request(request: &EvaluationRequest) -> Result<Self, EvaluatorError> {
        let mock = request.mock.as_ref().map(WireMock::from_entry).transpose()?;
        let state_configuration = mock.as_ref().map(|_| WireStateConfiguration {
            retrier_retry_count: request.attempt,
        });
        Ok(TestStateRequest {
            definition: encode(&request.definition)?,
            state_name: request.state_name.clone(),
            input: encode(&request.input)?,
            variables: encode(&request.variables)?,
            inspection_level: "DEBUG",
            role_arn: request.role_arn.clone(),
            mock,
            context: request.context.as_ref().map(encode).transpose()?,
            state_configuration,
        })
    }
}

impl WireMock {
    fn from_entry(entry: &MockEntry) -> Result<Self, EvaluatorError> {
        Ok(match entry {
            MockEntry::Return {
                payload,
                validation,
            } => WireMock {
                result: Some(encode(payload)?),
                error_output: None,
                field_validation_mode: Some(validation.as_str()),
            },
            MockEntry::Fail { error, cause } => WireMock {
                result: None,
                error_output: Some(WireErrorOutput {
                    error: error.clone(),
                    cause: cause.clone(),
                }),
                field_validation_mode: None,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestStateResponse {
    status: EvaluationStatus,
    next_state: Option<String>,
    output: Option<String>,
    error: Option<String>,
    cause: Option<String>,
    #[serde(default)]
    inspection_data: WireInspectionData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInspectionData {
    after_input_path: Option<String>,
    after_parameters: Option<String>,
    after_items_path: Option<String>,
    after_item_selector: Option<String>,
    result: Option<String>,
    after_result_selector: Option<String>,
    after_result_path: Option<String>,
    variables: Option<String>,
}

impl TestStateResponse {
    fn into_response(self) -> Result<EvaluationResponse, EvaluatorError> {
        let data = self.inspection_data;
        let diagnostics = Diagnostics {
            after_input_path: data.after_input_path.as_deref().map(decode_lenient),
            after_parameters: data.after_parameters.as_deref().map(decode_lenient),
            after_items_path: data.after_items_path.as_deref().map(decode_lenient),
            after_item_selector: data.after_item_selector.as_deref().map(decode_lenient),
            result: data.result.as_deref().map(decode_lenient),
            after_result_selector: data.after_result_selector.as_deref().map(decode_lenient),
            after_result_path: data.after_result_path.as_deref().map(decode_lenient),
            variables: data.variables.as_deref().map(decode_lenient),
        };
        let output = self.output.as_deref().map(decode).transpose()?;

        Ok(EvaluationResponse {
            status: self.status,
            next_state: self.next_state.filter(|s| !s.is_empty()),
            output,
            variables: diagnostics.variables.clone(),
            error: self.error,
            cause: self.cause,
            diagnostics,
        })
    }
}

fn encode(value: &Value) -> Result<String, EvaluatorError> {
    serde_json::to_string(value).map_err(|e| EvaluatorError::Rejected {
        message: format!("could not encode JSON field: {}", e),
    })
}

fn decode(raw: &str) -> Result<Value, EvaluatorError> {
    serde_json::from_str(raw).map_err(|e| EvaluatorError::InvalidResponse {
        message: format!("output is not valid JSON: {}", e),
    })
}

/// Inspection fields are informational; keep unparseable ones as strings.
fn decode_lenient(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
