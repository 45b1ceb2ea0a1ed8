//! Harness configuration.
//!
//! Read once when a [`crate::Runner`] is built. Values come from a TOML file
//! (all keys optional) and may be overridden from the environment.
//!
//! # Example
//!
//! ```toml
//! require_mocks_for_task_states = true
//! skip_wait_states = true
//! execution_role_arn = "arn:aws:iam::123456789012:role/test"
//! max_transitions = 500
//!
//! [evaluator]
//! endpoint = "http://localhost:8083"
//! auth_token = "local-dev"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default hop budget for one run.
pub const DEFAULT_MAX_TRANSITIONS: usize = 10_000;

pub const ENV_REQUIRE_MOCKS: &str = "STEPCHECK_REQUIRE_MOCKS";
pub const ENV_SKIP_WAIT_STATES: &str = "STEPCHECK_SKIP_WAIT_STATES";
pub const ENV_ROLE_ARN: &str = "STEPCHECK_ROLE_ARN";
pub const ENV_EVALUATOR_ENDPOINT: &str = "STEPCHECK_EVALUATOR_ENDPOINT";
pub const ENV_EVALUATOR_TOKEN: &str = "STEPCHECK_EVALUATOR_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {message}")]
    Read { path: String, message: String },
    #[error("could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Options that shape how a run is driven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Fail fast when a Task state has no mock instead of letting the
    /// evaluator invoke the real resource.
    pub require_mocks_for_task_states: bool,
    /// Pass Wait states through locally without dispatching them.
    pub skip_wait_states: bool,
    /// Role reference attached to every evaluator request.
    pub execution_role_arn: Option<String>,
    /// Hop budget per run, across all nested scopes.
    pub max_transitions: usize,
    pub evaluator: HttpEvaluatorConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            require_mocks_for_task_states: false,
            skip_wait_states: false,
            execution_role_arn: None,
            max_transitions: DEFAULT_MAX_TRANSITIONS,
            evaluator: HttpEvaluatorConfig::default(),
        }
    }
}

/// Where the HTTP evaluator sends requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpEvaluatorConfig {
    pub endpoint: Option<String>,
    pub auth_token: Option<String>,
}

impl HarnessConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `STEPCHECK_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_REQUIRE_MOCKS) {
            self.require_mocks_for_task_states = parse_flag(ENV_REQUIRE_MOCKS, &value)?;
        }
        if let Some(value) = lookup(ENV_SKIP_WAIT_STATES) {
            self.skip_wait_states = parse_flag(ENV_SKIP_WAIT_STATES, &value)?;
        }
        if let Some(value) = lookup(ENV_ROLE_ARN).filter(|v| !v.is_empty()) {
            self.execution_role_arn = Some(value);
        }
        if let Some(value) = lookup(ENV_EVALUATOR_ENDPOINT).filter(|v| !v.is_empty()) {
            self.evaluator.endpoint = Some(value);
        }
        if let Some(value) = lookup(ENV_EVALUATOR_TOKEN).filter(|v| !v.is_empty()) {
            self.evaluator.auth_token = Some(value);
        }
        Ok(self)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_toml_is_default() {
        let config = HarnessConfig::from_toml_str("").unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.max_transitions, DEFAULT_MAX_TRANSITIONS);
    }

    #[test]
    fn parses_all_keys() {
        let config = HarnessConfig::from_toml_str(
            r#"
            require_mocks_for_task_states = true
            skip_wait_states = true
            execution_role_arn = "arn:aws:iam::123456789012:role/test"
            max_transitions = 25

            [evaluator]
            endpoint = "http://localhost:8083"
            "#,
        )
        .unwrap();
        assert!(config.require_mocks_for_task_states);
        assert!(config.skip_wait_states);
        assert_eq!(
            config.execution_role_arn.as_deref(),
            Some("arn:aws:iam::123456789012:role/test")
        );
        assert_eq!(config.max_transitions, 25);
        assert_eq!(
            config.evaluator.endpoint.as_deref(),
            Some("http://localhost:8083")
        );
        assert_eq!(config.evaluator.auth_token, None);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = HarnessConfig::from_toml_str("skip_wait_states = maybe").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = [
            (ENV_REQUIRE_MOCKS, "true"),
            (ENV_SKIP_WAIT_STATES, "0"),
            (ENV_ROLE_ARN, "arn:role/env"),
            (ENV_EVALUATOR_TOKEN, "secret"),
        ]
        .into_iter()
        .collect();

        let base = HarnessConfig {
            skip_wait_states: true,
            ..HarnessConfig::default()
        };
        let config = base
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert!(config.require_mocks_for_task_states);
        assert!(!config.skip_wait_states);
        assert_eq!(config.execution_role_arn.as_deref(), Some("arn:role/env"));
        assert_eq!(config.evaluator.auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn bad_flag_is_rejected() {
        let err = HarnessConfig::default()
            .with_overrides(|key| (key == ENV_REQUIRE_MOCKS).then(|| "sometimes".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
