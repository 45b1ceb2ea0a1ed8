//! Mock providers: deterministic, per-attempt canned results for a state.
//!
//! A [`MockProvider`] is asked for the entry matching a zero-based attempt
//! index. Attempt indices come from the execution context's attempt
//! counters, so a provider shared by several iterations of a Map (or by a
//! state that is retried) hands out its entries in dispatch order.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ──────────────────────────────────────────────
// Entries
// ──────────────────────────────────────────────

/// How strictly the evaluator checks a mocked payload against the service
/// response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldValidationMode {
    Strict,
    Present,
    #[default]
    None,
}

impl FieldValidationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldValidationMode::Strict => "STRICT",
            FieldValidationMode::Present => "PRESENT",
            FieldValidationMode::None => "NONE",
        }
    }
}

/// One canned outcome for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEntry {
    /// The state's task returns `payload`.
    Return {
        payload: Value,
        validation: FieldValidationMode,
    },
    /// The state's task fails with `error` / `cause`.
    Fail { error: String, cause: String },
}

impl MockEntry {
    pub fn returning(payload: Value) -> Self {
        MockEntry::Return {
            payload,
            validation: FieldValidationMode::None,
        }
    }

    /// A failure; the cause defaults to the error code.
    pub fn fail(error: impl Into<String>, cause: Option<String>) -> Self {
        let error = error.into();
        let cause = cause.unwrap_or_else(|| error.clone());
        MockEntry::Fail { error, cause }
    }

    fn check(&self) -> Result<(), MockError> {
        match self {
            MockEntry::Fail { error, .. } if error.trim().is_empty() => {
                Err(MockError::InvalidEntry {
                    message: "mock error code cannot be empty".to_string(),
                })
            }
            MockEntry::Return { .. } | MockEntry::Fail { .. } => Ok(()),
        }
    }
}

/// What a sequence does once every configured entry has been served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailPolicy {
    /// Keep serving the last entry.
    #[default]
    RepeatLast,
    /// Fail the run with [`MockError::Exhausted`].
    SignalExhaustion,
}

/// Errors from mock providers. These are harness faults, never workflow
/// failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MockError {
    #[error("mock sequence is empty")]
    Empty,
    #[error("mock sequence exhausted: {served} entries configured, attempt {attempt} requested")]
    Exhausted { served: usize, attempt: u32 },
    #[error("invalid mock entry: {message}")]
    InvalidEntry { message: String },
}

// ──────────────────────────────────────────────
// MockProvider
// ──────────────────────────────────────────────

/// Supplies the canned entry for a given attempt of one state.
pub trait MockProvider: Send + Sync {
    fn entry(&self, attempt: u32) -> Result<MockEntry, MockError>;
}

impl<F> MockProvider for F
where
    F: Fn(u32) -> Result<MockEntry, MockError> + Send + Sync,
{
    fn entry(&self, attempt: u32) -> Result<MockEntry, MockError> {
        self(attempt)
    }
}

/// An ordered list of entries with a tail policy.
///
/// ```
/// use serde_json::json;
/// use stepcheck::mock::MockSequence;
///
/// let fetch = MockSequence::new()
///     .then_fail("RetryableError")
///     .then_return(json!({"value": "ok"}));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSequence {
    steps: Vec<MockEntry>,
    tail: TailPolicy,
}

impl MockSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tail(mut self, tail: TailPolicy) -> Self {
        self.tail = tail;
        self
    }

    pub fn then_return(self, payload: Value) -> Self {
        self.then(MockEntry::returning(payload))
    }

    pub fn then_return_with(self, payload: Value, validation: FieldValidationMode) -> Self {
        self.then(MockEntry::Return {
            payload,
            validation,
        })
    }

    pub fn then_fail(self, error: impl Into<String>) -> Self {
        self.then(MockEntry::fail(error, None))
    }

    pub fn then_fail_with_cause(self, error: impl Into<String>, cause: impl Into<String>) -> Self {
        self.then(MockEntry::fail(error, Some(cause.into())))
    }

    pub fn then(mut self, entry: MockEntry) -> Self {
        self.steps.push(entry);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl MockProvider for MockSequence {
    fn entry(&self, attempt: u32) -> Result<MockEntry, MockError> {
        let entry = match self.steps.get(attempt as usize) {
            Some(entry) => entry,
            None => match (self.tail, self.steps.last()) {
                (_, None) => return Err(MockError::Empty),
                (TailPolicy::RepeatLast, Some(last)) => last,
                (TailPolicy::SignalExhaustion, Some(_)) => {
                    return Err(MockError::Exhausted {
                        served: self.steps.len(),
                        attempt,
                    })
                }
            },
        };
        entry.check()?;
        Ok(entry.clone())
    }
}

// ──────────────────────────────────────────────
// MockRegistry
// ──────────────────────────────────────────────

/// State name → mock provider.
///
/// Cloning a registry shares the providers by reference; narrowed execution
/// contexts for branches and iterations all see the same registry.
#[derive(Clone, Default)]
pub struct MockRegistry {
    providers: Arc<HashMap<String, Arc<dyn MockProvider>>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with(mut self, state_name: impl Into<String>, provider: impl MockProvider + 'static) -> Self {
        self.insert(state_name, provider);
        self
    }

    pub fn insert(&mut self, state_name: impl Into<String>, provider: impl MockProvider + 'static) {
        Arc::make_mut(&mut self.providers).insert(state_name.into(), Arc::new(provider));
    }

    pub fn get(&self, state_name: &str) -> Option<&dyn MockProvider> {
        self.providers.get(state_name).map(|p| p.as_ref())
    }

    pub fn contains(&self, state_name: &str) -> bool {
        self.providers.contains_key(state_name)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Load a registry from a mock file.
    ///
    /// ```json
    /// {
    ///   "FetchB": {
    ///     "tail": "signal_exhaustion",
    ///     "steps": [
    ///       {"fail": {"error": "RetryableError"}},
    ///       {"return": {"value": "b"}, "validation": "NONE"}
    ///     ]
    ///   }
    /// }
    /// ```
    pub fn from_json(value: &Value) -> Result<Self, MockError> {
        let file: BTreeMap<String, MockFileEntry> = serde_json::from_value(value.clone())
            .map_err(|e| MockError::InvalidEntry {
                message: format!("invalid mock file: {}", e),
            })?;

        let mut registry = MockRegistry::new();
        for (state_name, entry) in file {
            let sequence = entry.steps.into_iter().fold(
                MockSequence::new().with_tail(entry.tail),
                |sequence, step| sequence.then(step.into()),
            );
            registry.insert(state_name, sequence);
        }
        Ok(registry)
    }
}

impl fmt::Debug for MockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("MockRegistry").field("states", &names).finish()
    }
}

#[derive(Deserialize)]
struct MockFileEntry {
    #[serde(default)]
    tail: TailPolicy,
    steps: Vec<MockFileStep>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MockFileStep {
    Return {
        #[serde(rename = "return")]
        payload: Value,
        #[serde(default)]
        validation: FieldValidationMode,
    },
    Fail {
        fail: MockFileFailure,
    },
}

#[derive(Deserialize)]
struct MockFileFailure {
    error: String,
    cause: Option<String>,
}

impl From<MockFileStep> for MockEntry {
    fn from(step: MockFileStep) -> Self {
        match step {
            MockFileStep::Return {
                payload,
                validation,
            } => MockEntry::Return {
                payload,
                validation,
            },
            MockFileStep::Fail { fail } => MockEntry::fail(fail.error, fail.cause),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
