//! Borrowed, typed accessors over a single state object.
//!
//! The harness never deserializes a state into a struct: the evaluator owns
//! the semantics of every field. These accessors only answer the structural
//! questions the orchestration loop needs (what kind, where next, which
//! nested scopes, which Map phases are declared).

use std::fmt;

use serde_json::Value;

use crate::language::declared_language;
use crate::{DefinitionError, QueryLanguage};

/// Suffix marking a Task resource that waits for a callback token.
const TASK_TOKEN_SUFFIX: &str = ".waitForTaskToken";

// ──────────────────────────────────────────────
// StateKind
// ──────────────────────────────────────────────

/// The `Type` of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Task,
    Pass,
    Choice,
    Wait,
    Succeed,
    Fail,
    Parallel,
    Map,
}

impl StateKind {
    /// Parse the wire name of a state type.
    pub fn from_type(type_name: &str) -> Option<Self> {
        match type_name {
            "Task" => Some(StateKind::Task),
            "Pass" => Some(StateKind::Pass),
            "Choice" => Some(StateKind::Choice),
            "Wait" => Some(StateKind::Wait),
            "Succeed" => Some(StateKind::Succeed),
            "Fail" => Some(StateKind::Fail),
            "Parallel" => Some(StateKind::Parallel),
            "Map" => Some(StateKind::Map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Task => "Task",
            StateKind::Pass => "Pass",
            StateKind::Choice => "Choice",
            StateKind::Wait => "Wait",
            StateKind::Succeed => "Succeed",
            StateKind::Fail => "Fail",
            StateKind::Parallel => "Parallel",
            StateKind::Map => "Map",
        }
    }

    /// Whether the state transitions itself rather than through `Next`/`End`.
    pub fn is_self_routing(&self) -> bool {
        matches!(
            self,
            StateKind::Choice | StateKind::Succeed | StateKind::Fail
        )
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Transition
// ──────────────────────────────────────────────

/// Where a state goes after it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next(String),
    End,
}

impl Transition {
    /// The next state name, or `None` for a terminal transition.
    pub fn next_state(&self) -> Option<&str> {
        match self {
            Transition::Next(name) => Some(name),
            Transition::End => None,
        }
    }
}

// ──────────────────────────────────────────────
// StateDef
// ──────────────────────────────────────────────

/// A named state inside a definition scope.
#[derive(Debug, Clone, Copy)]
pub struct StateDef<'a> {
    name: &'a str,
    value: &'a Value,
}

impl<'a> StateDef<'a> {
    pub fn new(name: &'a str, value: &'a Value) -> Self {
        StateDef { name, value }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The raw state object.
    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn kind(&self) -> Result<StateKind, DefinitionError> {
        let type_name = self
            .value
            .get("Type")
            .and_then(Value::as_str)
            .ok_or_else(|| self.invalid("missing 'Type' field"))?;
        StateKind::from_type(type_name)
            .ok_or_else(|| self.invalid(format!("unknown state type '{}'", type_name)))
    }

    /// The language this state declares for itself, if any.
    pub fn query_language(&self) -> Result<Option<QueryLanguage>, DefinitionError> {
        declared_language(self.value)
    }

    /// Resolve `Next` / `End`.
    pub fn transition(&self) -> Result<Transition, DefinitionError> {
        if let Some(next) = self.value.get("Next") {
            return next
                .as_str()
                .map(|s| Transition::Next(s.to_string()))
                .ok_or_else(|| self.invalid("'Next' must be a string"));
        }
        if self.value.get("End").and_then(Value::as_bool) == Some(true) {
            return Ok(Transition::End);
        }
        Err(self.invalid("state must define Next or End"))
    }

    pub fn resource(&self) -> Option<&'a str> {
        self.value.get("Resource").and_then(Value::as_str)
    }

    /// A Task that pauses until an external callback redeems a token.
    pub fn requires_task_token(&self) -> bool {
        matches!(self.kind(), Ok(StateKind::Task))
            && self
                .resource()
                .is_some_and(|r| r.ends_with(TASK_TOKEN_SUFFIX))
    }

    /// Declared Parallel branches, in declaration order.
    pub fn branches(&self) -> Result<&'a [Value], DefinitionError> {
        self.value
            .get("Branches")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| self.invalid("Parallel state must define a 'Branches' array"))
    }

    /// The Map item processor (`ItemProcessor`, or the legacy `Iterator`).
    pub fn item_processor(&self) -> Result<&'a Value, DefinitionError> {
        self.value
            .get("ItemProcessor")
            .or_else(|| self.value.get("Iterator"))
            .ok_or_else(|| self.invalid("Map state must define an 'ItemProcessor' or 'Iterator'"))
    }

    /// `ProcessorConfig.Mode`, looked up on the processor first and then on
    /// the state itself.
    pub fn processor_mode(&self) -> Option<&'a str> {
        let from = |obj: &'a Value| {
            obj.get("ProcessorConfig")
                .and_then(|c| c.get("Mode"))
                .and_then(Value::as_str)
        };
        self.item_processor()
            .ok()
            .and_then(from)
            .or_else(|| from(self.value))
    }

    /// `ItemsPath` (JSONPath scopes).
    pub fn items_path(&self) -> Result<Option<&'a str>, DefinitionError> {
        match self.value.get("ItemsPath") {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.invalid("'ItemsPath' must be a string")),
        }
    }

    /// `Items` (JSONata scopes): a literal array or a `{% %}` expression.
    pub fn items_expression(&self) -> Option<&'a Value> {
        self.value.get("Items")
    }

    /// `ItemSelector`, or its legacy name `Parameters`.
    pub fn item_selector(&self) -> Option<&'a Value> {
        self.value
            .get("ItemSelector")
            .or_else(|| self.value.get("Parameters"))
    }

    pub fn has_item_reader(&self) -> bool {
        self.value.get("ItemReader").is_some()
    }

    pub fn has_item_batcher(&self) -> bool {
        self.value.get("ItemBatcher").is_some()
    }

    /// Catch targets declared on this state.
    pub fn catch_targets(&self) -> Vec<&'a str> {
        self.value
            .get("Catch")
            .and_then(Value::as_array)
            .map(|catchers| {
                catchers
                    .iter()
                    .filter_map(|c| c.get("Next").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `Choices[].Next` and `Default` targets of a Choice state.
    pub fn choice_targets(&self) -> Vec<&'a str> {
        let mut targets: Vec<&'a str> = self
            .value
            .get("Choices")
            .and_then(Value::as_array)
            .map(|rules| {
                rules
                    .iter()
                    .filter_map(|r| r.get("Next").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(default) = self.value.get("Default").and_then(Value::as_str) {
            targets.push(default);
        }
        targets
    }

    fn invalid(&self, message: impl Into<String>) -> DefinitionError {
        DefinitionError::InvalidState {
            state: self.name.to_string(),
            message: message.into(),
        }
    }
}
