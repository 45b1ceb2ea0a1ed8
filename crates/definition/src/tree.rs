//! Immutable views over a definition scope.
//!
//! A [`DefinitionTree`] is either the whole machine or one nested scope (a
//! Parallel branch, a Map item processor). Each view owns a normalized copy of
//! its scope document behind an `Arc`, so forking a view for a sub-execution
//! is a pointer copy and the view is released with its owning context.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::language::declared_language;
use crate::state::StateDef;
use crate::validate::validate;
use crate::{DefinitionError, QueryLanguage};

/// One scope of a state machine definition.
#[derive(Debug, Clone)]
pub struct DefinitionTree {
    document: Arc<Value>,
    language: QueryLanguage,
}

impl DefinitionTree {
    /// Parse and validate a whole definition.
    pub fn parse(definition: &str) -> Result<Self, DefinitionError> {
        let value: Value =
            serde_json::from_str(definition).map_err(|e| DefinitionError::InvalidJson {
                message: e.to_string(),
            })?;
        Self::from_value(value)
    }

    /// Validate a whole definition that is already parsed.
    pub fn from_value(value: Value) -> Result<Self, DefinitionError> {
        validate(&value)?;
        Self::scope(&value, QueryLanguage::default())
    }

    /// Build a view over a nested scope.
    ///
    /// `inherited` is the language of the enclosing state; the scope's own
    /// `QueryLanguage` takes precedence over it.
    pub fn scope(scope: &Value, inherited: QueryLanguage) -> Result<Self, DefinitionError> {
        let language = declared_language(scope)?.unwrap_or(inherited);

        let start_at = scope
            .get("StartAt")
            .and_then(Value::as_str)
            .ok_or_else(|| DefinitionError::MissingField {
                scope: "definition".to_string(),
                field: "StartAt".to_string(),
            })?;
        let states = scope
            .get("States")
            .filter(|s| s.is_object())
            .ok_or_else(|| DefinitionError::MissingField {
                scope: "definition".to_string(),
                field: "States".to_string(),
            })?;

        let mut document = Map::new();
        document.insert("StartAt".to_string(), Value::String(start_at.to_string()));
        document.insert(
            "QueryLanguage".to_string(),
            Value::String(language.as_str().to_string()),
        );
        document.insert("States".to_string(), states.clone());

        Ok(DefinitionTree {
            document: Arc::new(Value::Object(document)),
            language,
        })
    }

    /// The normalized scope document: `StartAt`, effective `QueryLanguage`
    /// and `States`. This is what gets sent to the evaluator.
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn start_at(&self) -> &str {
        self.document
            .get("StartAt")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// The effective language of this scope.
    pub fn query_language(&self) -> QueryLanguage {
        self.language
    }

    /// Direct lookup in this scope only.
    pub fn state(&self, name: &str) -> Option<StateDef<'_>> {
        self.states()?
            .iter()
            .find(|(key, _)| key.as_str() == name)
            .map(|(key, value)| StateDef::new(key, value))
    }

    /// Direct lookup that fails with [`DefinitionError::StateNotFound`].
    pub fn require_state(&self, name: &str) -> Result<StateDef<'_>, DefinitionError> {
        self.state(name).ok_or_else(|| DefinitionError::StateNotFound {
            state: name.to_string(),
        })
    }

    /// States of this scope in declaration order.
    pub fn iter_states(&self) -> impl Iterator<Item = StateDef<'_>> {
        self.states()
            .into_iter()
            .flatten()
            .map(|(name, value)| StateDef::new(name, value))
    }

    /// Effective language of a state in this scope.
    pub fn language_of(&self, state: &StateDef<'_>) -> Result<QueryLanguage, DefinitionError> {
        Ok(state.query_language()?.unwrap_or(self.language))
    }

    fn states(&self) -> Option<&Map<String, Value>> {
        self.document.get("States").and_then(Value::as_object)
    }
}
