//! Execution and state contexts.
//!
//! Both are threaded functionally: every hop produces a new value and
//! nothing is mutated in place. Cloning is cheap: the definition view, the
//! mock registry, the configuration and the attempt counters all live
//! behind `Arc`s, and the counters are copied only when one is written.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use stepcheck_definition::{DefinitionTree, QueryLanguage};

use crate::config::HarnessConfig;
use crate::mock::MockRegistry;

// ──────────────────────────────────────────────
// Attempts
// ──────────────────────────────────────────────

/// Per-state attempt counters, keyed by state name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attempts {
    counts: Arc<BTreeMap<String, u32>>,
}

impl Attempts {
    pub fn get(&self, state_name: &str) -> u32 {
        self.counts.get(state_name).copied().unwrap_or(0)
    }

    /// Bump the counter for `state_name`. Returns the new counters and the
    /// zero-based attempt index the bump accounts for.
    pub fn incremented(&self, state_name: &str) -> (Attempts, u32) {
        let attempt = self.get(state_name);
        let mut next = self.clone();
        Arc::make_mut(&mut next.counts).insert(state_name.to_string(), attempt + 1);
        (next, attempt)
    }
}

// ──────────────────────────────────────────────
// ExecutionContext
// ──────────────────────────────────────────────

/// What a run carries from hop to hop: the scope being walked, the mock
/// registry, the attempt counters and the configuration.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    tree: DefinitionTree,
    mocks: MockRegistry,
    attempts: Attempts,
    config: Arc<HarnessConfig>,
}

impl ExecutionContext {
    pub fn new(tree: DefinitionTree, mocks: MockRegistry, config: Arc<HarnessConfig>) -> Self {
        ExecutionContext {
            tree,
            mocks,
            attempts: Attempts::default(),
            config,
        }
    }

    pub fn tree(&self) -> &DefinitionTree {
        &self.tree
    }

    pub fn mocks(&self) -> &MockRegistry {
        &self.mocks
    }

    pub fn attempts(&self) -> &Attempts {
        &self.attempts
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Fork for a nested scope. Mocks and configuration are shared; the
    /// counters carry over so they keep accumulating inside the scope.
    pub fn narrow(&self, tree: DefinitionTree) -> Self {
        ExecutionContext {
            tree,
            ..self.clone()
        }
    }

    /// Take back the counters from a forked context. The fork's tree view
    /// is dropped with it.
    pub fn merge_attempts(self, branch: &ExecutionContext) -> Self {
        ExecutionContext {
            attempts: branch.attempts.clone(),
            ..self
        }
    }

    pub fn with_attempts(self, attempts: Attempts) -> Self {
        ExecutionContext { attempts, ..self }
    }
}

// ──────────────────────────────────────────────
// StateContext
// ──────────────────────────────────────────────

/// Transient parameters of a single hop.
#[derive(Debug, Clone, PartialEq)]
pub struct StateContext {
    state_name: String,
    query_language: QueryLanguage,
    input: Value,
    variables: Value,
}

impl StateContext {
    pub fn new(
        state_name: impl Into<String>,
        query_language: QueryLanguage,
        input: Value,
        variables: Value,
    ) -> Self {
        StateContext {
            state_name: state_name.into(),
            query_language,
            input,
            variables,
        }
    }

    pub fn state_name(&self) -> &str {
        &self.state_name
    }

    pub fn query_language(&self) -> QueryLanguage {
        self.query_language
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn variables(&self) -> &Value {
        &self.variables
    }

    /// The next hop inside the same scope.
    pub fn at(&self, state_name: impl Into<String>, input: Value, variables: Value) -> Self {
        StateContext {
            state_name: state_name.into(),
            query_language: self.query_language,
            input,
            variables,
        }
    }

    pub fn with_language(self, query_language: QueryLanguage) -> Self {
        StateContext {
            query_language,
            ..self
        }
    }
}
