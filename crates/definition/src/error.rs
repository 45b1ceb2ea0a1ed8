/// Errors raised while loading, validating or navigating a definition.
///
/// Every variant is a configuration fault: it means the harness cannot
/// simulate the document, never that the workflow failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// The document is not valid JSON.
    #[error("invalid definition JSON: {message}")]
    InvalidJson { message: String },

    /// A scope (the whole machine, a branch, an item processor) is missing a required field.
    #[error("{scope} is missing required field '{field}'")]
    MissingField { scope: String, field: String },

    /// A state object is structurally invalid.
    #[error("state '{state}': {message}")]
    InvalidState { state: String, message: String },

    /// No state with this name is reachable from the tree.
    #[error("state '{state}' was not found in the definition")]
    StateNotFound { state: String },

    /// A `Next`, `Default` or Catch target names a state outside its scope.
    #[error("state '{state}' transitions to unknown state '{target}'")]
    UnknownTransition { state: String, target: String },

    /// The same state name is declared in more than one place.
    ///
    /// Attempt counters and mocks key on bare state names, so names must be
    /// unique across every reachable scope.
    #[error("state name '{state}' is declared more than once")]
    DuplicateStateName { state: String },

    /// The `QueryLanguage` field names a language the harness cannot drive.
    #[error("unsupported query language '{language}'")]
    UnsupportedQueryLanguage { language: String },
}
