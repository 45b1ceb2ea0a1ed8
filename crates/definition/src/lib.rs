//! stepcheck-definition: state machine definition documents.
//!
//! Provides the immutable [`DefinitionTree`] view used by the harness, typed
//! structural accessors over individual states ([`StateDef`]), the nested
//! scope navigator ([`resolve`]) and load-time validation ([`validate`]).
//!
//! Nothing here interprets expressions, paths or error policies; those
//! belong to the state evaluator. This crate only answers structural
//! questions: which states exist, how they chain, and which nested scopes a
//! composite state embeds.

mod error;
mod language;
pub mod navigate;
pub mod state;
mod tree;
pub mod validate;

pub use error::DefinitionError;
pub use language::QueryLanguage;
pub use navigate::{resolve, Resolved};
pub use state::{StateDef, StateKind, Transition};
pub use tree::DefinitionTree;
pub use validate::validate;
