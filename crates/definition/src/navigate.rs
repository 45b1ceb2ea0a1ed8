//! State graph navigation across nested scopes.

use crate::state::StateKind;
use crate::{DefinitionError, DefinitionTree};

/// A state located by [`resolve`], together with the scope that declares it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub scope: DefinitionTree,
    pub state_name: String,
}

/// Resolve a state name to the scope that declares it.
///
/// Looks in `tree` directly first. Failing that, searches depth-first into
/// every Parallel branch and every Map item processor, in declaration order,
/// and returns the first match. Names are expected to be unique across the
/// reachable tree (enforced by [`crate::validate`]); if they are not, the
/// first depth-first match wins.
pub fn resolve(tree: &DefinitionTree, name: &str) -> Result<Resolved, DefinitionError> {
    search(tree, name)?.ok_or_else(|| DefinitionError::StateNotFound {
        state: name.to_string(),
    })
}

fn search(tree: &DefinitionTree, name: &str) -> Result<Option<Resolved>, DefinitionError> {
    if tree.state(name).is_some() {
        return Ok(Some(Resolved {
            scope: tree.clone(),
            state_name: name.to_string(),
        }));
    }

    for state in tree.iter_states() {
        let language = tree.language_of(&state)?;
        match state.kind()? {
            StateKind::Parallel => {
                for branch in state.branches()? {
                    let scope = DefinitionTree::scope(branch, language)?;
                    if let Some(found) = search(&scope, name)? {
                        return Ok(Some(found));
                    }
                }
            }
            StateKind::Map => {
                let scope = DefinitionTree::scope(state.item_processor()?, language)?;
                if let Some(found) = search(&scope, name)? {
                    return Ok(Some(found));
                }
            }
            StateKind::Task
            | StateKind::Pass
            | StateKind::Choice
            | StateKind::Wait
            | StateKind::Succeed
            | StateKind::Fail => {}
        }
    }

    Ok(None)
}
