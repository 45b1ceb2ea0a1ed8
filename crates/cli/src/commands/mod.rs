pub(crate) mod run;
pub(crate) mod validate;

use std::path::Path;

/// Read and parse a JSON file, with a message fit for the terminal on error.
pub(crate) fn read_json(path: &Path, what: &str) -> Result<serde_json::Value, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading {} '{}': {}", what, path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("error parsing JSON in {} '{}': {}", what, path.display(), e))
}
