use std::path::Path;
use std::process;

use stepcheck::definition::DefinitionTree;

use super::read_json;
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_validate(definition_path: &Path, output: OutputFormat, quiet: bool) {
    let document = match read_json(definition_path, "definition") {
        Ok(v) => v,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    match DefinitionTree::from_value(document) {
        Ok(tree) => {
            let states = tree.iter_states().count();
            match output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "valid": true,
                        "start_at": tree.start_at(),
                        "query_language": tree.query_language().as_str(),
                        "states": states,
                    })
                ),
                OutputFormat::Text => {
                    if !quiet {
                        println!(
                            "Valid definition: {} top-level states, starts at '{}'",
                            states,
                            tree.start_at()
                        );
                    }
                }
            }
        }
        Err(e) => {
            let msg = format!("invalid definition '{}': {}", definition_path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}
