use std::path::Path;
use std::process;
use std::sync::Arc;

use serde_json::Value;
use stepcheck::evaluator::http::HttpEvaluator;
use stepcheck::evaluator::local::LocalEvaluator;
use stepcheck::{
    CancellationToken, DefinitionTree, HarnessConfig, HarnessError, MockRegistry, RunOptions, Runner,
    StateEvaluator, Terminal,
};
use tracing::{debug, warn};

use super::read_json;
use crate::{report_error, EvaluatorKind, OutputFormat};

/// The run ended in a workflow failure.
const EXIT_FAILED: i32 = 1;
/// The harness could not drive the run at all.
const EXIT_FAULT: i32 = 2;

pub(crate) struct RunArgs<'a> {
    pub definition: &'a Path,
    pub input: Option<&'a Path>,
    pub input_json: Option<&'a str>,
    pub mocks: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub start_at: Option<String>,
    pub evaluator: EvaluatorKind,
    pub endpoint: Option<String>,
    pub output: OutputFormat,
    pub quiet: bool,
}

pub(crate) fn cmd_run(args: RunArgs<'_>) {
    let output = args.output;
    let quiet = args.quiet;

    let definition = match std::fs::read_to_string(args.definition) {
        Ok(s) => s,
        Err(e) => fault(
            &format!("error reading definition '{}': {}", args.definition.display(), e),
            output,
            quiet,
        ),
    };
    let tree = match DefinitionTree::parse(&definition).map_err(HarnessError::from) {
        Ok(tree) => tree,
        Err(e) => {
            let label = if e.is_unsupported() { "unsupported" } else { "invalid definition" };
            fault(
                &format!("{} '{}': {}", label, args.definition.display(), e),
                output,
                quiet,
            )
        }
    };

    let config = match args.config {
        Some(path) => HarnessConfig::from_file(path),
        None => Ok(HarnessConfig::default()),
    }
    .and_then(HarnessConfig::with_env_overrides);
    let mut config = match config {
        Ok(config) => config,
        Err(e) => fault(&format!("error loading configuration: {}", e), output, quiet),
    };
    if let Some(endpoint) = args.endpoint {
        config.evaluator.endpoint = Some(endpoint);
    }

    let input = match (args.input, args.input_json) {
        (Some(path), _) => read_json(path, "input").unwrap_or_else(|msg| fault(&msg, output, quiet)),
        (None, Some(inline)) => serde_json::from_str(inline)
            .unwrap_or_else(|e| fault(&format!("error parsing --input-json: {}", e), output, quiet)),
        (None, None) => Value::Object(Default::default()),
    };

    let mocks = match args.mocks {
        Some(path) => {
            let document = read_json(path, "mocks").unwrap_or_else(|msg| fault(&msg, output, quiet));
            MockRegistry::from_json(&document).unwrap_or_else(|e| {
                fault(&format!("invalid mocks '{}': {}", path.display(), e), output, quiet)
            })
        }
        None => MockRegistry::new(),
    };

    let evaluator: Arc<dyn StateEvaluator> = match args.evaluator {
        EvaluatorKind::Local => Arc::new(LocalEvaluator::new()),
        EvaluatorKind::Http => match HttpEvaluator::new(&config.evaluator) {
            Ok(evaluator) => Arc::new(evaluator),
            Err(e) => fault(&format!("error: {}", e), output, quiet),
        },
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => fault(&format!("failed to create tokio runtime: {}", e), output, quiet),
    };

    debug!(
        evaluator = evaluator.evaluator_id(),
        definition = %args.definition.display(),
        "starting run"
    );
    let runner = Runner::new(evaluator, tree, config);
    let options = RunOptions {
        start_at: args.start_at,
        ..RunOptions::default()
    };

    let result = rt.block_on(async {
        let token = CancellationToken::new();
        let on_interrupt = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling run");
                on_interrupt.cancel();
            }
        });
        runner
            .run_with(input, &mocks, options.with_cancellation(token))
            .await
    });

    let terminal = match result {
        Ok(terminal) => terminal,
        Err(e) if e.is_unsupported() => fault(&format!("unsupported: {}", e), output, quiet),
        Err(e) => fault(&format!("error: {}", e), output, quiet),
    };

    print_terminal(&terminal, output, quiet);
    if !terminal.is_success() {
        process::exit(EXIT_FAILED);
    }
}

fn print_terminal(terminal: &Terminal, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let pretty = serde_json::to_string_pretty(terminal)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization error: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => match terminal {
            Terminal::Succeeded { output: result, .. } => {
                if !quiet {
                    println!("SUCCEEDED");
                }
                let pretty = serde_json::to_string_pretty(result)
                    .unwrap_or_else(|e| format!("serialization error: {}", e));
                println!("{}", pretty);
            }
            Terminal::Failed { error, cause } => {
                println!("FAILED: {}", error);
                if !cause.is_empty() && !quiet {
                    println!("cause: {}", cause);
                }
            }
        },
    }
}

fn fault(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(msg, output, quiet);
    process::exit(EXIT_FAULT);
}
