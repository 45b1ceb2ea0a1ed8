mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Which single-state evaluator backs the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum EvaluatorKind {
    /// In-process reference evaluator
    Local,
    /// Remote TestState endpoint
    Http,
}

/// Deterministic test harness for Step Functions state machines.
#[derive(Parser)]
#[command(
    name = "stepcheck",
    version,
    about = "Deterministic test harness for Step Functions state machines"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a definition to completion against mocked task results
    Run {
        /// Path to the state machine definition (JSON)
        definition: PathBuf,
        /// Path to a JSON file holding the execution input
        #[arg(long, conflicts_with = "input_json")]
        input: Option<PathBuf>,
        /// Execution input given inline
        #[arg(long)]
        input_json: Option<String>,
        /// Path to a mock file (state name -> steps)
        #[arg(long)]
        mocks: Option<PathBuf>,
        /// Path to a harness configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Start at this state instead of StartAt; may name a nested state
        #[arg(long)]
        start_at: Option<String>,
        /// Evaluator backing the run
        #[arg(long, default_value = "local", value_enum)]
        evaluator: EvaluatorKind,
        /// TestState endpoint for the http evaluator
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Check a definition for structural errors without running it
    Validate {
        /// Path to the state machine definition (JSON)
        definition: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,stepcheck=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            definition,
            input,
            input_json,
            mocks,
            config,
            start_at,
            evaluator,
            endpoint,
        } => {
            commands::run::cmd_run(commands::run::RunArgs {
                definition: &definition,
                input: input.as_deref(),
                input_json: input_json.as_deref(),
                mocks: mocks.as_deref(),
                config: config.as_deref(),
                start_at,
                evaluator,
                endpoint,
                output: cli.output,
                quiet: cli.quiet,
            });
        }
        Commands::Validate { definition } => {
            commands::validate::cmd_validate(&definition, cli.output, cli.quiet);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
