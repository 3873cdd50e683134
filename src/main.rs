//! Text pipeline CLI
//!
//! Chains the named stages, feeds them lines from standard input until the end marker, then
//! shuts the pipeline down in order.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::io;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use text_pipeline::{feed_lines, PipelineConfig, PipelineError, StageRegistry, DEFAULT_END_MARKER};

const STAGE_HELP: &str = "\
Available stages:
  logger        - Logs all strings that pass through
  typewriter    - Simulates typewriter effect with delays
  uppercaser    - Converts strings to uppercase
  rotator       - Move every character to the right. Last character moves to the beginning.
  flipper       - Reverses the order of the characters
  expander      - Expands each character with spaces

Example:
  echo 'hello' | analyzer 20 uppercaser rotator logger
  printf 'hello\\n<END>\\n' | analyzer 20 uppercaser rotator logger";

#[derive(Parser)]
#[command(name = "analyzer", version)]
#[command(about = "Run text through a chain of processing stages", long_about = None)]
#[command(after_help = STAGE_HELP)]
struct Cli {
    /// Maximum number of items in each stage's queue
    queue_size: usize,

    /// Stages to chain, in data-flow order
    #[arg(required = true)]
    stages: Vec<String>,

    /// Input line that ends the stream
    #[arg(long, default_value = DEFAULT_END_MARKER)]
    end_marker: String,

    /// Pause between characters for the typewriter stage
    #[arg(long, default_value_t = 100)]
    typewriter_delay_ms: u64,
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout belongs to the stages
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            if is_configuration_error(&e) {
                let _ = Cli::command().print_help();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let registry =
        StageRegistry::with_typewriter_delay(Duration::from_millis(cli.typewriter_delay_ms));
    let config =
        PipelineConfig::new(cli.queue_size, cli.stages).with_end_marker(cli.end_marker);

    let pipeline = config
        .build(&registry)
        .context("failed to build pipeline")?;

    let fed = feed_lines(&pipeline, io::stdin().lock(), &config.end_marker);
    // Shut down even when feeding failed, so buffered records still drain
    let shutdown = pipeline.shutdown();
    println!("Pipeline shutdown complete");

    let fed = fed.context("failed to feed input")?;
    shutdown.context("pipeline shutdown reported errors")?;
    tracing::info!(records = fed, "run complete");
    Ok(())
}

fn is_configuration_error(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<PipelineError>(),
        Some(
            PipelineError::Config(_)
                | PipelineError::NoStages
                | PipelineError::UnknownStage(_)
                | PipelineError::Allocation { .. }
                | PipelineError::ThreadStart { .. }
        )
    )
}
