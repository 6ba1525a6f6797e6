//! refund-bot CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure (rejected fact, bad configuration)
//! - 4: Graph integrity error
//! - 5: Decision error (no edge matched)

use std::process::ExitCode;

use clap::Parser;
use refund_chat::ChatError;
use refund_engine::EngineError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const GRAPH_INTEGRITY: u8 = 4;
    pub const DECISION_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "refund=debug"
    } else if cli.quiet {
        "refund=warn"
    } else {
        "refund=info"
    };
    let mut filter = EnvFilter::from_default_env();
    for directive in [level, "warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    let log_result = tracing_subscriber::registry()
        .with(cli.json_logs.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!cli.json_logs).then(|| {
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
        }))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let config_path = cli.config.clone();
    let result = match cli.command {
        Commands::Chat(args) => commands::chat::execute(args, config_path.as_deref()).await,
        Commands::Decide(args) => commands::decide::execute(args, config_path.as_deref()).await,
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Graph(args) => commands::graph::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let engine = e.downcast_ref::<EngineError>().or_else(|| {
        e.downcast_ref::<ChatError>().and_then(|c| match c {
            ChatError::Engine(inner) => Some(inner),
            _ => None,
        })
    });

    if let Some(engine) = engine {
        return match engine {
            EngineError::GraphIntegrity { .. } | EngineError::Yaml(_) => ExitCodes::GRAPH_INTEGRITY,
            EngineError::UnknownFactKey(_)
            | EngineError::InvalidFactValue { .. }
            | EngineError::ProfileFieldReadOnly(_) => ExitCodes::VALIDATION_FAILURE,
            EngineError::TraversalFinished(_) => ExitCodes::DECISION_ERROR,
            _ => ExitCodes::GENERAL_ERROR,
        };
    }

    if let Some(ChatError::Config(_)) = e.downcast_ref::<ChatError>() {
        return ExitCodes::VALIDATION_FAILURE;
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("no decision") || msg.contains("stuck") {
        ExitCodes::DECISION_ERROR
    } else if msg.contains("validation") {
        ExitCodes::VALIDATION_FAILURE
    } else if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
