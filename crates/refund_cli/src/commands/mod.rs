//! CLI command definitions.
//!
//! Each subcommand maps to one way of driving the refund engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod chat;
pub mod decide;
pub mod graph;
pub mod validate;

/// refund-bot - decision-tree refund assistant
#[derive(Parser)]
#[command(name = "refund-bot")]
#[command(version, about = "refund-bot - decision-tree refund assistant")]
#[command(long_about = r#"
refund-bot walks a refund request through a decision graph, asking only
for the facts it still needs and explaining every decision it reaches.

COMMANDS:
  chat      → Interactive conversation (status, reset, export, help, quit)
  decide    → One-shot decision from facts given on the command line
  validate  → Check decision graph files for integrity errors
  graph     → Print a decision graph as a Mermaid flowchart

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Graph integrity error
  5 - Decision error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file (defaults to ./refund-bot.toml when present)
    #[arg(short, long, global = true, env = "REFUND_BOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive refund conversation
    Chat(chat::ChatArgs),

    /// Decide a refund from known facts
    Decide(decide::DecideArgs),

    /// Validate decision graph files
    Validate(validate::ValidateArgs),

    /// Print a decision graph as Mermaid
    Graph(graph::GraphArgs),
}

/// Which bundled graph to use when no file is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BundledGraph {
    Refund,
    Review,
}

impl BundledGraph {
    pub fn load(self) -> refund_engine::EngineResult<refund_engine::DecisionGraph> {
        match self {
            BundledGraph::Refund => refund_engine::DecisionGraph::standard(),
            BundledGraph::Review => refund_engine::DecisionGraph::review(),
        }
    }
}
