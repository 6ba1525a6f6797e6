//! Graph command - Print a decision graph as a Mermaid flowchart.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use refund_engine::{DecisionGraph, Vocabulary};
use tracing::info;

use super::BundledGraph;

#[derive(Args)]
pub struct GraphArgs {
    /// Bundled graph to print
    #[arg(long, value_enum, default_value = "refund", conflicts_with = "file")]
    bundled: BundledGraph,

    /// YAML graph file to print instead
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn execute(args: GraphArgs) -> Result<()> {
    let graph = match &args.file {
        Some(path) => DecisionGraph::from_file(path, Arc::new(Vocabulary::standard()))
            .with_context(|| format!("Failed to load graph {}", path.display()))?,
        None => args.bundled.load()?,
    };

    let mermaid = graph.to_mermaid();
    match &args.output {
        Some(path) => {
            std::fs::write(path, &mermaid)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote Mermaid for '{}' to {}", graph.id(), path.display());
        }
        None => println!("{}", mermaid),
    }

    Ok(())
}
