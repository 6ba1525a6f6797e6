//! Validate command - Check decision graph files.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use refund_engine::{DecisionGraph, EngineError, Vocabulary};
use tracing::info;

#[derive(Args)]
pub struct ValidateArgs {
    /// Graph files to validate; the bundled graphs when none are given
    files: Vec<PathBuf>,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let vocabulary = Arc::new(Vocabulary::standard());
    let mut violations = Vec::new();

    if args.files.is_empty() {
        for (name, loaded) in [
            ("bundled refund graph", DecisionGraph::standard()),
            ("bundled review graph", DecisionGraph::review()),
        ] {
            report(name, loaded, &mut violations);
        }
    }

    for path in &args.files {
        info!("Validating graph file {}", path.display());
        let loaded = DecisionGraph::from_file(path, Arc::clone(&vocabulary));
        report(&path.display().to_string(), loaded, &mut violations);
    }

    println!();
    if violations.is_empty() {
        println!("All graphs passed validation.");
        Ok(())
    } else {
        Err(EngineError::GraphIntegrity { violations }.into())
    }
}

fn report(
    name: &str,
    loaded: Result<DecisionGraph, EngineError>,
    violations: &mut Vec<String>,
) {
    match loaded {
        Ok(graph) => println!(
            "  ok    {} ('{}', {} nodes, {} terminals)",
            name,
            graph.id(),
            graph.len(),
            graph.terminal_ids().len()
        ),
        Err(EngineError::GraphIntegrity { violations: found }) => {
            println!("  FAIL  {}", name);
            for v in &found {
                println!("        - {}", v);
            }
            violations.extend(found.into_iter().map(|v| format!("{}: {}", name, v)));
        }
        Err(e) => {
            println!("  FAIL  {}: {}", name, e);
            violations.push(format!("{}: {}", name, e));
        }
    }
}
