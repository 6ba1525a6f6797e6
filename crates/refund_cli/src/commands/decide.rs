//! Decide command - One-shot decision from facts on the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use refund_chat::{
    load_graph, BotConfig, JsonProfileStore, ProfileStore, QuestionRequest, TemplateQuestions,
};
use refund_engine::{ConversationSession, RawFacts, TurnOutcome};
use serde_json::Value;
use tracing::info;

use super::BundledGraph;

#[derive(Args)]
pub struct DecideArgs {
    /// Fact as key=value (repeatable), e.g. --fact item_category=Physical
    #[arg(short, long = "fact", value_name = "KEY=VALUE")]
    facts: Vec<String>,

    /// JSON object of facts, inline or @path/to/file.json
    #[arg(long = "facts-json", value_name = "JSON")]
    facts_json: Option<String>,

    /// Customer to load from the customer data file
    #[arg(long)]
    customer: Option<String>,

    /// Customer data file (overrides configuration)
    #[arg(long)]
    customer_data: Option<PathBuf>,

    /// Bundled graph to use when configuration names no graph file
    #[arg(long, value_enum, default_value = "refund")]
    bundled: BundledGraph,

    /// Print the turn result as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: DecideArgs, config_path: Option<&Path>) -> Result<()> {
    let config = BotConfig::load(config_path)?;

    let graph = match config.graph_file.as_deref() {
        Some(path) => load_graph(Some(path))?,
        None => args.bundled.load()?,
    };

    let data_file = args
        .customer_data
        .clone()
        .unwrap_or_else(|| config.customer_data_file.clone());
    let profile = JsonProfileStore::new(&data_file)
        .load(args.customer.clone())
        .await?;

    let mut facts = RawFacts::new();
    if let Some(json) = &args.facts_json {
        facts.extend(parse_facts_json(json)?);
    }
    for pair in &args.facts {
        let (key, value) = parse_fact(pair)?;
        facts.insert(key, value);
    }

    info!(
        "Deciding for {} with {} fact(s) on graph '{}'",
        profile.customer_id,
        facts.len(),
        graph.id()
    );
    let mut session = ConversationSession::with_profile(Arc::new(graph), profile)?;
    let outcome = if facts.is_empty() {
        session.current_outcome()
    } else {
        session
            .submit_facts(&facts)
            .context("Facts were rejected")?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    if let TurnOutcome::Error {
        node_id, diagnostic, ..
    } = &outcome
    {
        bail!("No decision: stuck at '{}': {}", node_id, diagnostic);
    }
    Ok(())
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::NeedInfo {
            node_id,
            fact_key,
            question,
            allowed_values,
            ..
        } => {
            let request = QuestionRequest {
                node_id: node_id.clone(),
                fact_key: fact_key.clone(),
                prompt: question.clone(),
                allowed_values: allowed_values.clone(),
            };
            println!("NEED_INFO  {} (at {})", fact_key, node_id);
            println!("  {}", TemplateQuestions::new().phrase(&request));
        }
        TurnOutcome::Decision { decision } => {
            println!("DECISION   {}", decision.label);
            for step in &decision.steps {
                println!("  - {}", step);
            }
            println!("  path: {}", decision.trail.join(" -> "));
        }
        TurnOutcome::Error {
            kind,
            node_id,
            diagnostic,
            ..
        } => {
            println!("ERROR      {} at {}: {}", kind, node_id, diagnostic);
        }
    }
}

/// `key=value`; the value is read as JSON when it parses, else as a string.
fn parse_fact(pair: &str) -> Result<(String, Value)> {
    let Some((key, value)) = pair.split_once('=') else {
        bail!("Invalid argument '{}': expected KEY=VALUE", pair);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid argument '{}': empty fact key", pair);
    }
    let value = value.trim();
    let parsed = serde_json::from_str::<Value>(value)
        .ok()
        .filter(|v| !v.is_object() && !v.is_array())
        .unwrap_or_else(|| Value::from(value));
    Ok((key.to_string(), parsed))
}

fn parse_facts_json(input: &str) -> Result<RawFacts> {
    let content = match input.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read facts file {}", path))?,
        None => input.to_string(),
    };
    serde_json::from_str(&content).context("Invalid argument: facts must be a JSON object")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_fact_values() {
        assert_eq!(
            parse_fact("item_category=Physical").unwrap(),
            ("item_category".to_string(), json!("Physical"))
        );
        assert_eq!(
            parse_fact("delivered=true").unwrap(),
            ("delivered".to_string(), json!(true))
        );
        assert_eq!(
            parse_fact("days_since_delivery = 12").unwrap(),
            ("days_since_delivery".to_string(), json!(12))
        );
        assert_eq!(
            parse_fact("item_description=a=b").unwrap(),
            ("item_description".to_string(), json!("a=b"))
        );
    }

    #[test]
    fn test_parse_fact_rejects_malformed() {
        assert!(parse_fact("delivered").is_err());
        assert!(parse_fact("=yes").is_err());
    }

    #[test]
    fn test_parse_facts_json_inline_and_file() {
        let inline = parse_facts_json(r#"{"item_category": "Digital"}"#).unwrap();
        assert_eq!(inline.get("item_category"), Some(&json!("Digital")));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        std::fs::write(&path, r#"{"delivered": "Yes"}"#).unwrap();
        let from_file = parse_facts_json(&format!("@{}", path.display())).unwrap();
        assert_eq!(from_file.get("delivered"), Some(&json!("Yes")));

        assert!(parse_facts_json("[1, 2]").is_err());
    }
}
