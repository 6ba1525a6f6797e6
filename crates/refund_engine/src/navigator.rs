//! Decision graph traversal.
//!
//! The navigator owns a position in a shared [`DecisionGraph`] and the
//! trail of nodes visited so far. [`Navigator::advance`] moves eagerly:
//! it keeps following edges while the current question's fact is already
//! known, and stops only at a missing fact, a terminal node, or a node
//! where no edge matches.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{EngineError, EngineResult};
use crate::fact::{FactLookup, FactValue};
use crate::graph::{DecisionGraph, DecisionNode};
use crate::outcome::Outcome;
use crate::template;

/// Navigator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavState {
    /// Waiting for `fact_key`, asked by `node_id`.
    AwaitingFact { node_id: String, fact_key: String },
    /// Positioned on `node_id`, not yet evaluated.
    Advancing { node_id: String },
    /// A terminal node was reached.
    Terminal { decision: Box<Decision> },
    /// No edge matched at `node_id`.
    Stuck { node_id: String, reason: String },
}

impl NavState {
    pub fn name(&self) -> &'static str {
        match self {
            NavState::AwaitingFact { .. } => "AWAITING_FACT",
            NavState::Advancing { .. } => "ADVANCING",
            NavState::Terminal { .. } => "TERMINAL",
            NavState::Stuck { .. } => "STUCK",
        }
    }

    /// Terminal and stuck states end traversal until a reset.
    pub fn is_finished(&self) -> bool {
        matches!(self, NavState::Terminal { .. } | NavState::Stuck { .. })
    }
}

/// One visited node.
///
/// For question nodes that have been passed, `fact_key`, `value` and
/// `edge_label` record the answer used to leave the node, and `read_facts`
/// lists any other facts the followed edge's guard consulted. The last
/// step is the current node and carries no answer yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailStep {
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fact_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FactValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_facts: Vec<String>,
}

impl TrailStep {
    fn at(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            fact_key: None,
            value: None,
            edge_label: None,
            read_facts: Vec::new(),
        }
    }
}

/// A terminal decision with its explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: Outcome,
    pub label: String,
    pub terminal_node: String,
    /// Every step's contribution followed by the terminal reason.
    pub reason: String,
    /// Per-step explanations, root first.
    pub steps: Vec<String>,
    /// Visited node ids, root first, terminal last.
    pub trail: Vec<String>,
}

/// Traversal state for one session over a shared graph.
#[derive(Debug, Clone)]
pub struct Navigator {
    graph: Arc<DecisionGraph>,
    trail: Vec<TrailStep>,
    state: NavState,
}

impl Navigator {
    pub fn new(graph: Arc<DecisionGraph>) -> Self {
        let root = graph.root().to_string();
        Self {
            trail: vec![TrailStep::at(&root)],
            state: NavState::Advancing { node_id: root },
            graph,
        }
    }

    pub fn graph(&self) -> &Arc<DecisionGraph> {
        &self.graph
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    pub fn current_node(&self) -> &str {
        self.trail
            .last()
            .map(|s| s.node_id.as_str())
            .unwrap_or_else(|| self.graph.root())
    }

    pub fn trail(&self) -> &[TrailStep] {
        &self.trail
    }

    pub fn trail_ids(&self) -> Vec<String> {
        self.trail.iter().map(|s| s.node_id.clone()).collect()
    }

    /// Edges followed so far.
    pub fn hops(&self) -> usize {
        self.trail.len().saturating_sub(1)
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Facts used to leave nodes on the current trail.
    pub fn consumed_facts(&self) -> BTreeMap<&str, &FactValue> {
        self.trail
            .iter()
            .filter_map(|s| Some((s.fact_key.as_deref()?, s.value.as_ref()?)))
            .collect()
    }

    /// Every fact the current position depends on.
    ///
    /// Covers the facts answered at passed nodes, any other facts their
    /// guards read, and for a stuck node every fact its edges consult.
    pub fn consumed_keys(&self) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = self
            .trail
            .iter()
            .flat_map(|s| s.fact_key.iter().chain(s.read_facts.iter()))
            .cloned()
            .collect();

        if let NavState::Stuck { node_id, .. } = &self.state {
            if let Ok(node) = self.graph.node(node_id) {
                if let Some(question) = node.as_question() {
                    keys.insert(question.fact.clone());
                }
                for edge in node.edges() {
                    keys.extend(edge.when.facts().into_iter().map(str::to_string));
                }
            }
        }
        keys
    }

    /// Return to the root with an empty trail.
    pub fn restart(&mut self) {
        let root = self.graph.root().to_string();
        self.trail = vec![TrailStep::at(&root)];
        self.state = NavState::Advancing { node_id: root };
    }

    /// Follow edges until a fact is missing, a terminal is reached, or no
    /// edge matches. Finished navigators are left as they are.
    pub fn advance(&mut self, facts: &dyn FactLookup) -> EngineResult<&NavState> {
        if self.state.is_finished() {
            return Ok(&self.state);
        }

        let graph = Arc::clone(&self.graph);
        let max_hops = graph.len();

        loop {
            let node_id = self.current_node().to_string();
            let node = graph.node(&node_id)?;

            let question = match node {
                DecisionNode::Terminal(terminal) => {
                    let decision = self.compose_decision(&graph, &terminal.id, facts)?;
                    info!(
                        "Reached {} at '{}' after {} hops",
                        decision.outcome.label(),
                        terminal.id,
                        self.hops()
                    );
                    self.state = NavState::Terminal {
                        decision: Box::new(decision),
                    };
                    break;
                }
                DecisionNode::Question(question) => question,
            };

            let Some(value) = facts.lookup(&question.fact) else {
                debug!("Node '{}' awaits fact '{}'", node_id, question.fact);
                self.state = NavState::AwaitingFact {
                    node_id,
                    fact_key: question.fact.clone(),
                };
                break;
            };

            let Some(matched) = graph.evaluate_edges(node, facts) else {
                let reason = format!(
                    "No edge of '{}' matches {} = {}",
                    node_id, question.fact, value
                );
                error!("{}", reason);
                self.state = NavState::Stuck { node_id, reason };
                break;
            };

            if self.hops() >= max_hops {
                let reason = format!("Traversal exceeded {} hops at '{}'", max_hops, node_id);
                error!("{}", reason);
                self.state = NavState::Stuck { node_id, reason };
                break;
            }

            debug!(
                "Hop {} -> {} on {} = {}",
                node_id, matched.edge.to, question.fact, value
            );
            if let Some(step) = self.trail.last_mut() {
                step.fact_key = Some(question.fact.clone());
                step.value = Some(value);
                step.edge_label = matched.edge.label.clone();
                step.read_facts = matched
                    .edge
                    .when
                    .facts()
                    .into_iter()
                    .filter(|k| *k != question.fact)
                    .map(str::to_string)
                    .collect();
            }
            self.trail.push(TrailStep::at(&matched.edge.to));
            self.state = NavState::Advancing {
                node_id: matched.edge.to.clone(),
            };
        }

        Ok(&self.state)
    }

    fn compose_decision(
        &self,
        graph: &DecisionGraph,
        terminal_id: &str,
        facts: &dyn FactLookup,
    ) -> EngineResult<Decision> {
        let mut steps = Vec::with_capacity(self.trail.len());

        for step in &self.trail {
            let node = graph.node(&step.node_id)?;
            match node {
                DecisionNode::Question(question) => {
                    let answer = match (&step.edge_label, &step.value) {
                        (Some(label), Some(value)) => format!("{} ({} = {})", label, question.fact, value),
                        (None, Some(value)) => format!("{} = {}", question.fact, value),
                        _ => "unanswered".to_string(),
                    };
                    let prompt = if question.prompt.is_empty() {
                        question.id.as_str()
                    } else {
                        question.prompt.as_str()
                    };
                    steps.push(format!("{} {}", prompt, answer));
                }
                DecisionNode::Terminal(terminal) => {
                    let rendered = template::render(&terminal.reason, facts);
                    if rendered.is_empty() {
                        steps.push(terminal.outcome.label().to_string());
                    } else {
                        steps.push(format!("{}: {}", terminal.outcome.label(), rendered));
                    }
                }
            }
        }

        let DecisionNode::Terminal(terminal) = graph.node(terminal_id)? else {
            return Err(EngineError::UnknownNodeId(terminal_id.to_string()));
        };

        Ok(Decision {
            outcome: terminal.outcome,
            label: terminal.outcome.label().to_string(),
            terminal_node: terminal.id.clone(),
            reason: steps.join(" -> "),
            steps,
            trail: self.trail_ids(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::CustomerProfile;
    use crate::store::FactStore;
    use serde_json::json;

    fn navigator() -> (Navigator, FactStore) {
        let graph = Arc::new(DecisionGraph::standard().unwrap());
        let mut facts = FactStore::new(Arc::clone(graph.vocabulary()));
        facts.merge(CustomerProfile::default()).unwrap();
        (Navigator::new(graph), facts)
    }

    #[test]
    fn test_initial_state_at_root() {
        let (nav, _) = navigator();
        assert_eq!(
            nav.state(),
            &NavState::Advancing {
                node_id: "CustStatus".to_string()
            }
        );
        assert_eq!(nav.hops(), 0);
        assert_eq!(nav.trail_ids(), vec!["CustStatus"]);
    }

    #[test]
    fn test_eager_multi_hop_through_profile_facts() {
        let (mut nav, facts) = navigator();
        let state = nav.advance(&facts).unwrap().clone();

        assert_eq!(
            state,
            NavState::AwaitingFact {
                node_id: "ItemCategory".to_string(),
                fact_key: "item_category".to_string()
            }
        );
        assert_eq!(
            nav.trail_ids(),
            vec!["CustStatus", "LoyaltyTier", "FraudCheck", "ReturnHistory", "ItemCategory"]
        );
        assert_eq!(nav.hops(), 4);
    }

    #[test]
    fn test_stays_put_without_fact() {
        let (mut nav, facts) = navigator();
        nav.advance(&facts).unwrap();
        let before = nav.trail().to_vec();
        nav.advance(&facts).unwrap();
        assert_eq!(nav.trail(), before.as_slice());
    }

    #[test]
    fn test_reaches_terminal_with_composed_reason() {
        let (mut nav, mut facts) = navigator();
        facts.set("item_category", &json!("Digital")).unwrap();
        let state = nav.advance(&facts).unwrap();

        let NavState::Terminal { decision } = state else {
            panic!("expected terminal, got {:?}", state);
        };
        assert_eq!(decision.outcome, Outcome::RefundDeniedDigital);
        assert_eq!(decision.terminal_node, "RefundDenied4");
        assert_eq!(decision.trail.last().map(String::as_str), Some("RefundDenied4"));
        assert!(decision.reason.contains("What is the item category? Digital"));
        assert!(decision
            .reason
            .ends_with("Refund Denied: Digital goods not refundable: Digital goods are not refundable."));
        assert_eq!(decision.steps.len(), decision.trail.len());
    }

    #[test]
    fn test_finished_navigator_does_not_move() {
        let (mut nav, mut facts) = navigator();
        facts.set("item_category", &json!("Perishable")).unwrap();
        nav.advance(&facts).unwrap();
        assert!(nav.is_finished());

        let trail = nav.trail_ids();
        nav.advance(&facts).unwrap();
        assert_eq!(nav.trail_ids(), trail);
    }

    #[test]
    fn test_consumed_facts_and_restart() {
        let (mut nav, facts) = navigator();
        nav.advance(&facts).unwrap();

        let consumed = nav.consumed_facts();
        assert_eq!(consumed.get("loyalty_tier"), Some(&&FactValue::from("Gold")));
        assert!(!consumed.contains_key("item_category"));

        nav.restart();
        assert_eq!(nav.trail_ids(), vec!["CustStatus"]);
        assert!(nav.consumed_facts().is_empty());
        assert!(nav.consumed_keys().is_empty());
    }

    #[test]
    fn test_consumed_keys_include_facts_read_by_guards() {
        let yaml = r#"
id: combined
root: Delivered
nodes:
  - id: Delivered
    kind: question
    fact: delivered
    edges:
      - when:
          op: all
          guards:
            - { op: equals, fact: delivered, value: true }
            - { op: equals, fact: item_condition, value: damaged }
        to: Approved
      - when:
          op: any
          guards:
            - { op: equals, fact: delivered, value: false }
            - { op: one_of, fact: item_condition, values: [defective, normal] }
        to: Pending
  - id: Approved
    kind: terminal
    outcome: refund_approved
    reason: Approved.
  - id: Pending
    kind: terminal
    outcome: refund_denied_delivery_pending
    reason: Pending.
"#;
        let graph = Arc::new(
            DecisionGraph::from_yaml_str(yaml, Arc::new(crate::fact::Vocabulary::standard()))
                .unwrap(),
        );
        let mut facts = FactStore::new(Arc::clone(graph.vocabulary()));
        facts.set("delivered", &json!(true)).unwrap();
        facts.set("item_condition", &json!("damaged")).unwrap();

        let mut nav = Navigator::new(graph);
        nav.advance(&facts).unwrap();

        assert_eq!(nav.trail()[0].read_facts, vec!["item_condition"]);
        let keys = nav.consumed_keys();
        assert!(keys.contains("delivered"));
        assert!(keys.contains("item_condition"));
    }
}
