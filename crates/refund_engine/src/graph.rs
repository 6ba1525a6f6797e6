//! Decision graph definition.
//!
//! A graph is plain data: question nodes that need one fact and route on
//! guarded edges, and terminal nodes that carry an [`Outcome`]. Graphs are
//! loaded from YAML, validated once by [`crate::validate::GraphValidator`],
//! and are immutable afterwards, so one `Arc<DecisionGraph>` can be shared
//! by any number of sessions.
//!
//! # YAML layout
//!
//! ```yaml
//! id: refund
//! name: Refund Decision Tree
//! root: CustStatus
//! nodes:
//!   - id: CustStatus
//!     kind: question
//!     fact: account_status
//!     prompt: Is customer account in good standing?
//!     edges:
//!       - label: "No"
//!         when: { op: equals, fact: account_status, value: not_good_standing }
//!         to: RefundDenied1
//!       - label: "Yes"
//!         when: { op: equals, fact: account_status, value: good_standing }
//!         to: LoyaltyTier
//!   - id: RefundDenied1
//!     kind: terminal
//!     outcome: refund_denied_account_issue
//!     reason: The customer account is not in good standing.
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::fact::{FactLookup, Vocabulary};
use crate::guard::Guard;
use crate::outcome::Outcome;
use crate::validate::GraphValidator;

const REFUND_GRAPH: &str = include_str!("../graphs/refund.yaml");
const REVIEW_GRAPH: &str = include_str!("../graphs/review.yaml");

/// A guarded transition out of a question node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Answer label shown in explanations and diagrams
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub when: Guard,
    pub to: String,
}

impl Edge {
    pub fn new(when: Guard, to: impl Into<String>) -> Self {
        Self {
            label: None,
            when,
            to: to.into(),
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A node that needs one fact before it can route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionNode {
    pub id: String,
    pub fact: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// A node that ends traversal with a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalNode {
    pub id: String,
    pub outcome: Outcome,
    /// Reason template; `{fact_key}` placeholders are filled from facts.
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionNode {
    Question(QuestionNode),
    Terminal(TerminalNode),
}

impl DecisionNode {
    pub fn id(&self) -> &str {
        match self {
            DecisionNode::Question(q) => &q.id,
            DecisionNode::Terminal(t) => &t.id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DecisionNode::Terminal(_))
    }

    pub fn as_question(&self) -> Option<&QuestionNode> {
        match self {
            DecisionNode::Question(q) => Some(q),
            DecisionNode::Terminal(_) => None,
        }
    }

    /// Outgoing edges; empty for terminals.
    pub fn edges(&self) -> &[Edge] {
        match self {
            DecisionNode::Question(q) => &q.edges,
            DecisionNode::Terminal(_) => &[],
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            DecisionNode::Question(_) => "question",
            DecisionNode::Terminal(_) => "terminal",
        }
    }
}

/// Serialized form of a graph, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub root: String,
    pub nodes: Vec<DecisionNode>,
}

/// The edge selected by [`DecisionGraph::evaluate_edges`].
#[derive(Debug, Clone, Copy)]
pub struct EdgeMatch<'a> {
    /// Position of the edge in declaration order
    pub index: usize,
    pub edge: &'a Edge,
}

/// A validated, immutable decision graph.
#[derive(Debug, Clone)]
pub struct DecisionGraph {
    id: String,
    name: String,
    description: String,
    root: String,
    nodes: Vec<DecisionNode>,
    index: HashMap<String, usize>,
    vocabulary: Arc<Vocabulary>,
}

impl DecisionGraph {
    /// Validate a definition and build the graph.
    ///
    /// Fails with `GraphIntegrity` listing every violation found. Guard
    /// literals are rewritten to their canonical spelling.
    pub fn new(mut definition: GraphDefinition, vocabulary: Arc<Vocabulary>) -> EngineResult<Self> {
        let report = GraphValidator::new(&vocabulary).validate(&mut definition);
        for warning in &report.warnings {
            warn!("Graph '{}': {}", definition.id, warning);
        }
        if !report.is_valid() {
            return Err(EngineError::GraphIntegrity {
                violations: report.errors,
            });
        }

        let index = definition
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id().to_string(), i))
            .collect();

        info!(
            "Loaded decision graph '{}' ({} nodes, root {})",
            definition.id,
            definition.nodes.len(),
            definition.root
        );

        Ok(Self {
            id: definition.id,
            name: definition.name,
            description: definition.description,
            root: definition.root,
            nodes: definition.nodes,
            index,
            vocabulary,
        })
    }

    pub fn from_yaml_str(yaml: &str, vocabulary: Arc<Vocabulary>) -> EngineResult<Self> {
        let definition: GraphDefinition = serde_yaml::from_str(yaml)?;
        Self::new(definition, vocabulary)
    }

    pub fn from_file(path: &Path, vocabulary: Arc<Vocabulary>) -> EngineResult<Self> {
        debug!("Reading decision graph from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content, vocabulary)
    }

    /// The bundled refund graph over the standard vocabulary.
    pub fn standard() -> EngineResult<Self> {
        Self::from_yaml_str(REFUND_GRAPH, Arc::new(Vocabulary::standard()))
    }

    /// The bundled manual-review follow-up graph.
    pub fn review() -> EngineResult<Self> {
        Self::from_yaml_str(REVIEW_GRAPH, Arc::new(Vocabulary::standard()))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocabulary
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[DecisionNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> EngineResult<&DecisionNode> {
        self.index
            .get(id)
            .map(|&i| &self.nodes[i])
            .ok_or_else(|| EngineError::UnknownNodeId(id.to_string()))
    }

    /// First edge of `node`, in declared order, whose guard holds.
    ///
    /// Returns `None` when nothing matches and for terminal nodes.
    pub fn evaluate_edges<'a>(
        &self,
        node: &'a DecisionNode,
        facts: &dyn FactLookup,
    ) -> Option<EdgeMatch<'a>> {
        node.edges()
            .iter()
            .enumerate()
            .find(|(_, edge)| edge.when.evaluate(facts))
            .map(|(index, edge)| EdgeMatch { index, edge })
    }

    /// Ids of every terminal node.
    pub fn terminal_ids(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.is_terminal())
            .map(|n| n.id())
            .collect()
    }

    /// Distinct outcomes reachable in this graph.
    pub fn outcomes(&self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        for node in &self.nodes {
            if let DecisionNode::Terminal(t) = node {
                if !outcomes.contains(&t.outcome) {
                    outcomes.push(t.outcome);
                }
            }
        }
        outcomes
    }

    /// Render the graph as a Mermaid flowchart.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        out.push_str("  Start([Start])\n");
        out.push_str(&format!("  Start --> {}\n", self.root));

        for node in &self.nodes {
            match node {
                DecisionNode::Question(q) => {
                    let text = if q.prompt.is_empty() { &q.fact } else { &q.prompt };
                    out.push_str(&format!("  {}{{{}}}\n", q.id, mermaid_text(text)));
                    for edge in &q.edges {
                        match &edge.label {
                            Some(label) => out.push_str(&format!(
                                "  {} -- {} --> {}\n",
                                q.id,
                                mermaid_text(label),
                                edge.to
                            )),
                            None => out.push_str(&format!("  {} --> {}\n", q.id, edge.to)),
                        }
                    }
                }
                DecisionNode::Terminal(t) => {
                    out.push_str(&format!("  {}([{}])\n", t.id, mermaid_text(t.outcome.label())));
                }
            }
        }

        out
    }
}

fn mermaid_text(text: &str) -> String {
    text.replace(['{', '}', '[', ']', '(', ')'], " ").trim().to_string()
}
