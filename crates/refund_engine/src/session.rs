//! Conversation session: turn orchestration over one fact store and one
//! navigator.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditRecord, TrailEntry};
use crate::error::{EngineError, EngineResult};
use crate::fact::{FactDomain, FactValue};
use crate::graph::{DecisionGraph, DecisionNode};
use crate::navigator::{Decision, NavState, Navigator};
use crate::profile::CustomerProfile;
use crate::store::{FactStore, SetOutcome};

/// Raw extraction output: fact key to JSON value.
pub type RawFacts = BTreeMap<String, Value>;

/// Result of one `submit_facts` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnOutcome {
    /// A fact is missing; `question` is the node's prompt.
    NeedInfo {
        node_id: String,
        fact_key: String,
        question: String,
        domain: FactDomain,
        allowed_values: Vec<String>,
    },
    Decision {
        #[serde(flatten)]
        decision: Decision,
    },
    Error {
        kind: String,
        node_id: String,
        diagnostic: String,
        facts: BTreeMap<String, FactValue>,
    },
}

impl TurnOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            TurnOutcome::NeedInfo { .. } => "NEED_INFO",
            TurnOutcome::Decision { .. } => "DECISION",
            TurnOutcome::Error { .. } => "ERROR",
        }
    }

    pub fn missing_fact(&self) -> Option<&str> {
        match self {
            TurnOutcome::NeedInfo { fact_key, .. } => Some(fact_key),
            _ => None,
        }
    }

    pub fn decision(&self) -> Option<&Decision> {
        match self {
            TurnOutcome::Decision { decision } => Some(decision),
            _ => None,
        }
    }
}

/// Snapshot of a session for status displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub customer_id: Option<String>,
    pub turns: u32,
    pub state: String,
    pub current_node: String,
    pub hops: usize,
    pub facts: BTreeMap<String, FactValue>,
}

/// One refund conversation.
///
/// Owns its fact store and navigator exclusively; the graph is shared.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: Uuid,
    facts: FactStore,
    navigator: Navigator,
    turns: u32,
    started_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(graph: Arc<DecisionGraph>) -> Self {
        let facts = FactStore::new(Arc::clone(graph.vocabulary()));
        let mut session = Self {
            id: Uuid::new_v4(),
            facts,
            navigator: Navigator::new(graph),
            turns: 0,
            started_at: Utc::now(),
        };
        session.settle();
        session
    }

    pub fn with_profile(graph: Arc<DecisionGraph>, profile: CustomerProfile) -> EngineResult<Self> {
        let mut session = Self::new(graph);
        session.attach_profile(profile)?;
        Ok(session)
    }

    /// Attach the customer profile and move through any questions it
    /// answers.
    pub fn attach_profile(&mut self, profile: CustomerProfile) -> EngineResult<()> {
        self.facts.merge(profile)?;
        self.navigator.advance(&self.facts)?;
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn graph(&self) -> &Arc<DecisionGraph> {
        self.navigator.graph()
    }

    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn state(&self) -> &NavState {
        self.navigator.state()
    }

    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn profile(&self) -> Option<&CustomerProfile> {
        self.facts.profile()
    }

    /// Merge newly extracted facts and drive the navigator.
    ///
    /// The batch is validated as a whole: one bad fact rejects the batch
    /// and leaves the session untouched. Changing a fact that an earlier
    /// hop already used replays the traversal from the root.
    ///
    /// Once the session is TERMINAL or STUCK the result stays put: a batch
    /// that agrees with the trail returns the same outcome, and one that
    /// contradicts a fact the trail used fails with `TraversalFinished`
    /// until the session is reset.
    pub fn submit_facts(&mut self, new_facts: &RawFacts) -> EngineResult<TurnOutcome> {
        let mut validated = Vec::with_capacity(new_facts.len());
        for (key, raw) in new_facts {
            match self.facts.validate(key, raw) {
                Ok(value) => validated.push((key.as_str(), value)),
                Err(e) => {
                    warn!("Rejected fact {}: {}", key, e);
                    return Err(e);
                }
            }
        }

        let consumed = self.navigator.consumed_keys();

        if self.navigator.is_finished() {
            let conflict = validated.iter().find(|(key, value)| {
                consumed.contains(*key) && self.facts.get(key).is_some_and(|known| known != *value)
            });
            if let Some((key, value)) = conflict {
                warn!(
                    "Fact {} = {} contradicts the finished trail at '{}'",
                    key,
                    value,
                    self.navigator.current_node()
                );
                return Err(EngineError::TraversalFinished(
                    self.navigator.current_node().to_string(),
                ));
            }

            self.turns += 1;
            for (key, value) in validated {
                self.facts.insert_validated(key, value);
            }
            debug!(
                "Turn {} left finished session at '{}'",
                self.turns,
                self.navigator.current_node()
            );
            return Ok(self.current_outcome());
        }

        self.turns += 1;

        let mut rewind = false;
        for (key, value) in validated {
            if let SetOutcome::Updated { previous } = self.facts.insert_validated(key, value) {
                if consumed.contains(key) {
                    warn!(
                        "Fact {} changed from {} after it was used; replaying from root",
                        key, previous
                    );
                    rewind = true;
                }
            }
        }
        if rewind {
            self.navigator.restart();
        }

        self.navigator.advance(&self.facts)?;
        debug!(
            "Turn {} ended in {} at '{}'",
            self.turns,
            self.navigator.state().name(),
            self.navigator.current_node()
        );
        Ok(self.current_outcome())
    }

    /// Result describing where the session stands now.
    pub fn current_outcome(&self) -> TurnOutcome {
        match self.navigator.state() {
            NavState::AwaitingFact { node_id, fact_key } => {
                let domain = self
                    .facts
                    .vocabulary()
                    .get(fact_key)
                    .map(|s| s.domain.clone())
                    .unwrap_or(FactDomain::FreeText);
                let question = self
                    .graph()
                    .node(node_id)
                    .ok()
                    .and_then(DecisionNode::as_question)
                    .map(|q| q.prompt.clone())
                    .unwrap_or_default();
                TurnOutcome::NeedInfo {
                    node_id: node_id.clone(),
                    fact_key: fact_key.clone(),
                    question,
                    allowed_values: domain.allowed_values(),
                    domain,
                }
            }
            NavState::Terminal { decision } => TurnOutcome::Decision {
                decision: decision.as_ref().clone(),
            },
            NavState::Stuck { node_id, reason } => TurnOutcome::Error {
                kind: "STUCK".to_string(),
                node_id: node_id.clone(),
                diagnostic: reason.clone(),
                facts: self.facts.snapshot(),
            },
            NavState::Advancing { node_id } => TurnOutcome::Error {
                kind: "NOT_SETTLED".to_string(),
                node_id: node_id.clone(),
                diagnostic: "Navigator has not been advanced".to_string(),
                facts: self.facts.snapshot(),
            },
        }
    }

    /// Drop conversation facts and return to the root, keeping the profile.
    pub fn reset(&mut self) {
        self.facts.clear();
        self.navigator.restart();
        self.turns = 0;
        self.settle();
        info!("Session {} reset to '{}'", self.id, self.navigator.current_node());
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id,
            customer_id: self.profile().map(|p| p.customer_id.clone()),
            turns: self.turns,
            state: self.navigator.state().name().to_string(),
            current_node: self.navigator.current_node().to_string(),
            hops: self.navigator.hops(),
            facts: self.facts.snapshot(),
        }
    }

    /// Audit record of the trail so far.
    pub fn export_trail(&self) -> AuditRecord {
        let graph = self.graph();
        let trail = self
            .navigator
            .trail()
            .iter()
            .enumerate()
            .map(|(step, s)| {
                let node = graph.node(&s.node_id).ok();
                TrailEntry {
                    step,
                    node_id: s.node_id.clone(),
                    kind: node.map(|n| n.kind_str()).unwrap_or("unknown").to_string(),
                    prompt: node
                        .and_then(DecisionNode::as_question)
                        .map(|q| q.prompt.clone()),
                    fact_key: s.fact_key.clone(),
                    value: s.value.clone(),
                    edge_label: s.edge_label.clone(),
                }
            })
            .collect();

        let decision = match self.navigator.state() {
            NavState::Terminal { decision } => Some(decision.as_ref()),
            _ => None,
        };

        AuditRecord {
            session_id: self.id,
            graph_id: graph.id().to_string(),
            customer_id: self.profile().map(|p| p.customer_id.clone()),
            state: self.navigator.state().name().to_string(),
            current_node: self.navigator.current_node().to_string(),
            hops: self.navigator.hops(),
            outcome: decision.map(|d| d.outcome),
            reason: decision.map(|d| d.reason.clone()),
            trail,
            facts: self.facts.snapshot(),
            started_at: self.started_at,
            exported_at: Utc::now(),
        }
    }

    /// Advance once so the session never rests in `ADVANCING`.
    fn settle(&mut self) {
        if let Err(e) = self.navigator.advance(&self.facts) {
            warn!("Session {} could not advance: {}", self.id, e);
        }
    }
}
