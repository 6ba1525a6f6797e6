//! # refund_engine
//!
//! Decision-tree navigation and conversation state for refund requests.
//!
//! This crate holds the facts gathered during a refund conversation, walks
//! a validated decision graph as those facts arrive, and reports either the
//! next fact it needs or a final decision with the trail that led to it.
//!
//! # Architecture
//!
//! - **Vocabulary / FactStore**: declared fact keys with typed domains, and
//!   the per-session store that validates values against them
//! - **DecisionGraph**: question and terminal nodes with guarded edges,
//!   loaded from YAML and validated once
//! - **Navigator**: eager traversal; follows every edge it can with the
//!   facts already known
//! - **ConversationSession**: merges extracted facts turn by turn and
//!   reports `NEED_INFO`, `DECISION` or `ERROR`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use refund_engine::{ConversationSession, CustomerProfile, DecisionGraph, RawFacts};
//! use serde_json::json;
//!
//! let graph = Arc::new(DecisionGraph::standard()?);
//! let mut session = ConversationSession::with_profile(graph, CustomerProfile::new("C-1001"))?;
//!
//! let mut facts = RawFacts::new();
//! facts.insert("item_category".into(), json!("Digital"));
//! let outcome = session.submit_facts(&facts)?;
//! assert_eq!(outcome.status(), "DECISION");
//! ```

pub mod audit;
pub mod error;
pub mod fact;
pub mod graph;
pub mod guard;
pub mod navigator;
pub mod outcome;
pub mod profile;
pub mod session;
pub mod store;
pub mod template;
pub mod validate;

// Re-export main types for convenience
pub use audit::{AuditRecord, TrailEntry};
pub use error::{EngineError, EngineResult};
pub use fact::{FactDomain, FactLookup, FactSource, FactSpec, FactValue, Vocabulary};
pub use graph::{
    DecisionGraph, DecisionNode, Edge, EdgeMatch, GraphDefinition, QuestionNode, TerminalNode,
};
pub use guard::Guard;
pub use navigator::{Decision, NavState, Navigator, TrailStep};
pub use outcome::{Outcome, OutcomeCategory};
pub use profile::{AccountStatus, CustomerProfile, LoyaltyTier, PROFILE_FACT_KEYS};
pub use session::{ConversationSession, RawFacts, SessionStatus, TurnOutcome};
pub use store::{FactStore, SetOutcome};
pub use validate::{GraphValidator, ValidationReport};
