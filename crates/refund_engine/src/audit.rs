//! Audit export of a session's trail.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::fact::FactValue;
use crate::outcome::Outcome;

/// One visited node in an exported trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailEntry {
    /// Zero-based position; the root is step 0.
    pub step: usize,
    pub node_id: String,
    /// `question` or `terminal`
    pub kind: String,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Fact consulted at this node, if it was answered.
    #[serde(default)]
    pub fact_key: Option<String>,
    #[serde(default)]
    pub value: Option<FactValue>,
    #[serde(default)]
    pub edge_label: Option<String>,
}

/// Serialized audit record for one session.
///
/// Field names are stable; external exporters persist this as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub session_id: Uuid,
    pub graph_id: String,
    pub customer_id: Option<String>,
    /// Navigator state name at export time
    pub state: String,
    pub current_node: String,
    pub hops: usize,
    pub outcome: Option<Outcome>,
    pub reason: Option<String>,
    pub trail: Vec<TrailEntry>,
    /// Every fact known at export time, profile fields included.
    pub facts: BTreeMap<String, FactValue>,
    pub started_at: DateTime<Utc>,
    pub exported_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn node_ids(&self) -> Vec<&str> {
        self.trail.iter().map(|e| e.node_id.as_str()).collect()
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Serialization(e.to_string()))
    }
}
