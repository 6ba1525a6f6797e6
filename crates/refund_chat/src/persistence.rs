//! Conversation export.
//!
//! Finished or abandoned conversations are written as one JSON document:
//! `<conversations_dir>/conversation_<YYYYmmdd_HHMMSS>.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use refund_engine::{AuditRecord, CustomerProfile, FactValue};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ChatResult;
use crate::types::Message;

/// Everything known about one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationExport {
    pub customer_data: Option<CustomerProfile>,
    /// Conversation-sourced facts
    pub extracted_info: BTreeMap<String, FactValue>,
    pub conversation_history: Vec<Message>,
    /// `NEED_INFO`, `DECISION` or `ERROR`
    pub final_state: String,
    pub audit: AuditRecord,
    pub export_timestamp: DateTime<Utc>,
}

/// Writes and reads conversation exports in one directory.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    dir: PathBuf,
}

impl ConversationStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `export` and return the file it landed in.
    ///
    /// Two exports within the same second get a numeric suffix.
    pub fn save(&self, export: &ConversationExport) -> ChatResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let stamp = export.export_timestamp.format("%Y%m%d_%H%M%S").to_string();
        let mut path = self.dir.join(format!("conversation_{}.json", stamp));
        let mut suffix = 1;
        while path.exists() {
            path = self.dir.join(format!("conversation_{}_{}.json", stamp, suffix));
            suffix += 1;
        }

        let content = serde_json::to_string_pretty(export)?;
        fs::write(&path, content)?;
        info!("Conversation exported to {}", path.display());
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> ChatResult<ConversationExport> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Exported files, oldest first.
    pub fn list(&self) -> ChatResult<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("conversation_"))
            })
            .collect();
        files.sort();
        Ok(files)
    }
}
