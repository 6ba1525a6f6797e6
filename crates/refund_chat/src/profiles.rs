//! Customer profile loading.
//!
//! Profiles come from a JSON file holding either a single customer record
//! or a list of them. A missing file falls back to the default profile so
//! a conversation can still run.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use refund_engine::CustomerProfile;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ChatError, ChatResult};

/// Source of customer profiles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load the profile for `customer_id`, or the store's only profile
    /// when no id is given.
    async fn load(&self, customer_id: Option<String>) -> ChatResult<CustomerProfile>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileFile {
    One(CustomerProfile),
    Many(Vec<CustomerProfile>),
}

/// Profiles read from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonProfileStore {
    path: PathBuf,
}

impl JsonProfileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file synchronously.
    pub fn load_sync(&self, customer_id: Option<&str>) -> ChatResult<CustomerProfile> {
        if !self.path.exists() {
            warn!(
                "Customer data file not found: {}; using default profile",
                self.path.display()
            );
            return Ok(CustomerProfile::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let parsed: ProfileFile = serde_json::from_str(&content).map_err(|e| {
            ChatError::Profile(format!("{}: {}", self.path.display(), e))
        })?;

        let profile = match (parsed, customer_id) {
            (ProfileFile::One(profile), None) => profile,
            (ProfileFile::One(profile), Some(id)) if profile.customer_id == id => profile,
            (ProfileFile::Many(profiles), Some(id)) => profiles
                .into_iter()
                .find(|p| p.customer_id == id)
                .ok_or_else(|| ChatError::Profile(format!("customer {} not found", id)))?,
            (ProfileFile::Many(mut profiles), None) if profiles.len() == 1 => profiles.remove(0),
            (ProfileFile::Many(profiles), None) => {
                return Err(ChatError::Profile(format!(
                    "{} holds {} customers; pass a customer id",
                    self.path.display(),
                    profiles.len()
                )))
            }
            (ProfileFile::One(_), Some(id)) => {
                return Err(ChatError::Profile(format!("customer {} not found", id)))
            }
        };

        info!("Customer data loaded: {}", profile.customer_id);
        Ok(profile)
    }
}

#[async_trait]
impl ProfileStore for JsonProfileStore {
    async fn load(&self, customer_id: Option<String>) -> ChatResult<CustomerProfile> {
        self.load_sync(customer_id.as_deref())
    }
}
