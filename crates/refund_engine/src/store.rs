//! Session-scoped fact storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::fact::{FactLookup, FactSource, FactValue, Vocabulary};
use crate::profile::CustomerProfile;

/// What a successful `set` did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    Inserted,
    Updated { previous: FactValue },
    Unchanged,
}

impl SetOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, SetOutcome::Unchanged)
    }
}

/// Accumulated facts for one conversation plus the read-only profile.
///
/// Facts are never retracted within a session; only [`FactStore::clear`]
/// empties the store, and it keeps the profile.
#[derive(Debug, Clone)]
pub struct FactStore {
    vocabulary: Arc<Vocabulary>,
    facts: BTreeMap<String, FactValue>,
    profile: Option<Arc<CustomerProfile>>,
}

impl FactStore {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            vocabulary,
            facts: BTreeMap::new(),
            profile: None,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Validate a raw value for `key` without storing it.
    pub fn validate(&self, key: &str, raw: &Value) -> EngineResult<FactValue> {
        let spec = self.vocabulary.require(key)?;
        if spec.source == FactSource::Profile {
            return Err(EngineError::ProfileFieldReadOnly(key.to_string()));
        }
        spec.domain.normalize(key, raw)
    }

    /// Validate and store a fact, overwriting a different previous value.
    pub fn set(&mut self, key: &str, raw: &Value) -> EngineResult<SetOutcome> {
        let value = self.validate(key, raw)?;
        Ok(self.insert_validated(key, value))
    }

    pub(crate) fn insert_validated(&mut self, key: &str, value: FactValue) -> SetOutcome {
        match self.facts.get(key) {
            Some(existing) if *existing == value => SetOutcome::Unchanged,
            Some(existing) => {
                let previous = existing.clone();
                debug!("Fact {} changed: {} -> {}", key, previous, value);
                self.facts.insert(key.to_string(), value);
                SetOutcome::Updated { previous }
            }
            None => {
                debug!("Fact {} = {}", key, value);
                self.facts.insert(key.to_string(), value);
                SetOutcome::Inserted
            }
        }
    }

    /// Current value for `key`, from the conversation or the profile.
    ///
    /// Returns `None` for missing and for unknown keys alike.
    pub fn get(&self, key: &str) -> Option<FactValue> {
        match self.vocabulary.get(key)?.source {
            FactSource::Conversation => self.facts.get(key).cloned(),
            FactSource::Profile => self.profile.as_ref().and_then(|p| p.fact(key)),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Attach the customer profile. Allowed once per store.
    pub fn merge(&mut self, profile: CustomerProfile) -> EngineResult<()> {
        if self.profile.is_some() {
            return Err(EngineError::ProfileAlreadyAttached);
        }
        debug!("Attached profile for customer {}", profile.customer_id);
        self.profile = Some(Arc::new(profile));
        Ok(())
    }

    pub fn profile(&self) -> Option<&CustomerProfile> {
        self.profile.as_deref()
    }

    /// Drop conversation facts, keeping the profile.
    pub fn clear(&mut self) {
        self.facts.clear();
    }

    /// Facts supplied through the conversation only.
    pub fn conversation_facts(&self) -> &BTreeMap<String, FactValue> {
        &self.facts
    }

    /// Every known value, profile fields included.
    pub fn snapshot(&self) -> BTreeMap<String, FactValue> {
        let mut all = self
            .profile
            .as_ref()
            .map(|p| p.facts())
            .unwrap_or_default();
        all.extend(self.facts.iter().map(|(k, v)| (k.clone(), v.clone())));
        all
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

impl FactLookup for FactStore {
    fn lookup(&self, key: &str) -> Option<FactValue> {
        self.get(key)
    }
}
