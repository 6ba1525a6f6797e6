//! Fact extraction from free text.
//!
//! [`FactExtractor`] is the seam for a natural-language collaborator. The
//! bundled [`KeywordExtractor`] maps keywords and phrases to fact values,
//! reading short answers such as "yes" in the light of the question that
//! was just asked.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use async_trait::async_trait;
use refund_engine::RawFacts;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::ChatResult;

/// What the conversation last asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionContext {
    pub expected_fact: Option<String>,
    pub allowed_values: Vec<String>,
}

impl ExtractionContext {
    pub fn expecting(fact: impl Into<String>, allowed_values: Vec<String>) -> Self {
        Self {
            expected_fact: Some(fact.into()),
            allowed_values,
        }
    }
}

/// Turns a user message into raw facts for the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FactExtractor: Send + Sync {
    async fn extract(&self, text: &str, context: &ExtractionContext) -> ChatResult<RawFacts>;
}

const YES_WORDS: &[&str] = &["yes", "yeah", "yep", "sure", "correct", "right", "true", "eligible"];
const NO_WORDS: &[&str] = &["no", "nah", "nope", "not", "false", "wrong", "ineligible"];

/// Facts answered with yes/no.
const YES_NO_FACTS: &[&str] = &[
    "item_returnable",
    "late_return_eligible",
    "delivered",
    "in_house_policy",
    "third_party_policy",
    "bnpl_policy",
    "gift_card_policy",
];

/// Phrase table for one fact: value and the phrases that imply it.
type PhraseTable = &'static [(&'static str, &'static [&'static str])];

const RETURN_WINDOW: PhraseTable = &[
    ("expired", &["no", "expired", "past", "late", "outside", "beyond"]),
    ("within", &["yes", "within", "inside", "valid", "before"]),
];

const SHIPPING_ISSUE: PhraseTable = &[
    ("Neither", &["neither", "not lost", "not delayed", "none"]),
    ("Lost", &["lost"]),
    ("Delayed", &["delayed"]),
];

const SELLER_TYPE: PhraseTable = &[
    ("Third-party", &["third party", "third-party", "marketplace", "external"]),
    ("In-house", &["in-house", "in house", "direct", "our company", "company"]),
];

const PAYMENT_METHOD: PhraseTable = &[
    ("CreditCard", &["credit card", "visa", "mastercard", "amex"]),
    ("GiftCard", &["gift card", "store credit", "voucher"]),
    ("BNPL", &["bnpl", "klarna", "afterpay", "buy now pay later"]),
    ("Prepaid", &["prepaid", "debit card", "debit"]),
];

const ITEM_CONDITION: PhraseTable = &[
    ("damaged", &["broken", "damaged", "cracked"]),
    ("defective", &["doesn't work", "does not work", "not working", "isn't working", "defective", "faulty"]),
    ("normal", &["normal", "fine", "working"]),
];

const ITEM_CATEGORY: PhraseTable = &[
    ("Perishable", &["food", "fresh produce", "perishable"]),
    ("Digital", &["software", "app", "download", "digital"]),
    ("Physical", &["laptop", "phone", "book", "physical"]),
];

const REVIEW_DECISION: PhraseTable = &[
    ("Approve", &["approve", "approved", "accept"]),
    ("Deny", &["deny", "denied", "reject", "decline"]),
];

/// Facts recognized anywhere in a message, whatever was asked.
const FREE_TEXT_TABLES: &[(&str, PhraseTable)] = &[
    ("item_condition", ITEM_CONDITION),
    ("item_category", ITEM_CATEGORY),
    ("seller_type", SELLER_TYPE),
    ("payment_method", PAYMENT_METHOD),
];

/// Keyword-based extractor.
#[derive(Debug, Default, Clone)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract facts from `text` without suspending.
    pub fn extract_now(&self, text: &str, context: &ExtractionContext) -> RawFacts {
        let lower = text.to_lowercase();
        let mut facts: RawFacts = BTreeMap::new();

        if let Some(expected) = context.expected_fact.as_deref() {
            if let Some(value) = Self::contextual(expected, &lower, &context.allowed_values) {
                facts.insert(expected.to_string(), value);
            }
        }

        for (key, table) in FREE_TEXT_TABLES {
            if facts.contains_key(*key) {
                continue;
            }
            if let Some(value) = first_match(table, &lower) {
                facts.insert(key.to_string(), Value::from(value));
            }
        }

        if lower.contains("not returnable") || lower.contains("non-returnable") {
            facts
                .entry("item_returnable".to_string())
                .or_insert_with(|| Value::from("No"));
        }

        debug!("Extracted {} fact(s) from input", facts.len());
        facts
    }

    /// Read a reply to a question about `expected`.
    fn contextual(expected: &str, lower: &str, allowed: &[String]) -> Option<Value> {
        if YES_NO_FACTS.contains(&expected) {
            // Negatives first so "not eligible" is not read as a yes.
            if contains_any(lower, NO_WORDS) {
                return Some(Value::from("No"));
            }
            if contains_any(lower, YES_WORDS) {
                return Some(Value::from("Yes"));
            }
            return None;
        }

        let table = match expected {
            "return_window" => Some(RETURN_WINDOW),
            "shipping_issue" => Some(SHIPPING_ISSUE),
            "seller_type" => Some(SELLER_TYPE),
            "payment_method" => Some(PAYMENT_METHOD),
            "item_condition" => Some(ITEM_CONDITION),
            "item_category" => Some(ITEM_CATEGORY),
            "manual_review_outcome" | "shipping_review_outcome" => Some(REVIEW_DECISION),
            _ => None,
        };
        if let Some(value) = table.and_then(|t| first_match(t, lower)) {
            return Some(Value::from(value));
        }

        // Fall back to the allowed values spelled out in the reply.
        let tokens = words(lower);
        allowed
            .iter()
            .find(|v| tokens.contains(&v.to_lowercase().as_str()))
            .map(|v| Value::from(v.as_str()))
    }
}

#[async_trait]
impl FactExtractor for KeywordExtractor {
    async fn extract(&self, text: &str, context: &ExtractionContext) -> ChatResult<RawFacts> {
        Ok(self.extract_now(text, context))
    }
}

fn first_match(table: PhraseTable, lower: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, phrases)| contains_any(lower, phrases))
        .map(|(value, _)| *value)
}

fn contains_any(lower: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(lower, p))
}

/// Every phrase the extractor knows, compiled once.
fn phrase_patterns() -> &'static HashMap<&'static str, Regex> {
    static PATTERNS: OnceLock<HashMap<&'static str, Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let tables = [
            RETURN_WINDOW,
            SHIPPING_ISSUE,
            SELLER_TYPE,
            PAYMENT_METHOD,
            ITEM_CONDITION,
            ITEM_CATEGORY,
            REVIEW_DECISION,
        ];
        YES_WORDS
            .iter()
            .chain(NO_WORDS)
            .copied()
            .chain(
                tables
                    .iter()
                    .flat_map(|t| t.iter())
                    .flat_map(|(_, phrases)| phrases.iter().copied()),
            )
            .filter_map(|phrase| {
                let pattern = format!(r"(^|[^a-z0-9]){}($|[^a-z0-9])", regex::escape(phrase));
                Regex::new(&pattern).ok().map(|re| (phrase, re))
            })
            .collect()
    })
}

fn word_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[a-z0-9][a-z0-9_-]*").ok())
        .as_ref()
}

/// Whole-word match, so "no" does not fire inside "know".
fn contains_phrase(lower: &str, phrase: &str) -> bool {
    match phrase_patterns().get(phrase) {
        Some(re) => re.is_match(lower),
        None => words(lower).contains(&phrase),
    }
}

/// Word tokens of a lowercased message; `_` and `-` stay inside words.
fn words(lower: &str) -> Vec<&str> {
    word_pattern()
        .map(|re| re.find_iter(lower).map(|m| m.as_str()).collect())
        .unwrap_or_default()
}
