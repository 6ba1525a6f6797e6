//! Fact vocabulary: keys, value domains and validation.
//!
//! Every fact a conversation can hold is declared up front in a
//! [`Vocabulary`]. Each entry names its [`FactDomain`], which is used both
//! to validate raw values coming from the extraction collaborator and to
//! tell the question collaborator which answers are acceptable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// A validated fact value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Flag(bool),
    Integer(i64),
    Text(String),
}

impl FactValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FactValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FactValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FactValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert back to the raw JSON shape the extraction collaborator uses.
    pub fn to_raw(&self) -> Value {
        match self {
            FactValue::Flag(b) => Value::Bool(*b),
            FactValue::Integer(n) => Value::from(*n),
            FactValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl std::fmt::Display for FactValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactValue::Flag(true) => write!(f, "Yes"),
            FactValue::Flag(false) => write!(f, "No"),
            FactValue::Integer(n) => write!(f, "{}", n),
            FactValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        FactValue::Flag(value)
    }
}

impl From<i64> for FactValue {
    fn from(value: i64) -> Self {
        FactValue::Integer(value)
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        FactValue::Text(value.to_string())
    }
}

/// The set of values a fact may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FactDomain {
    /// One of a closed list of values, matched case-insensitively.
    Enumerated { values: Vec<String> },
    /// Yes/no.
    Boolean,
    /// Whole number, optionally bounded (inclusive).
    Integer {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    /// Any non-empty text.
    FreeText,
}

impl FactDomain {
    pub fn enumerated<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FactDomain::Enumerated {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn non_negative() -> Self {
        FactDomain::Integer {
            min: Some(0),
            max: None,
        }
    }

    /// Whether the domain has a finite list of values.
    pub fn is_finite(&self) -> bool {
        matches!(self, FactDomain::Enumerated { .. } | FactDomain::Boolean)
    }

    /// Every value of a finite domain, in declared order.
    pub fn finite_values(&self) -> Option<Vec<FactValue>> {
        match self {
            FactDomain::Enumerated { values } => {
                Some(values.iter().map(|v| FactValue::Text(v.clone())).collect())
            }
            FactDomain::Boolean => Some(vec![FactValue::Flag(true), FactValue::Flag(false)]),
            _ => None,
        }
    }

    /// Allowed answers, spelled the way a question should offer them.
    pub fn allowed_values(&self) -> Vec<String> {
        match self {
            FactDomain::Enumerated { values } => values.clone(),
            FactDomain::Boolean => vec!["Yes".to_string(), "No".to_string()],
            FactDomain::Integer { .. } | FactDomain::FreeText => Vec::new(),
        }
    }

    /// Short description of the domain for error messages.
    pub fn describe(&self) -> String {
        match self {
            FactDomain::Enumerated { values } => values.join(", "),
            FactDomain::Boolean => "Yes, No".to_string(),
            FactDomain::Integer { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => format!("integer {}..={}", lo, hi),
                (Some(lo), None) => format!("integer >= {}", lo),
                (None, Some(hi)) => format!("integer <= {}", hi),
                (None, None) => "integer".to_string(),
            },
            FactDomain::FreeText => "free text".to_string(),
        }
    }

    /// Whether an already-typed value belongs to the domain.
    pub fn contains(&self, value: &FactValue) -> bool {
        match (self, value) {
            (FactDomain::Enumerated { values }, FactValue::Text(s)) => values.contains(s),
            (FactDomain::Boolean, FactValue::Flag(_)) => true,
            (FactDomain::Integer { min, max }, FactValue::Integer(n)) => {
                min.map_or(true, |lo| *n >= lo) && max.map_or(true, |hi| *n <= hi)
            }
            (FactDomain::FreeText, FactValue::Text(s)) => !s.trim().is_empty(),
            _ => false,
        }
    }

    /// Validate a raw value and convert it to its canonical form.
    ///
    /// Single-element arrays are unwrapped, since extraction output
    /// sometimes wraps scalars in a list.
    pub fn normalize(&self, key: &str, raw: &Value) -> EngineResult<FactValue> {
        let raw = match raw {
            Value::Array(items) if !items.is_empty() => &items[0],
            other => other,
        };

        let invalid = || EngineError::InvalidFactValue {
            key: key.to_string(),
            value: raw_display(raw),
            allowed: self.describe(),
        };

        match self {
            FactDomain::Enumerated { values } => {
                let text = raw.as_str().ok_or_else(invalid)?.trim();
                values
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(text))
                    .map(|v| FactValue::Text(v.clone()))
                    .ok_or_else(invalid)
            }
            FactDomain::Boolean => match raw {
                Value::Bool(b) => Ok(FactValue::Flag(*b)),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "yes" | "y" | "true" => Ok(FactValue::Flag(true)),
                    "no" | "n" | "false" => Ok(FactValue::Flag(false)),
                    _ => Err(invalid()),
                },
                _ => Err(invalid()),
            },
            FactDomain::Integer { .. } => {
                let n = match raw {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                }
                .ok_or_else(invalid)?;
                let value = FactValue::Integer(n);
                if self.contains(&value) {
                    Ok(value)
                } else {
                    Err(invalid())
                }
            }
            FactDomain::FreeText => {
                let text = match raw {
                    Value::String(s) => s.trim().to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => String::new(),
                };
                if text.is_empty() {
                    Err(invalid())
                } else {
                    Ok(FactValue::Text(text))
                }
            }
        }
    }
}

fn raw_display(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Where a fact's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactSource {
    /// Supplied turn by turn through extraction.
    Conversation,
    /// Read from the attached customer profile; never set directly.
    Profile,
}

/// Declaration of a single fact key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSpec {
    pub key: String,
    pub domain: FactDomain,
    pub source: FactSource,
    #[serde(default)]
    pub description: String,
}

impl FactSpec {
    pub fn conversation(key: impl Into<String>, domain: FactDomain) -> Self {
        Self {
            key: key.into(),
            domain,
            source: FactSource::Conversation,
            description: String::new(),
        }
    }

    pub fn profile(key: impl Into<String>, domain: FactDomain) -> Self {
        Self {
            key: key.into(),
            domain,
            source: FactSource::Profile,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }
}

/// The global set of fact keys known to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    facts: BTreeMap<String, FactSpec>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The refund vocabulary used by the bundled graphs.
    pub fn standard() -> Self {
        let yes_no = || FactDomain::Boolean;
        let mut vocab = Self::new();

        // Customer profile
        vocab.add(
            FactSpec::profile(
                "account_status",
                FactDomain::enumerated(["good_standing", "not_good_standing"]),
            )
            .with_description("Whether the customer account is in good standing"),
        );
        vocab.add(
            FactSpec::profile(
                "loyalty_tier",
                FactDomain::enumerated(["Bronze", "Silver", "Gold"]),
            )
            .with_description("Customer loyalty tier"),
        );
        vocab.add(
            FactSpec::profile("fraud_flag", yes_no())
                .with_description("Whether there is a fraud flag on the account"),
        );
        vocab.add(
            FactSpec::profile("return_abuse", yes_no())
                .with_description("Whether the customer has abused returns"),
        );
        vocab.add(
            FactSpec::profile("previous_returns", FactDomain::non_negative())
                .with_description("Number of prior returns"),
        );
        vocab.add(
            FactSpec::profile("region", FactDomain::FreeText).with_description("Customer region"),
        );

        // Refund request
        vocab.add(
            FactSpec::conversation(
                "item_category",
                FactDomain::enumerated(["Perishable", "Digital", "Physical"]),
            )
            .with_description("What kind of item is being returned"),
        );
        vocab.add(
            FactSpec::conversation("item_returnable", yes_no())
                .with_description("Whether the item is marked as returnable"),
        );
        vocab.add(
            FactSpec::conversation(
                "item_condition",
                FactDomain::enumerated(["damaged", "defective", "normal"]),
            )
            .with_description("Condition of the item"),
        );
        vocab.add(
            FactSpec::conversation("return_window", FactDomain::enumerated(["within", "expired"]))
                .with_description("Whether the request is within the return window"),
        );
        vocab.add(
            FactSpec::conversation("late_return_eligible", yes_no())
                .with_description("Whether a late return qualifies for a partial refund"),
        );
        vocab.add(
            FactSpec::conversation("delivered", yes_no())
                .with_description("Whether the item has been delivered"),
        );
        vocab.add(
            FactSpec::conversation(
                "shipping_issue",
                FactDomain::enumerated(["Lost", "Delayed", "Neither"]),
            )
            .with_description("Shipping status of an undelivered item"),
        );
        vocab.add(
            FactSpec::conversation(
                "seller_type",
                FactDomain::enumerated(["In-house", "Third-party"]),
            )
            .with_description("Who sold the item"),
        );
        vocab.add(
            FactSpec::conversation("in_house_policy", yes_no())
                .with_description("Whether the return meets the in-house policy"),
        );
        vocab.add(
            FactSpec::conversation("third_party_policy", yes_no())
                .with_description("Whether the third-party seller policy allows the refund"),
        );
        vocab.add(
            FactSpec::conversation(
                "payment_method",
                FactDomain::enumerated(["BNPL", "CreditCard", "Prepaid", "GiftCard"]),
            )
            .with_description("Payment method used for the order"),
        );
        vocab.add(
            FactSpec::conversation("bnpl_policy", yes_no())
                .with_description("Whether the BNPL provider allows refunds"),
        );
        vocab.add(
            FactSpec::conversation("gift_card_policy", yes_no())
                .with_description("Whether the gift card terms allow refunds"),
        );
        vocab.add(
            FactSpec::conversation("item_description", FactDomain::FreeText)
                .with_description("Free-form description of the item"),
        );
        vocab.add(
            FactSpec::conversation("days_since_delivery", FactDomain::non_negative())
                .with_description("Days elapsed since delivery"),
        );

        // Manual review follow-up
        vocab.add(
            FactSpec::conversation(
                "review_type",
                FactDomain::enumerated(["returns_abuse", "shipping_delay"]),
            )
            .with_description("Which manual review queue the case came from"),
        );
        vocab.add(
            FactSpec::conversation("manual_review_outcome", FactDomain::enumerated(["Approve", "Deny"]))
                .with_description("Reviewer decision for a returns-abuse review"),
        );
        vocab.add(
            FactSpec::conversation(
                "shipping_review_outcome",
                FactDomain::enumerated(["Approve", "Deny"]),
            )
            .with_description("Reviewer decision for a shipping-delay review"),
        );

        vocab
    }

    /// Add or replace a fact declaration.
    pub fn add(&mut self, spec: FactSpec) {
        self.facts.insert(spec.key.clone(), spec);
    }

    pub fn get(&self, key: &str) -> Option<&FactSpec> {
        self.facts.get(key)
    }

    /// Look up a key, failing with `UnknownFactKey` if it is not declared.
    pub fn require(&self, key: &str) -> EngineResult<&FactSpec> {
        self.get(key)
            .ok_or_else(|| EngineError::UnknownFactKey(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.facts.contains_key(key)
    }

    pub fn specs(&self) -> impl Iterator<Item = &FactSpec> {
        self.facts.values()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Read access to fact values, used by guards.
pub trait FactLookup {
    fn lookup(&self, key: &str) -> Option<FactValue>;
}

impl FactLookup for BTreeMap<String, FactValue> {
    fn lookup(&self, key: &str) -> Option<FactValue> {
        self.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enumerated_is_case_insensitive_and_canonical() {
        let domain = FactDomain::enumerated(["damaged", "defective", "normal"]);
        let value = domain.normalize("item_condition", &json!("Damaged")).unwrap();
        assert_eq!(value, FactValue::Text("damaged".to_string()));
    }

    #[test]
    fn test_enumerated_rejects_out_of_domain() {
        let domain = FactDomain::enumerated(["damaged", "defective", "normal"]);
        let err = domain.normalize("item_condition", &json!("wet")).unwrap_err();
        match err {
            EngineError::InvalidFactValue { key, value, allowed } => {
                assert_eq!(key, "item_condition");
                assert_eq!(value, "wet");
                assert!(allowed.contains("defective"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_boolean_accepts_yes_no_strings() {
        let domain = FactDomain::Boolean;
        assert_eq!(domain.normalize("delivered", &json!(true)).unwrap(), FactValue::Flag(true));
        assert_eq!(domain.normalize("delivered", &json!("No")).unwrap(), FactValue::Flag(false));
        assert_eq!(domain.normalize("delivered", &json!("yes")).unwrap(), FactValue::Flag(true));
        assert!(domain.normalize("delivered", &json!("maybe")).is_err());
        assert!(domain.normalize("delivered", &json!(1)).is_err());
    }

    #[test]
    fn test_integer_bounds() {
        let domain = FactDomain::non_negative();
        assert_eq!(domain.normalize("n", &json!(4)).unwrap(), FactValue::Integer(4));
        assert_eq!(domain.normalize("n", &json!("12")).unwrap(), FactValue::Integer(12));
        assert!(domain.normalize("n", &json!(-1)).is_err());
        assert!(domain.normalize("n", &json!("ten")).is_err());
    }

    #[test]
    fn test_free_text_rejects_empty() {
        let domain = FactDomain::FreeText;
        assert!(domain.normalize("note", &json!("   ")).is_err());
        assert_eq!(
            domain.normalize("note", &json!(" laptop ")).unwrap(),
            FactValue::Text("laptop".to_string())
        );
    }

    #[test]
    fn test_array_values_are_unwrapped() {
        let domain = FactDomain::enumerated(["Lost", "Delayed", "Neither"]);
        let value = domain.normalize("shipping_issue", &json!(["lost", "delayed"])).unwrap();
        assert_eq!(value, FactValue::Text("Lost".to_string()));
    }

    #[test]
    fn test_standard_vocabulary() {
        let vocab = Vocabulary::standard();
        assert_eq!(vocab.require("fraud_flag").unwrap().source, FactSource::Profile);
        assert_eq!(
            vocab.require("item_condition").unwrap().domain.allowed_values(),
            vec!["damaged", "defective", "normal"]
        );
        assert!(matches!(
            vocab.require("colour"),
            Err(EngineError::UnknownFactKey(_))
        ));
    }

    #[test]
    fn test_fact_value_display() {
        assert_eq!(FactValue::Flag(true).to_string(), "Yes");
        assert_eq!(FactValue::Integer(3).to_string(), "3");
        assert_eq!(FactValue::from("Gold").to_string(), "Gold");
    }
}
