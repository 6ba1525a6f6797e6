//! Customer profile attached to a conversation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fact::FactValue;

/// Account standing as recorded in the customer store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    GoodStanding,
    NotGoodStanding,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::GoodStanding => "good_standing",
            AccountStatus::NotGoodStanding => "not_good_standing",
        }
    }
}

/// Loyalty programme tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoyaltyTier {
    #[serde(alias = "bronze")]
    Bronze,
    #[serde(alias = "silver")]
    Silver,
    #[serde(alias = "gold")]
    Gold,
}

impl LoyaltyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoyaltyTier::Bronze => "Bronze",
            LoyaltyTier::Silver => "Silver",
            LoyaltyTier::Gold => "Gold",
        }
    }
}

/// Static customer data, loaded once per session and never mutated.
///
/// Flags accept either JSON booleans or `"Yes"`/`"No"` strings, matching
/// the customer data files in circulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: String,
    pub account_status: AccountStatus,
    pub loyalty_tier: LoyaltyTier,
    #[serde(with = "yes_no")]
    pub fraud_flag: bool,
    #[serde(with = "yes_no")]
    pub return_abuse: bool,
    #[serde(default, alias = "prior_returns")]
    pub previous_returns: u32,
    #[serde(default)]
    pub region: Option<String>,
    /// Fields the engine does not interpret (lifetime value, dates, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for CustomerProfile {
    fn default() -> Self {
        Self {
            customer_id: "UNKNOWN".to_string(),
            account_status: AccountStatus::GoodStanding,
            loyalty_tier: LoyaltyTier::Gold,
            fraud_flag: false,
            return_abuse: false,
            previous_returns: 3,
            region: Some("US".to_string()),
            extra: BTreeMap::new(),
        }
    }
}

impl CustomerProfile {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            ..Self::default()
        }
    }

    pub fn with_account_status(mut self, status: AccountStatus) -> Self {
        self.account_status = status;
        self
    }

    pub fn with_loyalty_tier(mut self, tier: LoyaltyTier) -> Self {
        self.loyalty_tier = tier;
        self
    }

    pub fn with_fraud_flag(mut self, flag: bool) -> Self {
        self.fraud_flag = flag;
        self
    }

    pub fn with_return_abuse(mut self, flag: bool) -> Self {
        self.return_abuse = flag;
        self
    }

    pub fn with_previous_returns(mut self, count: u32) -> Self {
        self.previous_returns = count;
        self
    }

    /// Profile field exposed under a fact key, if the key maps to one.
    pub fn fact(&self, key: &str) -> Option<FactValue> {
        match key {
            "account_status" => Some(FactValue::Text(self.account_status.as_str().to_string())),
            "loyalty_tier" => Some(FactValue::Text(self.loyalty_tier.as_str().to_string())),
            "fraud_flag" => Some(FactValue::Flag(self.fraud_flag)),
            "return_abuse" => Some(FactValue::Flag(self.return_abuse)),
            "previous_returns" => Some(FactValue::Integer(i64::from(self.previous_returns))),
            "region" => self.region.clone().map(FactValue::Text),
            _ => None,
        }
    }

    /// All profile fields that map to fact keys.
    pub fn facts(&self) -> BTreeMap<String, FactValue> {
        PROFILE_FACT_KEYS
            .iter()
            .filter_map(|key| self.fact(key).map(|v| (key.to_string(), v)))
            .collect()
    }
}

/// Fact keys answered by the profile.
pub const PROFILE_FACT_KEYS: [&str; 6] = [
    "account_status",
    "loyalty_tier",
    "fraud_flag",
    "return_abuse",
    "previous_returns",
    "region",
];

mod yes_no {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "Yes" } else { "No" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        struct YesNo;

        impl<'de> Visitor<'de> for YesNo {
            type Value = bool;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a boolean or \"Yes\"/\"No\"")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
                Ok(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
                match v.trim().to_ascii_lowercase().as_str() {
                    "yes" | "true" | "y" => Ok(true),
                    "no" | "false" | "n" => Ok(false),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(YesNo)
    }
}
