//! Question phrasing.
//!
//! The engine only names the fact it needs. A [`QuestionGenerator`] turns
//! that into something to say to the customer.

use async_trait::async_trait;

use crate::error::ChatResult;

/// What the engine is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRequest {
    pub node_id: String,
    pub fact_key: String,
    /// Prompt declared on the graph node, possibly empty
    pub prompt: String,
    pub allowed_values: Vec<String>,
}

/// Phrases the next question for a missing fact.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn ask(&self, request: &QuestionRequest) -> ChatResult<String>;
}

/// Fixed wording per fact, falling back to a generic question.
#[derive(Debug, Default, Clone)]
pub struct TemplateQuestions;

impl TemplateQuestions {
    pub fn new() -> Self {
        Self
    }

    pub fn template_for(fact_key: &str) -> Option<&'static str> {
        let text = match fact_key {
            "item_returnable" => "Is this item marked as returnable? Please specify: Yes or No.",
            "item_category" => {
                "What kind of item is it? Please specify: Perishable, Digital, or Physical."
            }
            "item_condition" => {
                "What is the condition of the item? Please specify: damaged, defective, or normal."
            }
            "delivered" => "Has the item been delivered to you? Please specify: Yes or No.",
            "seller_type" => {
                "Who was the seller for this item? Please specify: In-house or Third-party."
            }
            "payment_method" => {
                "What payment method did you use? Please specify: CreditCard, GiftCard, BNPL, or Prepaid."
            }
            "shipping_issue" => {
                "What is the shipping status? Please specify: Lost, Delayed, or Neither."
            }
            "return_window" => {
                "Is your return request within the time window? Please specify: within or expired."
            }
            "late_return_eligible" => {
                "Are you eligible for a partial refund due to late return? Please specify: Yes or No."
            }
            "in_house_policy" => {
                "Does this return meet our in-house policy requirements? Please specify: Yes or No."
            }
            "third_party_policy" => {
                "Does the third-party seller's policy allow this refund? Please specify: Yes or No."
            }
            "bnpl_policy" => {
                "Does your Buy Now Pay Later provider allow refunds? Please specify: Yes or No."
            }
            "gift_card_policy" => "Do the gift card terms allow refunds? Please specify: Yes or No.",
            _ => return None,
        };
        Some(text)
    }

    /// Question text without suspending.
    pub fn phrase(&self, request: &QuestionRequest) -> String {
        if let Some(text) = Self::template_for(&request.fact_key) {
            return text.to_string();
        }

        let lead = if request.prompt.is_empty() {
            format!(
                "I need more information about {} to process your refund request.",
                request.fact_key.replace('_', " ")
            )
        } else {
            request.prompt.clone()
        };

        match request.allowed_values.as_slice() {
            [] => lead,
            values => format!("{} Please specify: {}.", lead, join_choices(values)),
        }
    }
}

#[async_trait]
impl QuestionGenerator for TemplateQuestions {
    async fn ask(&self, request: &QuestionRequest) -> ChatResult<String> {
        Ok(self.phrase(request))
    }
}

/// "a", "a or b", "a, b, or c"
fn join_choices(values: &[String]) -> String {
    match values {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{} or {}", first, second),
        [init @ .., last] => format!("{}, or {}", init.join(", "), last),
    }
}
