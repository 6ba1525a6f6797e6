//! Terminal refund outcomes.

use serde::{Deserialize, Serialize};

/// The closed set of decisions a terminal node can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    RefundApproved,
    RefundApprovedLostInTransit,
    PartialRefund,
    PartialRefundGiftCard,
    ManualReview,
    ManualReviewShipping,
    RefundDeniedAccountIssue,
    RefundDeniedFraudFlag,
    RefundDeniedPerishable,
    RefundDeniedDigital,
    RefundDeniedNonReturnable,
    RefundDeniedWindowExpired,
    RefundDeniedDeliveryPending,
    RefundDeniedInHousePolicy,
    RefundDeniedThirdParty,
    RefundDeniedBnplTerms,
    RefundDeniedAfterReview,
    RefundDeniedShippingDelay,
}

/// Coarse grouping used for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    Approved,
    Denied,
    Partial,
    ManualReview,
}

impl Outcome {
    /// Every outcome, in declaration order.
    pub const ALL: [Outcome; 18] = [
        Outcome::RefundApproved,
        Outcome::RefundApprovedLostInTransit,
        Outcome::PartialRefund,
        Outcome::PartialRefundGiftCard,
        Outcome::ManualReview,
        Outcome::ManualReviewShipping,
        Outcome::RefundDeniedAccountIssue,
        Outcome::RefundDeniedFraudFlag,
        Outcome::RefundDeniedPerishable,
        Outcome::RefundDeniedDigital,
        Outcome::RefundDeniedNonReturnable,
        Outcome::RefundDeniedWindowExpired,
        Outcome::RefundDeniedDeliveryPending,
        Outcome::RefundDeniedInHousePolicy,
        Outcome::RefundDeniedThirdParty,
        Outcome::RefundDeniedBnplTerms,
        Outcome::RefundDeniedAfterReview,
        Outcome::RefundDeniedShippingDelay,
    ];

    /// Human-readable label, as shown to agents and customers.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::RefundApproved => "Refund Approved",
            Outcome::RefundApprovedLostInTransit => "Refund Approved: Lost in transit",
            Outcome::PartialRefund => "Partial Refund Approved",
            Outcome::PartialRefundGiftCard => "Partial Refund to Gift Card Balance",
            Outcome::ManualReview => "Manual Review Required",
            Outcome::ManualReviewShipping => "Manual Review: Shipping delayed",
            Outcome::RefundDeniedAccountIssue => "Refund Denied: Account issue",
            Outcome::RefundDeniedFraudFlag => "Refund Denied: Fraud flag",
            Outcome::RefundDeniedPerishable => "Refund Denied: Perishable items not returnable",
            Outcome::RefundDeniedDigital => "Refund Denied: Digital goods not refundable",
            Outcome::RefundDeniedNonReturnable => "Refund Denied: Non-returnable item",
            Outcome::RefundDeniedWindowExpired => "Refund Denied: Return window expired",
            Outcome::RefundDeniedDeliveryPending => "Refund Denied: Delivery pending",
            Outcome::RefundDeniedInHousePolicy => "Refund Denied: In-house policy",
            Outcome::RefundDeniedThirdParty => "Refund Denied: Third-party restriction",
            Outcome::RefundDeniedBnplTerms => "Refund Denied: BNPL terms restrict refunds",
            Outcome::RefundDeniedAfterReview => "Refund Denied after manual review",
            Outcome::RefundDeniedShippingDelay => "Refund Denied: Shipping delay insufficient",
        }
    }

    pub fn category(&self) -> OutcomeCategory {
        match self {
            Outcome::RefundApproved | Outcome::RefundApprovedLostInTransit => {
                OutcomeCategory::Approved
            }
            Outcome::PartialRefund | Outcome::PartialRefundGiftCard => OutcomeCategory::Partial,
            Outcome::ManualReview | Outcome::ManualReviewShipping => OutcomeCategory::ManualReview,
            _ => OutcomeCategory::Denied,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
