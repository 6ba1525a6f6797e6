//! Integration tests for refund conversations over the bundled graphs.

use std::fs;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::tempdir;

use refund_engine::{
    ConversationSession, CustomerProfile, DecisionGraph, DecisionNode, EngineError, FactValue,
    LoyaltyTier, NavState, Outcome, RawFacts, TurnOutcome, Vocabulary,
};

fn raw(pairs: &[(&str, Value)]) -> RawFacts {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn standard_graph() -> Arc<DecisionGraph> {
    Arc::new(DecisionGraph::standard().unwrap())
}

fn session_with(profile: CustomerProfile) -> ConversationSession {
    ConversationSession::with_profile(standard_graph(), profile).unwrap()
}

fn approved_path_facts() -> RawFacts {
    raw(&[
        ("item_category", json!("Physical")),
        ("item_returnable", json!(true)),
        ("item_condition", json!("damaged")),
        ("delivered", json!(true)),
        ("seller_type", json!("in-house")),
        ("in_house_policy", json!("Yes")),
        ("payment_method", json!("CreditCard")),
    ])
}

/// Damaged item from an in-house seller with all gates passed is approved.
#[test]
fn test_damaged_in_house_item_is_approved() {
    let mut session = session_with(CustomerProfile::new("CUST_1"));

    let outcome = session.submit_facts(&approved_path_facts()).unwrap();
    let decision = outcome.decision().expect("expected a decision");

    assert_eq!(decision.outcome, Outcome::RefundApproved);
    assert_eq!(
        decision.trail,
        vec![
            "CustStatus",
            "LoyaltyTier",
            "FraudCheck",
            "ReturnHistory",
            "ItemCategory",
            "ItemEligible",
            "ItemCondition",
            "SellerType",
            "InHousePolicy",
            "PaymentMethod",
            "RefundApproved",
        ]
    );
    assert!(decision.reason.contains("Is the seller third-party or in-house? In-house"));
    assert!(decision.reason.ends_with("original CreditCard payment."));
}

/// Undelivered items go through the shipping question declared in the graph.
#[test]
fn test_undelivered_item_lost_in_transit() {
    let mut session = session_with(CustomerProfile::new("CUST_2"));

    let outcome = session
        .submit_facts(&raw(&[
            ("item_category", json!("Physical")),
            ("item_returnable", json!("yes")),
            ("item_condition", json!("normal")),
            ("return_window", json!("within")),
            ("delivered", json!(false)),
        ]))
        .unwrap();
    assert_eq!(outcome.missing_fact(), Some("shipping_issue"));

    let outcome = session
        .submit_facts(&raw(&[("shipping_issue", json!("lost"))]))
        .unwrap();
    let decision = outcome.decision().unwrap();
    assert_eq!(decision.outcome, Outcome::RefundApprovedLostInTransit);
    assert_eq!(decision.label, "Refund Approved: Lost in transit");
    assert_eq!(decision.terminal_node, "RefundApprovedLost");
}

/// A fraud flag on a Gold account ends the conversation before any item question.
#[test]
fn test_fraud_flag_short_circuits() {
    let profile = CustomerProfile::new("CUST_3")
        .with_loyalty_tier(LoyaltyTier::Gold)
        .with_fraud_flag(true);
    let session = session_with(profile);

    let outcome = session.current_outcome();
    let decision = outcome.decision().expect("fraud flag should decide immediately");
    assert_eq!(decision.outcome, Outcome::RefundDeniedFraudFlag);
    assert_eq!(
        decision.trail,
        vec!["CustStatus", "LoyaltyTier", "FraudCheck", "RefundDenied2"]
    );
}

/// Item facts supplied before the profile do not delay the fraud decision.
#[test]
fn test_fraud_flag_with_item_facts_already_known() {
    let mut session = ConversationSession::new(standard_graph());
    let outcome = session.submit_facts(&approved_path_facts()).unwrap();
    assert_eq!(outcome.missing_fact(), Some("account_status"));

    session
        .attach_profile(CustomerProfile::new("CUST_3").with_fraud_flag(true))
        .unwrap();
    let outcome = session.current_outcome();
    assert_eq!(outcome.decision().unwrap().outcome, Outcome::RefundDeniedFraudFlag);
}

/// Item facts arriving after the fraud decision still get that decision back.
#[test]
fn test_fraud_flag_then_item_facts_returns_fraud_decision() {
    let profile = CustomerProfile::new("CUST_3")
        .with_loyalty_tier(LoyaltyTier::Gold)
        .with_fraud_flag(true);
    let mut session = session_with(profile);

    let outcome = session
        .submit_facts(&raw(&[
            ("item_category", json!("Physical")),
            ("item_condition", json!("damaged")),
        ]))
        .unwrap();
    let decision = outcome.decision().expect("fraud flag decides");
    assert_eq!(decision.outcome, Outcome::RefundDeniedFraudFlag);
    assert_eq!(decision.label, "Refund Denied: Fraud flag");
    assert_eq!(decision.terminal_node, "RefundDenied2");
}

/// Submitting the same facts twice in one session gives the same result.
#[test]
fn test_same_facts_twice_in_one_session() {
    let mut session = session_with(CustomerProfile::new("CUST_7"));
    let facts = raw(&[("item_category", json!("Digital"))]);

    let first = session.submit_facts(&facts).unwrap();
    let second = session.submit_facts(&facts).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        second.decision().map(|d| d.outcome),
        Some(Outcome::RefundDeniedDigital)
    );

    let mut session = session_with(CustomerProfile::new("CUST_7"));
    let first = session.submit_facts(&approved_path_facts()).unwrap();
    let second = session.submit_facts(&approved_path_facts()).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        second.decision().map(|d| d.outcome),
        Some(Outcome::RefundApproved)
    );
}

/// With everything but the item condition known, the session asks for it.
#[test]
fn test_missing_item_condition_is_requested() {
    let mut session = session_with(CustomerProfile::new("CUST_4"));
    let mut facts = approved_path_facts();
    facts.remove("item_condition");

    match session.submit_facts(&facts).unwrap() {
        TurnOutcome::NeedInfo {
            node_id,
            fact_key,
            allowed_values,
            ..
        } => {
            assert_eq!(node_id, "ItemCondition");
            assert_eq!(fact_key, "item_condition");
            assert_eq!(allowed_values, vec!["damaged", "defective", "normal"]);
        }
        other => panic!("expected NEED_INFO, got {:?}", other),
    }
}

/// Out-of-domain values are rejected and nothing is stored.
#[test]
fn test_out_of_domain_value_rejected() {
    let mut session = session_with(CustomerProfile::new("CUST_5"));
    session
        .submit_facts(&raw(&[("item_category", json!("Physical"))]))
        .unwrap();
    let before = session.status();

    let err = session
        .submit_facts(&raw(&[("item_condition", json!("wet"))]))
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidFactValue { .. }));
    assert!(err.is_recoverable());
    let after = session.status();
    assert_eq!(after.facts, before.facts);
    assert_eq!(after.current_node, before.current_node);
    assert!(!session.facts().has("item_condition"));
}

/// Reset after a decision returns to the root, keeps the profile and starts a
/// fresh trail.
#[test]
fn test_reset_after_decision() {
    let mut session = session_with(CustomerProfile::new("CUST_6"));
    session
        .submit_facts(&raw(&[("item_category", json!("Perishable"))]))
        .unwrap();
    assert!(session.state().is_finished());

    session.reset();
    assert!(session.facts().is_empty());
    assert_eq!(session.profile().unwrap().customer_id, "CUST_6");
    assert_eq!(session.navigator().trail()[0].node_id, "CustStatus");
    assert_eq!(session.current_outcome().missing_fact(), Some("item_category"));

    let outcome = session
        .submit_facts(&raw(&[("item_category", json!("Digital"))]))
        .unwrap();
    let decision = outcome.decision().unwrap();
    assert_eq!(decision.outcome, Outcome::RefundDeniedDigital);
    assert_eq!(decision.trail.first().map(String::as_str), Some("CustStatus"));
    assert!(!decision.trail.contains(&"RefundDenied3".to_string()));
}

#[test]
fn test_same_facts_give_same_trail_and_outcome() {
    let mut first = session_with(CustomerProfile::new("CUST_7"));
    let mut second = session_with(CustomerProfile::new("CUST_7"));

    let a = first.submit_facts(&approved_path_facts()).unwrap();
    let b = second.submit_facts(&approved_path_facts()).unwrap();
    assert_eq!(a, b);

    first.reset();
    let c = first.submit_facts(&approved_path_facts()).unwrap();
    assert_eq!(a, c);
}

#[test]
fn test_identical_resubmission_leaves_state_unchanged() {
    let mut session = session_with(CustomerProfile::new("CUST_8"));
    session
        .submit_facts(&raw(&[
            ("item_category", json!("Physical")),
            ("item_returnable", json!(true)),
        ]))
        .unwrap();
    let state = session.state().clone();
    let trail = session.navigator().trail().to_vec();

    session
        .submit_facts(&raw(&[("item_returnable", json!("Yes"))]))
        .unwrap();
    assert_eq!(session.state(), &state);
    assert_eq!(session.navigator().trail(), trail.as_slice());
}

#[test]
fn test_edge_selection_is_stable() {
    let graph = standard_graph();
    let session = session_with(CustomerProfile::new("CUST_9"));
    let node = graph.node("LoyaltyTier").unwrap();

    let first = graph.evaluate_edges(node, session.facts()).unwrap();
    for _ in 0..10 {
        let again = graph.evaluate_edges(node, session.facts()).unwrap();
        assert_eq!(again.index, first.index);
        assert_eq!(again.edge.to, first.edge.to);
    }
}

/// Every value of every question's own fact selects some edge.
#[test]
fn test_bundled_graphs_cover_every_answer() {
    for graph in [DecisionGraph::standard().unwrap(), DecisionGraph::review().unwrap()] {
        for node in graph.nodes() {
            let DecisionNode::Question(question) = node else {
                continue;
            };
            let domain = &graph.vocabulary().require(&question.fact).unwrap().domain;
            for value in domain.finite_values().unwrap() {
                let mut facts = std::collections::BTreeMap::new();
                facts.insert(question.fact.clone(), value.clone());
                assert!(
                    graph.evaluate_edges(node, &facts).is_some(),
                    "{} has no edge for {} = {}",
                    question.id,
                    question.fact,
                    value
                );
            }
        }
    }
}

#[test]
fn test_exported_trail_matches_hops() {
    let mut session = session_with(CustomerProfile::new("CUST_10"));
    session
        .submit_facts(&raw(&[
            ("item_category", json!("Physical")),
            ("item_returnable", json!(true)),
        ]))
        .unwrap();

    let record = session.export_trail();
    assert_eq!(record.node_ids().first().copied(), Some("CustStatus"));
    assert_eq!(record.node_ids().last().copied(), Some("ItemCondition"));
    assert_eq!(record.current_node, "ItemCondition");
    assert_eq!(record.trail.len() - 1, record.hops);
    assert_eq!(record.hops, session.navigator().hops());
    assert_eq!(record.state, "AWAITING_FACT");
    assert_eq!(record.customer_id.as_deref(), Some("CUST_10"));

    let returnable = &record.trail[5];
    assert_eq!(returnable.node_id, "ItemEligible");
    assert_eq!(returnable.fact_key.as_deref(), Some("item_returnable"));
    assert_eq!(returnable.value, Some(FactValue::Flag(true)));
    assert_eq!(returnable.edge_label.as_deref(), Some("Yes"));

    let json: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
    assert_eq!(json["trail"][0]["node_id"], "CustStatus");
    assert_eq!(json["facts"]["item_category"], "Physical");
}

#[test]
fn test_review_graph_final_decisions() {
    let graph = Arc::new(DecisionGraph::review().unwrap());

    let mut session = ConversationSession::new(Arc::clone(&graph));
    let outcome = session
        .submit_facts(&raw(&[
            ("review_type", json!("returns_abuse")),
            ("manual_review_outcome", json!("deny")),
        ]))
        .unwrap();
    assert_eq!(outcome.decision().unwrap().outcome, Outcome::RefundDeniedAfterReview);

    let mut session = ConversationSession::new(graph);
    let outcome = session
        .submit_facts(&raw(&[("review_type", json!("shipping_delay"))]))
        .unwrap();
    assert_eq!(outcome.missing_fact(), Some("shipping_review_outcome"));
    let outcome = session
        .submit_facts(&raw(&[("shipping_review_outcome", json!("Approve"))]))
        .unwrap();
    assert_eq!(outcome.decision().unwrap().outcome, Outcome::RefundApproved);
}

const GAPPY_GRAPH: &str = r#"
id: gappy
root: Delivered
nodes:
  - id: Delivered
    kind: question
    fact: delivered
    prompt: Has the item been delivered?
    edges:
      - when:
          op: all
          guards:
            - { op: equals, fact: delivered, value: true }
            - { op: equals, fact: item_condition, value: damaged }
        to: Approved
      - when: { op: equals, fact: delivered, value: false }
        to: Pending
  - id: Approved
    kind: terminal
    outcome: refund_approved
    reason: Approved.
  - id: Pending
    kind: terminal
    outcome: refund_denied_delivery_pending
    reason: Still in transit.
"#;

/// A fact combination no edge accepts surfaces as an error, not a guess.
#[test]
fn test_no_matching_edge_reports_stuck() {
    let graph =
        Arc::new(DecisionGraph::from_yaml_str(GAPPY_GRAPH, Arc::new(Vocabulary::standard())).unwrap());
    let mut session = ConversationSession::new(graph);

    let outcome = session
        .submit_facts(&raw(&[
            ("delivered", json!(true)),
            ("item_condition", json!("normal")),
        ]))
        .unwrap();

    match outcome {
        TurnOutcome::Error {
            kind,
            node_id,
            diagnostic,
            facts,
        } => {
            assert_eq!(kind, "STUCK");
            assert_eq!(node_id, "Delivered");
            assert!(diagnostic.contains("delivered = Yes"));
            assert_eq!(facts.get("item_condition"), Some(&FactValue::from("normal")));
        }
        other => panic!("expected ERROR, got {:?}", other),
    }
    assert!(matches!(session.state(), NavState::Stuck { .. }));
    assert!(matches!(
        session.submit_facts(&raw(&[("item_condition", json!("damaged"))])),
        Err(EngineError::TraversalFinished(_))
    ));
}

#[test]
fn test_graph_from_file_and_integrity_errors() {
    let temp = tempdir().unwrap();
    let good = temp.path().join("gappy.yaml");
    fs::write(&good, GAPPY_GRAPH).unwrap();
    let graph = DecisionGraph::from_file(&good, Arc::new(Vocabulary::standard())).unwrap();
    assert_eq!(graph.id(), "gappy");
    assert_eq!(graph.len(), 3);

    let broken = temp.path().join("broken.yaml");
    fs::write(
        &broken,
        GAPPY_GRAPH
            .replace("to: Pending", "to: Nowhere")
            .replace("fact: delivered\n    prompt", "fact: parcel_colour\n    prompt"),
    )
    .unwrap();
    match DecisionGraph::from_file(&broken, Arc::new(Vocabulary::standard())) {
        Err(EngineError::GraphIntegrity { violations }) => {
            assert!(violations.iter().any(|v| v.contains("unknown node 'Nowhere'")));
            assert!(violations.iter().any(|v| v.contains("unknown fact 'parcel_colour'")));
        }
        other => panic!("expected integrity error, got {:?}", other.map(|g| g.id().to_string())),
    }

    let missing = temp.path().join("missing.yaml");
    assert!(matches!(
        DecisionGraph::from_file(&missing, Arc::new(Vocabulary::standard())),
        Err(EngineError::Io(_))
    ));
}

#[test]
fn test_sessions_share_one_graph_across_threads() {
    let graph = standard_graph();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let graph = Arc::clone(&graph);
            std::thread::spawn(move || {
                let mut session =
                    ConversationSession::with_profile(graph, CustomerProfile::new(format!("T{}", i)))
                        .unwrap();
                let outcome = session.submit_facts(&approved_path_facts()).unwrap();
                outcome.decision().map(|d| d.outcome)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Some(Outcome::RefundApproved));
    }
}
