//! Construction-time validation of decision graphs.
//!
//! Every check runs and every violation is collected; a graph is only
//! built when the error list is empty.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::fact::{FactDomain, Vocabulary};
use crate::graph::{DecisionNode, Edge, GraphDefinition};
use crate::template;

/// Errors and warnings found in a graph definition.
#[derive(Debug, Default, Clone)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Validates graph definitions against a fact vocabulary.
pub struct GraphValidator<'a> {
    vocabulary: &'a Vocabulary,
}

impl<'a> GraphValidator<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Check a definition, rewriting guard literals to canonical form.
    pub fn validate(&self, definition: &mut GraphDefinition) -> ValidationReport {
        let mut report = ValidationReport::new();

        if definition.nodes.is_empty() {
            report.add_error(format!("Graph '{}' has no nodes", definition.id));
            return report;
        }

        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, node) in definition.nodes.iter().enumerate() {
            if index.contains_key(node.id()) {
                report.add_error(format!("Duplicate node id '{}'", node.id()));
            } else {
                index.insert(node.id().to_string(), i);
            }
        }

        for node in definition.nodes.iter_mut() {
            self.check_node(node, &mut report);
        }

        let mut structural_ok = true;
        if !index.contains_key(&definition.root) {
            report.add_error(format!("Root node '{}' does not exist", definition.root));
            structural_ok = false;
        }
        for node in &definition.nodes {
            for edge in node.edges() {
                if !index.contains_key(&edge.to) {
                    report.add_error(format!(
                        "Node '{}' has an edge to unknown node '{}'",
                        node.id(),
                        edge.to
                    ));
                    structural_ok = false;
                }
            }
        }

        if structural_ok {
            Self::check_reachability(definition, &index, &mut report);
            Self::check_paths(definition, &index, &mut report);
        }

        report
    }

    fn check_node(&self, node: &mut DecisionNode, report: &mut ValidationReport) {
        match node {
            DecisionNode::Question(question) => {
                let node_id = question.id.clone();
                let own_domain = match self.vocabulary.get(&question.fact) {
                    Some(spec) => Some(spec.domain.clone()),
                    None => {
                        report.add_error(format!(
                            "Question node '{}' requires unknown fact '{}'",
                            node_id, question.fact
                        ));
                        None
                    }
                };

                if question.edges.is_empty() {
                    report.add_error(format!("Question node '{}' has no edges", node_id));
                    return;
                }

                for edge in question.edges.iter_mut() {
                    for key in edge.when.facts() {
                        if !self.vocabulary.contains(key) {
                            report.add_error(format!(
                                "Guard on '{}' -> '{}' references unknown fact '{}'",
                                node_id, edge.to, key
                            ));
                        }
                    }
                    for key in edge.when.numeric_facts() {
                        if let Some(spec) = self.vocabulary.get(key) {
                            if !matches!(spec.domain, FactDomain::Integer { .. }) {
                                report.add_error(format!(
                                    "Guard on '{}' -> '{}' compares non-integer fact '{}' numerically",
                                    node_id, edge.to, key
                                ));
                            }
                        }
                    }

                    let target = edge.to.clone();
                    for (key, literal) in edge.when.literals_mut() {
                        let Some(spec) = self.vocabulary.get(key) else {
                            continue;
                        };
                        match spec.domain.normalize(key, &literal.to_raw()) {
                            Ok(canonical) => *literal = canonical,
                            Err(_) => report.add_error(format!(
                                "Guard on '{}' -> '{}' compares '{}' with '{}', outside its domain ({})",
                                node_id,
                                target,
                                key,
                                literal,
                                spec.domain.describe()
                            )),
                        }
                    }
                }

                if let Some(domain) = own_domain {
                    Self::check_coverage(&node_id, &question.fact, &domain, &question.edges, report);
                }
            }
            DecisionNode::Terminal(terminal) => {
                if terminal.reason.trim().is_empty() {
                    report.add_warning(format!("Terminal node '{}' has no reason", terminal.id));
                }
                for key in template::placeholders(&terminal.reason) {
                    if !self.vocabulary.contains(key) {
                        report.add_error(format!(
                            "Terminal node '{}' reason references unknown fact '{}'",
                            terminal.id, key
                        ));
                    }
                }
            }
        }
    }

    /// Every value of a finite domain must select some edge, when the
    /// node's guards read only the node's own fact.
    fn check_coverage(
        node_id: &str,
        fact: &str,
        domain: &FactDomain,
        edges: &[Edge],
        report: &mut ValidationReport,
    ) {
        let own_fact_only = edges
            .iter()
            .all(|e| e.when.facts().iter().all(|k| *k == fact));

        let Some(values) = domain.finite_values() else {
            return;
        };
        if !own_fact_only {
            report.add_warning(format!(
                "Coverage of '{}' not checked: guards read facts other than '{}'",
                node_id, fact
            ));
            return;
        }

        for value in values {
            let mut facts = BTreeMap::new();
            facts.insert(fact.to_string(), value.clone());
            if !edges.iter().any(|e| e.when.evaluate(&facts)) {
                report.add_error(format!(
                    "Question node '{}' has no edge for {} = {}",
                    node_id, fact, value
                ));
            }
        }
    }

    fn check_reachability(
        definition: &GraphDefinition,
        index: &HashMap<String, usize>,
        report: &mut ValidationReport,
    ) {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        seen.insert(definition.root.as_str());
        queue.push_back(definition.root.as_str());

        while let Some(id) = queue.pop_front() {
            let Some(&i) = index.get(id) else { continue };
            for edge in definition.nodes[i].edges() {
                if seen.insert(edge.to.as_str()) {
                    queue.push_back(edge.to.as_str());
                }
            }
        }

        for node in &definition.nodes {
            if !seen.contains(node.id()) {
                report.add_error(format!(
                    "Node '{}' is not reachable from root '{}'",
                    node.id(),
                    definition.root
                ));
            }
        }
    }

    fn check_paths(
        definition: &GraphDefinition,
        index: &HashMap<String, usize>,
        report: &mut ValidationReport,
    ) {
        Self::check_cycles(definition, index, report);
        Self::check_repeated_facts(definition, index, report);
    }

    /// Three-colour depth-first search from the root.
    fn check_cycles(
        definition: &GraphDefinition,
        index: &HashMap<String, usize>,
        report: &mut ValidationReport,
    ) {
        let Some(&root) = index.get(definition.root.as_str()) else {
            return;
        };
        let mut marks = vec![Mark::White; definition.nodes.len()];
        let mut stack: Vec<&str> = Vec::new();
        let mut found: BTreeSet<String> = BTreeSet::new();
        Self::visit(definition, index, root, &mut marks, &mut stack, &mut found);
        for message in found {
            report.add_error(message);
        }
    }

    fn visit<'g>(
        definition: &'g GraphDefinition,
        index: &HashMap<String, usize>,
        i: usize,
        marks: &mut [Mark],
        stack: &mut Vec<&'g str>,
        found: &mut BTreeSet<String>,
    ) {
        marks[i] = Mark::Grey;
        stack.push(definition.nodes[i].id());

        for edge in definition.nodes[i].edges() {
            let Some(&j) = index.get(edge.to.as_str()) else {
                continue;
            };
            match marks[j] {
                Mark::White => Self::visit(definition, index, j, marks, stack, found),
                Mark::Grey => {
                    let start = stack.iter().position(|id| *id == edge.to).unwrap_or(0);
                    found.insert(format!(
                        "Cycle detected: {} -> {}",
                        stack[start..].join(" -> "),
                        edge.to
                    ));
                }
                Mark::Black => {}
            }
        }

        stack.pop();
        marks[i] = Mark::Black;
    }

    /// A question's fact must not be asked again by any node below it.
    ///
    /// One breadth-first search per question node; the reported path is the
    /// shortest one from the first asker to the repeat.
    fn check_repeated_facts(
        definition: &GraphDefinition,
        index: &HashMap<String, usize>,
        report: &mut ValidationReport,
    ) {
        for (start, node) in definition.nodes.iter().enumerate() {
            let DecisionNode::Question(asker) = node else {
                continue;
            };

            let mut parent: HashMap<usize, usize> = HashMap::new();
            let mut queue: VecDeque<usize> = VecDeque::new();
            let enqueue = |from: usize,
                           to: &str,
                           parent: &mut HashMap<usize, usize>,
                           queue: &mut VecDeque<usize>| {
                if let Some(&j) = index.get(to) {
                    if j != start && !parent.contains_key(&j) {
                        parent.insert(j, from);
                        queue.push_back(j);
                    }
                }
            };

            for edge in &asker.edges {
                enqueue(start, edge.to.as_str(), &mut parent, &mut queue);
            }

            while let Some(i) = queue.pop_front() {
                let current = &definition.nodes[i];
                if let DecisionNode::Question(repeat) = current {
                    if repeat.fact == asker.fact {
                        let mut path = vec![repeat.id.as_str()];
                        let mut at = i;
                        while let Some(&p) = parent.get(&at) {
                            path.push(definition.nodes[p].id());
                            if p == start {
                                break;
                            }
                            at = p;
                        }
                        path.reverse();
                        report.add_error(format!(
                            "Fact '{}' is required again at '{}' on path {}",
                            repeat.fact,
                            repeat.id,
                            path.join(" -> ")
                        ));
                        continue;
                    }
                }
                for edge in current.edges() {
                    enqueue(i, edge.to.as_str(), &mut parent, &mut queue);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Grey,
    Black,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{QuestionNode, TerminalNode};
    use crate::guard::Guard;
    use crate::outcome::Outcome;

    fn question(id: &str, fact: &str, edges: Vec<Edge>) -> DecisionNode {
        DecisionNode::Question(QuestionNode {
            id: id.to_string(),
            fact: fact.to_string(),
            prompt: String::new(),
            edges,
        })
    }

    fn terminal(id: &str, outcome: Outcome) -> DecisionNode {
        DecisionNode::Terminal(TerminalNode {
            id: id.to_string(),
            outcome,
            reason: format!("{} reached", id),
        })
    }

    fn definition(root: &str, nodes: Vec<DecisionNode>) -> GraphDefinition {
        GraphDefinition {
            id: "test".to_string(),
            name: String::new(),
            description: String::new(),
            root: root.to_string(),
            nodes,
        }
    }

    fn validate(mut def: GraphDefinition) -> ValidationReport {
        let vocab = Vocabulary::standard();
        GraphValidator::new(&vocab).validate(&mut def)
    }

    #[test]
    fn test_valid_graph() {
        let report = validate(definition(
            "Delivered",
            vec![
                question(
                    "Delivered",
                    "delivered",
                    vec![
                        Edge::new(Guard::equals("delivered", true), "Approved"),
                        Edge::new(Guard::equals("delivered", "No"), "Pending"),
                    ],
                ),
                terminal("Approved", Outcome::RefundApproved),
                terminal("Pending", Outcome::RefundDeniedDeliveryPending),
            ],
        ));
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn test_collects_all_violations() {
        let report = validate(definition(
            "Start",
            vec![
                question(
                    "Condition",
                    "item_condition",
                    vec![
                        Edge::new(Guard::equals("item_condition", "wet"), "Nowhere"),
                        Edge::new(Guard::equals("colour", "red"), "Done"),
                    ],
                ),
                question("Mystery", "favourite_colour", vec![]),
                terminal("Done", Outcome::RefundApproved),
                terminal("Done", Outcome::RefundApproved),
            ],
        ));

        let errors = report.errors.join("\n");
        assert!(errors.contains("Duplicate node id 'Done'"));
        assert!(errors.contains("Root node 'Start' does not exist"));
        assert!(errors.contains("unknown node 'Nowhere'"));
        assert!(errors.contains("unknown fact 'colour'"));
        assert!(errors.contains("outside its domain"));
        assert!(errors.contains("requires unknown fact 'favourite_colour'"));
        assert!(errors.contains("'Mystery' has no edges"));
        assert!(report.errors.len() >= 7);
    }

    #[test]
    fn test_unreachable_node() {
        let report = validate(definition(
            "Delivered",
            vec![
                question(
                    "Delivered",
                    "delivered",
                    vec![Edge::new(Guard::Always, "Approved")],
                ),
                terminal("Approved", Outcome::RefundApproved),
                terminal("Orphan", Outcome::ManualReview),
            ],
        ));
        assert_eq!(
            report.errors,
            vec!["Node 'Orphan' is not reachable from root 'Delivered'"]
        );
    }

    #[test]
    fn test_cycle_detected() {
        let report = validate(definition(
            "A",
            vec![
                question("A", "delivered", vec![Edge::new(Guard::Always, "B")]),
                question("B", "item_returnable", vec![Edge::new(Guard::Always, "A")]),
            ],
        ));
        assert!(report.errors.iter().any(|e| e.starts_with("Cycle detected: A -> B -> A")));
    }

    /// Boolean questions `Step0..StepN`, each with both answers leading to
    /// the next step, so every step rejoins the previous fork.
    fn diamond_chain(steps: usize, last_fact: Option<&str>) -> (Vocabulary, GraphDefinition) {
        let mut vocab = Vocabulary::new();
        let mut nodes = Vec::new();
        for i in 0..steps {
            let fact = match last_fact {
                Some(fact) if i + 1 == steps => fact.to_string(),
                _ => format!("step_{}", i),
            };
            vocab.add(crate::fact::FactSpec::conversation(
                fact.clone(),
                FactDomain::Boolean,
            ));
            let next = if i + 1 == steps {
                "Done".to_string()
            } else {
                format!("Step{}", i + 1)
            };
            nodes.push(question(
                &format!("Step{}", i),
                &fact,
                vec![
                    Edge::new(Guard::equals(fact.as_str(), true), next.as_str()),
                    Edge::new(Guard::equals(fact.as_str(), false), next.as_str()),
                ],
            ));
        }
        nodes.push(terminal("Done", Outcome::RefundApproved));
        (vocab, definition("Step0", nodes))
    }

    #[test]
    fn test_deep_diamond_chain_validates_quickly() {
        let (vocab, mut def) = diamond_chain(64, None);
        let started = std::time::Instant::now();
        let report = GraphValidator::new(&vocab).validate(&mut def);
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_repeat_at_bottom_of_diamond_chain() {
        let (vocab, mut def) = diamond_chain(64, Some("step_0"));
        let started = std::time::Instant::now();
        let report = GraphValidator::new(&vocab).validate(&mut def);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(report.errors.len(), 1, "{:?}", report.errors);
        assert!(report.errors[0].starts_with("Fact 'step_0' is required again at 'Step63' on path Step0 -> Step1"));
        assert!(report.errors[0].ends_with("Step62 -> Step63"));
    }

    #[test]
    fn test_cycle_reported_once_below_rejoining_branches() {
        let report = validate(definition(
            "A",
            vec![
                question(
                    "A",
                    "delivered",
                    vec![
                        Edge::new(Guard::equals("delivered", true), "B"),
                        Edge::new(Guard::equals("delivered", false), "B"),
                    ],
                ),
                question("B", "item_returnable", vec![Edge::new(Guard::Always, "C")]),
                question("C", "item_category", vec![Edge::new(Guard::Always, "B")]),
            ],
        ));
        let cycles: Vec<_> = report
            .errors
            .iter()
            .filter(|e| e.starts_with("Cycle detected"))
            .collect();
        assert_eq!(cycles, vec!["Cycle detected: B -> C -> B"]);
    }

    #[test]
    fn test_fact_required_twice_on_path() {
        let report = validate(definition(
            "A",
            vec![
                question("A", "delivered", vec![Edge::new(Guard::Always, "B")]),
                question("B", "delivered", vec![Edge::new(Guard::Always, "Done")]),
                terminal("Done", Outcome::RefundApproved),
            ],
        ));
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("Fact 'delivered' is required again at 'B'")));
    }

    #[test]
    fn test_incomplete_coverage() {
        let report = validate(definition(
            "Shipping",
            vec![
                question(
                    "Shipping",
                    "shipping_issue",
                    vec![
                        Edge::new(Guard::equals("shipping_issue", "Lost"), "Lost"),
                        Edge::new(Guard::equals("shipping_issue", "Delayed"), "Review"),
                    ],
                ),
                terminal("Lost", Outcome::RefundApprovedLostInTransit),
                terminal("Review", Outcome::ManualReviewShipping),
            ],
        ));
        assert_eq!(
            report.errors,
            vec!["Question node 'Shipping' has no edge for shipping_issue = Neither"]
        );
    }

    #[test]
    fn test_numeric_guard_on_text_fact() {
        let report = validate(definition(
            "Tier",
            vec![
                question(
                    "Tier",
                    "loyalty_tier",
                    vec![
                        Edge::new(
                            Guard::AtLeast {
                                fact: "loyalty_tier".to_string(),
                                value: 2,
                            },
                            "Done",
                        ),
                        Edge::new(Guard::Always, "Done"),
                    ],
                ),
                terminal("Done", Outcome::RefundApproved),
            ],
        ));
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("compares non-integer fact 'loyalty_tier' numerically")));
    }

    #[test]
    fn test_literals_canonicalized() {
        let mut def = definition(
            "Pay",
            vec![
                question(
                    "Pay",
                    "payment_method",
                    vec![
                        Edge::new(Guard::one_of("payment_method", ["creditcard", "PREPAID"]), "Done"),
                        Edge::new(Guard::Always, "Done"),
                    ],
                ),
                terminal("Done", Outcome::RefundApproved),
            ],
        );
        let vocab = Vocabulary::standard();
        let report = GraphValidator::new(&vocab).validate(&mut def);
        assert!(report.is_valid());

        let DecisionNode::Question(q) = &def.nodes[0] else {
            panic!("expected question node");
        };
        assert_eq!(q.edges[0].when, Guard::one_of("payment_method", ["CreditCard", "Prepaid"]));
    }

    #[test]
    fn test_reason_placeholders_checked() {
        let report = validate(definition(
            "Done",
            vec![DecisionNode::Terminal(TerminalNode {
                id: "Done".to_string(),
                outcome: Outcome::RefundApproved,
                reason: "Refund to {card_number}".to_string(),
            })],
        ));
        assert_eq!(
            report.errors,
            vec!["Terminal node 'Done' reason references unknown fact 'card_number'"]
        );
    }
}
