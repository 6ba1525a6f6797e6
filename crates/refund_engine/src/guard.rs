//! Edge guards: pure predicates over facts and profile fields.

use serde::{Deserialize, Serialize};

use crate::fact::{FactLookup, FactValue};

/// A boolean predicate attached to a graph edge.
///
/// Guards never have side effects. A comparison against a fact that is not
/// known yet evaluates to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Guard {
    #[default]
    Always,
    Equals {
        fact: String,
        value: FactValue,
    },
    OneOf {
        fact: String,
        values: Vec<FactValue>,
    },
    AtLeast {
        fact: String,
        value: i64,
    },
    AtMost {
        fact: String,
        value: i64,
    },
    All {
        guards: Vec<Guard>,
    },
    Any {
        guards: Vec<Guard>,
    },
    Not {
        guard: Box<Guard>,
    },
}

impl Guard {
    pub fn equals(fact: impl Into<String>, value: impl Into<FactValue>) -> Self {
        Guard::Equals {
            fact: fact.into(),
            value: value.into(),
        }
    }

    pub fn one_of<I, V>(fact: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FactValue>,
    {
        Guard::OneOf {
            fact: fact.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn evaluate(&self, facts: &dyn FactLookup) -> bool {
        match self {
            Guard::Always => true,
            Guard::Equals { fact, value } => facts.lookup(fact).as_ref() == Some(value),
            Guard::OneOf { fact, values } => facts
                .lookup(fact)
                .map_or(false, |v| values.contains(&v)),
            Guard::AtLeast { fact, value } => facts
                .lookup(fact)
                .and_then(|v| v.as_integer())
                .map_or(false, |n| n >= *value),
            Guard::AtMost { fact, value } => facts
                .lookup(fact)
                .and_then(|v| v.as_integer())
                .map_or(false, |n| n <= *value),
            Guard::All { guards } => guards.iter().all(|g| g.evaluate(facts)),
            Guard::Any { guards } => guards.iter().any(|g| g.evaluate(facts)),
            Guard::Not { guard } => !guard.evaluate(facts),
        }
    }

    /// Fact keys the guard reads, in first-seen order without duplicates.
    pub fn facts(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_facts(&mut keys);
        keys
    }

    fn collect_facts<'a>(&'a self, keys: &mut Vec<&'a str>) {
        match self {
            Guard::Always => {}
            Guard::Equals { fact, .. }
            | Guard::OneOf { fact, .. }
            | Guard::AtLeast { fact, .. }
            | Guard::AtMost { fact, .. } => {
                if !keys.contains(&fact.as_str()) {
                    keys.push(fact.as_str());
                }
            }
            Guard::All { guards } | Guard::Any { guards } => {
                for g in guards {
                    g.collect_facts(keys);
                }
            }
            Guard::Not { guard } => guard.collect_facts(keys),
        }
    }

    /// Mutable access to every literal compared against a fact, so graph
    /// validation can canonicalize them.
    pub(crate) fn literals_mut(&mut self) -> Vec<(&str, &mut FactValue)> {
        let mut out = Vec::new();
        self.collect_literals(&mut out);
        out
    }

    fn collect_literals<'a>(&'a mut self, out: &mut Vec<(&'a str, &'a mut FactValue)>) {
        match self {
            Guard::Equals { fact, value } => out.push((fact.as_str(), value)),
            Guard::OneOf { fact, values } => {
                let fact = fact.as_str();
                for v in values.iter_mut() {
                    out.push((fact, v));
                }
            }
            Guard::All { guards } | Guard::Any { guards } => {
                for g in guards.iter_mut() {
                    g.collect_literals(out);
                }
            }
            Guard::Not { guard } => guard.collect_literals(out),
            Guard::Always | Guard::AtLeast { .. } | Guard::AtMost { .. } => {}
        }
    }

    /// Facts compared numerically by this guard.
    pub(crate) fn numeric_facts(&self) -> Vec<&str> {
        match self {
            Guard::AtLeast { fact, .. } | Guard::AtMost { fact, .. } => vec![fact.as_str()],
            Guard::All { guards } | Guard::Any { guards } => {
                guards.iter().flat_map(|g| g.numeric_facts()).collect()
            }
            Guard::Not { guard } => guard.numeric_facts(),
            _ => Vec::new(),
        }
    }
}
