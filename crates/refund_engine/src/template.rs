//! `{fact_key}` placeholder rendering for terminal reasons.

use std::sync::OnceLock;

use regex::Regex;

use crate::fact::FactLookup;

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{([a-z_][a-z0-9_]*)\}").ok())
        .as_ref()
}

/// Fact keys referenced by a template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let Some(pattern) = placeholder_pattern() else {
        return Vec::new();
    };
    let mut keys: Vec<&str> = Vec::new();
    for caps in pattern.captures_iter(template) {
        if let Some(key) = caps.get(1).map(|m| m.as_str()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

/// Fill placeholders from `facts`. Unknown values render as `unknown`.
pub fn render(template: &str, facts: &dyn FactLookup) -> String {
    let Some(pattern) = placeholder_pattern() else {
        return template.to_string();
    };
    pattern
        .replace_all(template, |caps: &regex::Captures| {
            facts
                .lookup(&caps[1])
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        })
        .into_owned()
}
