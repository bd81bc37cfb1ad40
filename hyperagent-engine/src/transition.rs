//! The transition evaluator: `evaluate(condition, scope) -> bool`.
//!
//! `Condition` is a structured predicate tree rather than a string
//! expression language, so there is no parsing step here, only a
//! straightforward recursive walk.

use regex::Regex;
use serde_json::Value;

use hyperagent_types::{Comparator, Condition, Leaf};

use crate::scope::Scope;

/// Evaluates `condition` against `scope`. Pure; never fails. A comparator
/// applied to an incompatible type (e.g. `gt` on a string) simply evaluates
/// to `false` rather than erroring, and a missing path resolves to
/// undefined, which no comparator matches.
pub fn evaluate(condition: &Condition, scope: &Scope) -> bool {
    match condition {
        Condition::Always(_) => true,
        Condition::All { all } => all.iter().all(|c| evaluate(c, scope)),
        Condition::Any { any } => any.iter().any(|c| evaluate(c, scope)),
        Condition::Not { not } => !evaluate(not, scope),
        Condition::Leaf(leaf) => evaluate_leaf(leaf, scope),
    }
}

fn evaluate_leaf(leaf: &Leaf, scope: &Scope) -> bool {
    let resolved = scope.resolve_path(&leaf.field).filter(|v| !v.is_null());

    match &leaf.comparator {
        Comparator::Exists(expected) => resolved.is_some() == *expected,
        Comparator::Absent(expected) => resolved.is_none() == *expected,
        Comparator::Equals(expected) => resolved.as_ref() == Some(expected),
        Comparator::Includes(expected) => match &resolved {
            Some(Value::Array(items)) => items.contains(expected),
            Some(Value::String(s)) => expected.as_str().is_some_and(|needle| s.contains(needle)),
            _ => false,
        },
        Comparator::In(list) => resolved.as_ref().is_some_and(|v| list.contains(v)),
        Comparator::Matches(pattern) => match (&resolved, Regex::new(pattern)) {
            (Some(Value::String(s)), Ok(re)) => re.is_match(s),
            _ => false,
        },
        Comparator::Gt(n) => numeric(&resolved).is_some_and(|v| v > *n),
        Comparator::Ge(n) => numeric(&resolved).is_some_and(|v| v >= *n),
        Comparator::Lt(n) => numeric(&resolved).is_some_and(|v| v < *n),
        Comparator::Le(n) => numeric(&resolved).is_some_and(|v| v <= *n),
    }
}

fn numeric(value: &Option<Value>) -> Option<f64> {
    value.as_ref().and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope_with_parsed(parsed: Value) -> Scope {
        let mut scope = Scope::new(json!({}), "run-1", 5);
        scope.parsed = Some(parsed);
        scope
    }

    fn leaf_condition(field: &str, comparator: Comparator) -> Condition {
        Condition::Leaf(Leaf { field: field.to_string(), comparator })
    }

    #[test]
    fn always_is_always_true() {
        let scope = Scope::new(json!({}), "run-1", 1);
        let cond: Condition = serde_json::from_str("\"always\"").unwrap();
        assert!(evaluate(&cond, &scope));
    }

    #[test]
    fn equals_matches_parsed_status() {
        let scope = scope_with_parsed(json!({"status": "approve"}));
        let cond = leaf_condition("parsed.status", Comparator::Equals(json!("approve")));
        assert!(evaluate(&cond, &scope));
    }

    #[test]
    fn missing_path_fails_every_comparator_except_absent() {
        let scope = Scope::new(json!({}), "run-1", 1);
        assert!(evaluate(&leaf_condition("state.missing", Comparator::Absent(true)), &scope));
        assert!(!evaluate(&leaf_condition("state.missing", Comparator::Exists(true)), &scope));
        assert!(!evaluate(&leaf_condition("state.missing", Comparator::Gt(0.0)), &scope));
    }

    #[test]
    fn numeric_comparators_compare_as_floats() {
        let scope = scope_with_parsed(json!({"retries": 3}));
        assert!(evaluate(&leaf_condition("parsed.retries", Comparator::Ge(3.0)), &scope));
        assert!(!evaluate(&leaf_condition("parsed.retries", Comparator::Lt(3.0)), &scope));
    }

    #[test]
    fn includes_checks_array_membership_and_substrings() {
        let scope = scope_with_parsed(json!({"tags": ["a", "b"], "text": "hello world"}));
        assert!(evaluate(&leaf_condition("parsed.tags", Comparator::Includes(json!("b"))), &scope));
        assert!(evaluate(&leaf_condition("parsed.text", Comparator::Includes(json!("world"))), &scope));
    }

    #[test]
    fn composites_short_circuit_correctly() {
        let scope = scope_with_parsed(json!({"a": 1, "b": 2}));
        let any = Condition::Any {
            any: vec![
                leaf_condition("parsed.a", Comparator::Gt(5.0)),
                leaf_condition("parsed.b", Comparator::Gt(1.0)),
            ],
        };
        assert!(evaluate(&any, &scope));

        let all = Condition::All {
            all: vec![
                leaf_condition("parsed.a", Comparator::Gt(0.0)),
                leaf_condition("parsed.b", Comparator::Gt(5.0)),
            ],
        };
        assert!(!evaluate(&all, &scope));
    }

    #[test]
    fn not_inverts_its_child() {
        let scope = scope_with_parsed(json!({"a": 1}));
        let cond = Condition::Not { not: Box::new(leaf_condition("parsed.a", Comparator::Gt(5.0))) };
        assert!(evaluate(&cond, &scope));
    }
}
