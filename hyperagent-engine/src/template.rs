//! The template renderer: `"{{" segment ("||" segment)* "}}"` expressions
//! evaluated over a [`Scope`]. Scans the raw text for delimiters and
//! splices in the resolved value, one expression at a time.

use path_pattern::PATH_SEGMENT;
use serde_json::Value;

use crate::error::WorkflowError;
use crate::scope::Scope;

enum Segment {
    Literal(String),
    Path(String),
}

/// Renders every `{{...}}` expression in `template` against `scope`,
/// leaving surrounding text untouched. Deterministic and side-effect-free.
pub fn render(template: &str, scope: &Scope) -> Result<String, WorkflowError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let Some(open) = rest.find("{{") else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            return Err(WorkflowError::Template(format!(
                "unterminated expression starting at {:?}",
                &rest[open..open + 2.min(rest.len() - open)]
            )));
        };
        let expression = &after_open[..close];
        out.push_str(&render_expression(expression, scope)?);
        rest = &after_open[close + 2..];
    }
    Ok(out)
}

/// Recursively renders every string leaf of an arbitrary JSON-like value.
pub fn render_tree(value: &Value, scope: &Scope) -> Result<Value, WorkflowError> {
    Ok(match value {
        Value::String(s) => Value::String(render(s, scope)?),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(render_tree(item, scope)?);
            }
            Value::Array(out)
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), render_tree(item, scope)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

fn render_expression(expression: &str, scope: &Scope) -> Result<String, WorkflowError> {
    for segment_text in split_top_level(expression) {
        let segment = parse_segment(segment_text.trim())?;
        match segment {
            Segment::Literal(text) => return Ok(text),
            Segment::Path(path) => {
                if let Some(value) = scope.resolve_path(&path) {
                    if value.is_null() {
                        continue;
                    }
                    if let Value::String(s) = &value {
                        if s.is_empty() {
                            continue;
                        }
                        return Ok(s.clone());
                    }
                    return Ok(canonical_json(&value));
                }
            }
        }
    }
    Ok(String::new())
}

/// Canonical JSON stringification: `serde_json::Value`'s default map
/// representation is already key-sorted (this crate does not enable
/// serde_json's `preserve_order` feature), so `to_string` is deterministic.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn parse_segment(segment: &str) -> Result<Segment, WorkflowError> {
    if let Some(stripped) = segment.strip_prefix('"') {
        let Some(body) = stripped.strip_suffix('"') else {
            return Err(WorkflowError::Template(format!("unterminated string literal: {segment}")));
        };
        return Ok(Segment::Literal(body.replace("\\\"", "\"")));
    }
    if !PATH_SEGMENT.is_match(segment) {
        return Err(WorkflowError::Template(format!("invalid path segment: {segment}")));
    }
    Ok(Segment::Path(segment.to_string()))
}

/// Splits `expression` on `||` that appear outside double-quoted literals.
fn split_top_level(expression: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let bytes = expression.as_bytes();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if !in_quotes && c == '|' && i + 1 < bytes.len() && bytes[i + 1] as char == '|' {
            parts.push(&expression[start..i]);
            i += 1;
            start = i + 1;
        }
        i += 1;
    }
    parts.push(&expression[start..]);
    parts
}

mod path_pattern {
    use regex::Regex;
    use std::sync::LazyLock;

    pub static PATH_SEGMENT: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*|\[[0-9]+\])*$").unwrap());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope_with_state(key: &str, value: &str) -> Scope {
        let mut scope = Scope::new(json!({}), "run-1", 1);
        scope.state.insert(key.to_string(), value.to_string());
        scope
    }

    #[test]
    fn renders_literal_passthrough() {
        let scope = Scope::new(json!({}), "run-1", 1);
        assert_eq!(render("no expressions here", &scope).unwrap(), "no expressions here");
    }

    #[test]
    fn renders_dotted_path() {
        let scope = scope_with_state("name", "alice");
        assert_eq!(render("hello {{state.name}}", &scope).unwrap(), "hello alice");
    }

    #[test]
    fn first_defined_non_empty_segment_wins() {
        let scope = scope_with_state("b", "present");
        assert_eq!(render("{{state.a||state.b||\"fallback\"}}", &scope).unwrap(), "present");
    }

    #[test]
    fn empty_path_value_is_skipped_but_empty_literal_is_not() {
        let mut scope = scope_with_state("a", "");
        scope.state.insert("a".to_string(), String::new());
        assert_eq!(render("{{state.a||\"\"}}", &scope).unwrap(), "");
        assert_eq!(render("{{state.a||\"fallback\"}}", &scope).unwrap(), "fallback");
    }

    #[test]
    fn non_string_values_stringify_canonically() {
        let scope = Scope::new(json!({"count": 3}), "run-1", 1);
        assert_eq!(render("{{user.count}}", &scope).unwrap(), "3");
    }

    #[test]
    fn unterminated_expression_is_a_template_error() {
        let scope = Scope::new(json!({}), "run-1", 1);
        assert!(render("{{state.missing", &scope).is_err());
    }

    #[test]
    fn render_tree_walks_nested_structures() {
        let scope = scope_with_state("name", "bob");
        let tree = json!({"greeting": "hi {{state.name}}", "list": ["{{state.name}}", 1]});
        let rendered = render_tree(&tree, &scope).unwrap();
        assert_eq!(rendered, json!({"greeting": "hi bob", "list": ["bob", 1]}));
    }

    #[test]
    fn rendering_is_deterministic() {
        let scope = scope_with_state("name", "carol");
        let once = render("{{state.name}}", &scope).unwrap();
        let twice = render("{{state.name}}", &scope).unwrap();
        assert_eq!(once, twice);
    }
}
