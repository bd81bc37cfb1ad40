//! The transform executor: a pure data reshape with no external side
//! effects (SPEC_FULL.md §4.5, "Transform executor").

use serde_json::Value;

use hyperagent_types::ParserSchema;

use crate::error::WorkflowError;
use crate::scope::Scope;
use crate::template::render_tree;

pub fn execute(
    template: &Value,
    input: Option<&Value>,
    input_schema: Option<&ParserSchema>,
    scope: &Scope,
) -> Result<(String, Value), WorkflowError> {
    let validated_input = match (input, input_schema) {
        (Some(value), Some(schema)) => Some(
            schema
                .validate(value)
                .map_err(|e| WorkflowError::Template(format!("transform input failed validation: {e}")))?,
        ),
        (Some(value), None) => Some(value.clone()),
        (None, _) => None,
    };

    let augmented_scope = match validated_input {
        Some(value) => scope.with_current(scope.parsed.clone(), Some(value)),
        None => scope.clone(),
    };

    let rendered = render_tree(template, &augmented_scope)?;
    let raw = serde_json::to_string(&rendered).map_err(|e| WorkflowError::Template(e.to_string()))?;
    Ok((raw, rendered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_template_tree_over_scope() {
        let mut scope = Scope::new(json!({}), "run-1", 1);
        scope.state.insert("count".to_string(), "3".to_string());
        let template = json!({"label": "total: {{state.count}}"});
        let (raw, parsed) = execute(&template, None, None, &scope).unwrap();
        assert_eq!(parsed, json!({"label": "total: 3"}));
        assert_eq!(raw, serde_json::to_string(&parsed).unwrap());
    }

    #[test]
    fn augments_scope_with_validated_input_as_args() {
        let scope = Scope::new(json!({}), "run-1", 1);
        let template = json!("hello {{args.name}}");
        let (_, parsed) = execute(&template, Some(&json!({"name": "bob"})), None, &scope).unwrap();
        assert_eq!(parsed, json!("hello bob"));
    }
}
