//! Workflow document validation and loading.
//!
//! Validates a document's non-empty identifier and steps and detects
//! duplicate step keys. This module uses an accumulating validator: every
//! structural problem in a document is collected and reported together,
//! since authors debugging a hand-written workflow document benefit from
//! seeing the whole problem list rather than one error at a time.

use std::collections::HashSet;

use hyperagent_types::{Step, WorkflowDocument};

use crate::error::WorkflowError;

/// Parses a document from JSON or YAML text, inferring the format by
/// trying JSON first and falling back to YAML.
pub fn load_document_str(text: &str) -> Result<WorkflowDocument, WorkflowError> {
    if let Ok(doc) = serde_json::from_str::<WorkflowDocument>(text) {
        return Ok(doc);
    }
    serde_yaml::from_str::<WorkflowDocument>(text)
        .map_err(|e| WorkflowError::schema(format!("failed to parse workflow document: {e}")))
}

/// Validates structural and referential integrity per SPEC_FULL.md §4.3.
/// Returns the document unchanged on success.
pub fn validate_document(document: WorkflowDocument) -> Result<WorkflowDocument, WorkflowError> {
    let mut problems = Vec::new();

    if document.id.trim().is_empty() {
        problems.push("document id must not be empty".to_string());
    }

    let mut seen_keys = HashSet::new();
    for step in &document.flow.round.steps {
        if !seen_keys.insert(step.key().to_string()) {
            problems.push(format!("duplicate step key '{}'", step.key()));
        }
        validate_step_references(step, &document, &mut problems);
    }

    if let Some(bootstrap) = &document.flow.bootstrap {
        validate_step_references(bootstrap, &document, &mut problems);
    }

    if let Some(start) = &document.flow.round.start {
        if !document.flow.round.steps.iter().any(|s| s.key() == start) {
            problems.push(format!("flow.round.start '{start}' does not name an existing step key"));
        }
    }

    if document.flow.round.default_outcome.outcome.trim().is_empty() {
        problems.push("flow.round.defaultOutcome.outcome must not be empty".to_string());
    }

    for declaration in &document.sessions.roles {
        if !document.roles.contains_key(&declaration.role) {
            problems.push(format!("sessions.roles references unknown role '{}'", declaration.role));
        }
    }

    for (role_name, role) in &document.roles {
        if !document.parsers.contains_key(&role.parser) {
            problems.push(format!("role '{role_name}' references unknown parser '{}'", role.parser));
        }
    }

    if !problems.is_empty() {
        return Err(WorkflowError::schema(problems.join("; ")));
    }

    Ok(document)
}

fn validate_step_references(step: &Step, document: &WorkflowDocument, problems: &mut Vec<String>) {
    if let Step::Agent { role, .. } = step {
        if !document.roles.contains_key(role) {
            problems.push(format!("step '{}' references unknown role '{role}'", step.key()));
        }
    }

    for transition in step.common().transitions.iter().chain(step.common().exits.iter()) {
        if let Some(next) = &transition.next {
            if !document.flow.round.steps.iter().any(|s| s.key() == next) {
                problems.push(format!(
                    "step '{}' transition references unknown next step '{next}'",
                    step.key()
                ));
            }
        }
    }

    if let Some(next) = &step.common().next {
        if !document.flow.round.steps.iter().any(|s| s.key() == next) {
            problems.push(format!("step '{}' next references unknown step '{next}'", step.key()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document(start: &str) -> String {
        format!(
            r#"{{
              "id": "demo",
              "roles": {{
                "worker": {{ "systemPrompt": "go", "parser": "unknown" }}
              }},
              "parsers": {{ "unknown": {{ "type": "unknown" }} }},
              "flow": {{
                "round": {{
                  "start": "{start}",
                  "steps": [
                    {{ "kind": "agent", "key": "work", "role": "worker", "prompt": ["go"],
                       "exits": [{{ "condition": "always", "outcome": "completed" }}] }}
                  ],
                  "maxRounds": 1,
                  "defaultOutcome": {{ "outcome": "max-rounds" }}
                }}
              }}
            }}"#
        )
    }

    #[test]
    fn accepts_a_well_formed_document() {
        let doc = load_document_str(&sample_document("work")).unwrap();
        assert!(validate_document(doc).is_ok());
    }

    #[test]
    fn rejects_a_round_start_pointing_at_an_unknown_step() {
        let doc = load_document_str(&sample_document("missing-step")).unwrap();
        let err = validate_document(doc).unwrap_err();
        assert!(matches!(err, WorkflowError::Schema(msg) if msg.contains("flow.round.start")));
    }

    #[test]
    fn rejects_duplicate_step_keys() {
        let text = r#"{
          "id": "demo",
          "roles": { "worker": { "systemPrompt": "go", "parser": "unknown" } },
          "parsers": { "unknown": { "type": "unknown" } },
          "flow": {
            "round": {
              "steps": [
                { "kind": "agent", "key": "work", "role": "worker", "prompt": ["go"] },
                { "kind": "agent", "key": "work", "role": "worker", "prompt": ["again"] }
              ],
              "maxRounds": 1,
              "defaultOutcome": { "outcome": "max-rounds" }
            }
          }
        }"#;
        let doc = load_document_str(text).unwrap();
        let err = validate_document(doc).unwrap_err();
        assert!(matches!(err, WorkflowError::Schema(msg) if msg.contains("duplicate step key")));
    }

    #[test]
    fn rejects_role_reference_to_unknown_parser() {
        let text = r#"{
          "id": "demo",
          "roles": { "worker": { "systemPrompt": "go", "parser": "missing" } },
          "flow": {
            "round": {
              "steps": [ { "kind": "agent", "key": "work", "role": "worker", "prompt": ["go"] } ],
              "maxRounds": 1,
              "defaultOutcome": { "outcome": "max-rounds" }
            }
          }
        }"#;
        let doc = load_document_str(text).unwrap();
        let err = validate_document(doc).unwrap_err();
        assert!(matches!(err, WorkflowError::Schema(msg) if msg.contains("unknown parser")));
    }
}
