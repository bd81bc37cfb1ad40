//! The workflow document: the immutable, serde-deserialized shape an author
//! writes and the harness validates before running.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::ParserSchema;
use crate::step::Step;

/// A complete workflow document. Deserialized directly from the author's
/// JSON or YAML; every optional section defaults to empty so a minimal
/// document only needs `id`, `roles`, and `flow.round`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub sessions: SessionsDefinition,
    #[serde(default)]
    pub parsers: IndexMap<String, ParserSchema>,
    #[serde(default)]
    pub roles: IndexMap<String, RoleDefinition>,
    #[serde(default)]
    pub user: IndexMap<String, ParserSchema>,
    #[serde(default)]
    pub state: StateDefinition,
    pub flow: FlowDefinition,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionsDefinition {
    #[serde(default)]
    pub roles: Vec<SessionRoleDeclaration>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRoleDeclaration {
    pub role: String,
    #[serde(default)]
    pub name_template: Option<String>,
}

/// An LLM persona: a system prompt, a named reference into `parsers`, and
/// tool permissions (booleans, default false when omitted, see
/// `hyperagent_types::ToolPermissions`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    pub system_prompt: String,
    pub parser: String,
    #[serde(default)]
    pub tools: ToolPermissions,
}

/// Tool permission keys the session manager conveys at session creation.
/// Every key defaults to `false` when omitted from the document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPermissions {
    pub read: bool,
    pub write: bool,
    pub edit: bool,
    pub bash: bool,
    pub grep: bool,
    pub glob: bool,
    pub list: bool,
    pub patch: bool,
    pub todowrite: bool,
    pub todoread: bool,
    pub webfetch: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StateDefinition {
    #[serde(default)]
    pub initial: IndexMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowDefinition {
    #[serde(default)]
    pub bootstrap: Option<Step>,
    pub round: RoundDefinition,
}

/// `steps` is ordered (authoring order is execution order absent `next`
/// jumps); keys must be unique within the round, enforced by the document
/// validator rather than at the type level.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundDefinition {
    #[serde(default)]
    pub start: Option<String>,
    pub steps: Vec<Step>,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    pub default_outcome: DefaultOutcome,
}

fn default_max_rounds() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefaultOutcome {
    pub outcome: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_document() {
        let text = r#"
        {
          "id": "demo",
          "roles": {
            "worker": { "systemPrompt": "You write code.", "parser": "unknown" }
          },
          "flow": {
            "round": {
              "steps": [
                { "kind": "agent", "key": "work", "role": "worker", "prompt": ["go"],
                  "exits": [{ "condition": "always", "outcome": "completed" }] }
              ],
              "maxRounds": 1,
              "defaultOutcome": { "outcome": "max-rounds" }
            }
          }
        }
        "#;
        let doc: WorkflowDocument = serde_json::from_str(text).unwrap();
        assert_eq!(doc.id, "demo");
        assert_eq!(doc.flow.round.steps.len(), 1);
        assert_eq!(doc.flow.round.max_rounds, 1);
    }

    #[test]
    fn tool_permissions_default_to_false() {
        let role: RoleDefinition =
            serde_json::from_str(r#"{"systemPrompt": "s", "parser": "unknown"}"#).unwrap();
        assert_eq!(role.tools, ToolPermissions::default());
        assert!(!role.tools.bash);
    }
}
