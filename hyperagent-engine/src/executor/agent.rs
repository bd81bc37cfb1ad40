//! The agent executor: an LLM turn in a persistent session (SPEC_FULL.md
//! §4.5, "Agent executor").

use serde_json::Value;
use tracing::debug;

use hyperagent_types::ParserSchema;

use crate::collaborators::MessagePart;
use crate::error::WorkflowError;
use crate::provenance;
use crate::scope::Scope;
use crate::template::render;

use super::ExecutorContext;

pub async fn execute(
    step_key: &str,
    role: &str,
    prompt: &[String],
    scope: &Scope,
    ctx: &mut ExecutorContext<'_>,
) -> Result<(String, Value), WorkflowError> {
    let role_def = ctx
        .document
        .roles
        .get(role)
        .ok_or_else(|| WorkflowError::schema(format!("step '{step_key}' references unknown role '{role}'")))?;
    let parser = ctx
        .document
        .parsers
        .get(&role_def.parser)
        .ok_or_else(|| WorkflowError::schema(format!("role '{role}' references unknown parser '{}'", role_def.parser)))?;

    let rendered_prompts = prompt.iter().map(|p| render(p, scope)).collect::<Result<Vec<_>, _>>()?;

    let declared = ctx.document.sessions.roles.iter().find(|d| d.role == role);
    let name_template = declared.and_then(|d| d.name_template.as_deref());
    let session = ctx.session_manager.resolve_for_role(role, role_def, &ctx.model, name_template, scope).await?;

    ctx.provenance
        .append(
            &scope.run_id,
            provenance::entry("user", hyperagent_types::LogPayload::UserPrompt { parts: rendered_prompts.clone() }),
        )
        .await?;

    debug!(step_key, role, round = scope.round, "sending agent prompt");

    let parts = rendered_prompts.iter().map(|p| MessagePart::text(p.clone())).collect();
    let reply = ctx
        .session_provider
        .prompt(&session.session_id, parts, &ctx.model, Some(role), ctx.cancel.clone())
        .await?;
    let reply_texts: Vec<String> = reply.iter().map(|p| p.text.clone()).collect();
    let raw = reply_texts.last().cloned().unwrap_or_default();

    ctx.provenance
        .append(
            &scope.run_id,
            provenance::entry(
                format!("{}.{role}", ctx.document.id),
                hyperagent_types::LogPayload::AgentReply { parts: reply_texts },
            ),
        )
        .await?;

    let parsed = parse_reply(step_key, &raw, parser)?;
    Ok((raw, parsed))
}

/// Parses an agent's final text part against its role's parser. A
/// non-JSON reply gets one extraction pass (strip markdown fences and
/// surrounding prose) before failing; an `unknown` parser falls back to the
/// raw string itself rather than failing (SPEC_FULL.md §4.5).
fn parse_reply(step_key: &str, raw: &str, parser: &ParserSchema) -> Result<Value, WorkflowError> {
    let candidate = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(_) => match extract_json(raw).and_then(|text| serde_json::from_str::<Value>(&text).ok()) {
            Some(value) => value,
            None if matches!(parser, ParserSchema::Unknown(_)) => Value::String(raw.to_string()),
            None => {
                return Err(WorkflowError::Parse {
                    step_key: step_key.to_string(),
                    message: format!("agent reply is not valid JSON: {raw:?}"),
                });
            }
        },
    };

    parser.validate(&candidate).map_err(|e| WorkflowError::Parse { step_key: step_key.to_string(), message: e.to_string() })
}

/// Strips markdown code fences and surrounding prose, returning the slice
/// from the first `{` through the last `}` (inclusive). Best-effort, single
/// pass, used only when a direct JSON parse already failed.
fn extract_json(raw: &str) -> Option<String> {
    let stripped = raw.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```");
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end < start {
        return None;
    }
    Some(stripped[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperagent_types::schema::CommonConstraints;

    #[test]
    fn extracts_json_wrapped_in_markdown_fence() {
        let raw = "```json\n{\"status\": \"ok\"}\n```";
        assert_eq!(extract_json(raw).unwrap(), "{\"status\": \"ok\"}");
    }

    #[test]
    fn extracts_json_with_surrounding_prose() {
        let raw = "Sure, here you go:\n{\"status\": \"ok\"}\nLet me know if you need more.";
        assert_eq!(extract_json(raw).unwrap(), "{\"status\": \"ok\"}");
    }

    #[test]
    fn unknown_parser_falls_back_to_raw_string_when_unparsable() {
        let parsed = parse_reply("step", "not json at all", &ParserSchema::Unknown(CommonConstraints::default())).unwrap();
        assert_eq!(parsed, Value::String("not json at all".to_string()));
    }

    #[test]
    fn non_unknown_parser_fails_on_unparsable_reply() {
        let err = parse_reply("step", "not json", &ParserSchema::Boolean(CommonConstraints::default())).unwrap_err();
        assert!(matches!(err, WorkflowError::Parse { .. }));
    }

    #[test]
    fn direct_json_parses_without_extraction() {
        let parsed = parse_reply("step", "{\"a\":1}", &ParserSchema::Unknown(CommonConstraints::default())).unwrap();
        assert_eq!(parsed, serde_json::json!({"a": 1}));
    }
}
