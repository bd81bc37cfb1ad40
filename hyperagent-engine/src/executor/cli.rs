//! The cli executor: an external command invocation with rendered args,
//! optional stdin piping, and capture-mode-driven output (SPEC_FULL.md
//! §4.5, "CLI executor").

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use hyperagent_types::{CaptureMode, CliParsed, ParserSchema};

use crate::collaborators::{ProcessInvocation, StdinValue};
use crate::error::WorkflowError;
use crate::provenance;
use crate::scope::Scope;
use crate::template::render;

use super::ExecutorContext;

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    step_key: &str,
    command: &str,
    args: Option<&[String]>,
    args_object: Option<&BTreeMap<String, String>>,
    args_schema: Option<&ParserSchema>,
    cwd: Option<&str>,
    stdin_from: Option<&str>,
    capture: CaptureMode,
    scope: &Scope,
    ctx: &mut ExecutorContext<'_>,
) -> Result<(String, Value), WorkflowError> {
    let rendered_command = render(command, scope)?;
    let rendered_args = build_args(args, args_object, args_schema, scope)?;
    let rendered_cwd = cwd.map(|c| render(c, scope)).transpose()?;
    let stdin_value = resolve_stdin(stdin_from, scope);

    debug!(step_key, command = %rendered_command, args = ?rendered_args, "invoking cli step");

    let invocation = ProcessInvocation {
        command: rendered_command.clone(),
        args: rendered_args.clone(),
        cwd: rendered_cwd,
        stdin_value,
        capture,
    };

    let output = ctx.process_runner.run(invocation).await.map_err(|e| match e {
        WorkflowError::Cli { message, .. } => WorkflowError::Cli { step_key: step_key.to_string(), message },
        other => other,
    })?;

    ctx.provenance
        .append(
            &scope.run_id,
            provenance::entry(
                format!("{}.cli.{step_key}", ctx.document.id),
                hyperagent_types::LogPayload::CliInvocation {
                    command: rendered_command,
                    args: rendered_args.clone(),
                    exit_code: output.exit_code,
                    stdout: provenance::truncate_capture(&output.stdout, ctx.capture_cap_bytes),
                    stderr: provenance::truncate_capture(&output.stderr, ctx.capture_cap_bytes),
                },
            ),
        )
        .await?;

    let parsed = CliParsed {
        stdout: output.stdout.clone(),
        stderr: output.stderr,
        exit_code: output.exit_code,
        args: rendered_args,
        stdout_buffer: output.stdout_buffer,
        stderr_buffer: output.stderr_buffer,
    };
    let raw = output.stdout;
    let parsed_value = serde_json::to_value(&parsed).map_err(|e| WorkflowError::Cli { step_key: step_key.to_string(), message: e.to_string() })?;
    Ok((raw, parsed_value))
}

fn build_args(
    args: Option<&[String]>,
    args_object: Option<&BTreeMap<String, String>>,
    args_schema: Option<&ParserSchema>,
    scope: &Scope,
) -> Result<Vec<String>, WorkflowError> {
    if let Some(list) = args {
        let rendered = list.iter().map(|a| render(a, scope)).collect::<Result<Vec<_>, _>>()?;
        let candidate = Value::Array(rendered.into_iter().map(Value::String).collect());
        let validated = validate_args(candidate, args_schema)?;
        return Ok(value_to_args(&validated));
    }

    if let Some(map) = args_object {
        // Rendered first, keyed by the source map's lexicographic key order
        // per SPEC_FULL.md §4.5.1's resolved `argsObject` ordering.
        let mut object = serde_json::Map::new();
        for (key, template) in map {
            object.insert(key.clone(), Value::String(render(template, scope)?));
        }
        let validated = validate_args(Value::Object(object), args_schema)?;
        return Ok(value_to_args(&validated));
    }

    Ok(Vec::new())
}

fn validate_args(candidate: Value, args_schema: Option<&ParserSchema>) -> Result<Value, WorkflowError> {
    match args_schema {
        Some(schema) => schema.validate(&candidate).map_err(|e| WorkflowError::Template(format!("cli args failed validation: {e}"))),
        None => Ok(candidate),
    }
}

/// Flattens a validated `args`/`argsObject` candidate into the process
/// argument vector. Objects iterate by key in ascending lexicographic
/// order (`BTreeMap`/`serde_json::Map`'s default order already matches,
/// since this crate does not enable `preserve_order`).
fn value_to_args(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(stringify_arg).collect(),
        Value::Object(map) => map.values().map(stringify_arg).collect(),
        other => vec![stringify_arg(other)],
    }
}

fn stringify_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolves `stdinFrom` against the scope. A string value is passed as
/// UTF-8 text; an array of byte-sized numbers (the JSON shape a
/// `stdoutBuffer`/`stderrBuffer` serializes to) is passed unchanged as
/// bytes (SPEC_FULL.md §4.5, property 9).
fn resolve_stdin(stdin_from: Option<&str>, scope: &Scope) -> Option<StdinValue> {
    let path = stdin_from?;
    match scope.resolve_path(path)? {
        Value::String(s) => Some(StdinValue::Text(s)),
        Value::Array(items) => {
            let bytes: Option<Vec<u8>> = items.iter().map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok())).collect();
            bytes.map(StdinValue::Bytes)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_to_args_orders_object_values_by_key() {
        let mut map = serde_json::Map::new();
        map.insert("b".to_string(), json!("second"));
        map.insert("a".to_string(), json!("first"));
        assert_eq!(value_to_args(&Value::Object(map)), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn value_to_args_stringifies_non_string_values_canonically() {
        assert_eq!(value_to_args(&json!([1, true])), vec!["1".to_string(), "true".to_string()]);
    }

    #[test]
    fn resolve_stdin_reads_text_from_scope() {
        let scope = Scope::new(json!({"goal": "hello"}), "run-1", 1);
        let value = resolve_stdin(Some("user.goal"), &scope);
        assert!(matches!(value, Some(StdinValue::Text(s)) if s == "hello"));
    }

    #[test]
    fn resolve_stdin_reads_byte_array_from_scope() {
        let scope = Scope::new(json!({"bytes": [0, 1, 2, 3, 4]}), "run-1", 1);
        let value = resolve_stdin(Some("user.bytes"), &scope);
        assert!(matches!(value, Some(StdinValue::Bytes(b)) if b == vec![0, 1, 2, 3, 4]));
    }

    #[test]
    fn resolve_stdin_missing_path_yields_none() {
        let scope = Scope::new(json!({}), "run-1", 1);
        assert!(resolve_stdin(Some("user.missing"), &scope).is_none());
    }
}
