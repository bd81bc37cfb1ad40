//! The workflow executor: a nested invocation of another workflow document
//! by id, run to completion before the parent step returns (SPEC_FULL.md
//! §4.5, "Workflow executor"; §5: "A child workflow invocation blocks its
//! parent step until the child terminates").

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use hyperagent_types::{ParserSchema, WorkflowParsed};

use crate::error::WorkflowError;
use crate::provenance;
use crate::round;
use crate::scope::Scope;
use crate::template::render_tree;

use super::ExecutorContext;

pub async fn execute(
    step_key: &str,
    workflow_id: &str,
    input: Option<&Value>,
    input_schema: Option<&ParserSchema>,
    scope: &Scope,
    ctx: &mut ExecutorContext<'_>,
) -> Result<(String, Value), WorkflowError> {
    let rendered_input = match input {
        Some(template) => render_tree(template, scope)?,
        None => Value::Null,
    };
    let validated_input = match input_schema {
        Some(schema) => schema
            .validate(&rendered_input)
            .map_err(|e| WorkflowError::Template(format!("workflow step '{step_key}' input failed validation: {e}")))?,
        None => rendered_input,
    };

    let child_document = ctx
        .registry
        .resolve(workflow_id)
        .await
        .ok_or_else(|| WorkflowError::UnknownWorkflow(workflow_id.to_string()))?;
    let child_document = crate::document::validate_document(child_document)?;

    let child_run_id = format!("{}.{}", scope.run_id, Uuid::new_v4());

    debug!(step_key, workflow_id, child_run_id, "delegating to child workflow");

    ctx.provenance
        .append(
            &scope.run_id,
            provenance::entry(
                format!("{}.workflow.{step_key}", ctx.document.id),
                hyperagent_types::LogPayload::WorkflowDelegation {
                    workflow_id: workflow_id.to_string(),
                    child_run_id: child_run_id.clone(),
                },
            ),
        )
        .await?;

    let (stream_tx, _stream_rx) = tokio::sync::mpsc::unbounded_channel();
    let result = Box::pin(round::execute(
        &child_document,
        validated_input,
        child_run_id.clone(),
        ctx.session_dir.clone(),
        ctx.model.clone(),
        None,
        ctx.capture_cap_bytes,
        ctx.session_provider.clone(),
        ctx.process_runner.clone(),
        ctx.provenance.clone(),
        ctx.registry.clone(),
        ctx.cancel.child_token(),
        stream_tx,
    ))
    .await
    .map_err(|e| WorkflowError::ChildWorkflow {
        workflow_id: workflow_id.to_string(),
        run_id: child_run_id.clone(),
        message: e.to_string(),
    })?;

    let workflow_parsed = WorkflowParsed {
        outcome: result.outcome.clone(),
        reason: result.reason.clone(),
        run_id: result.run_id.clone(),
        rounds: result.rounds.len() as u32,
        details: result,
    };
    let raw = serde_json::to_string(&workflow_parsed)
        .map_err(|e| WorkflowError::ChildWorkflow { workflow_id: workflow_id.to_string(), run_id: child_run_id, message: e.to_string() })?;
    let parsed_value = serde_json::to_value(&workflow_parsed).expect("WorkflowParsed always serializes");
    Ok((raw, parsed_value))
}
