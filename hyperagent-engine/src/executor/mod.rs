//! Step executors: `execute(step, scope, collaborators) -> StepResult`, one
//! module per step kind (SPEC_FULL.md §4.5). `stateUpdates` and transition
//! processing are the round engine's responsibility (`crate::round`), not
//! the executor's.

pub mod agent;
pub mod cli;
pub mod transform;
pub mod workflow;

use std::sync::Arc;

use hyperagent_types::{Step, StepResult, WorkflowDocument};
use tokio_util::sync::CancellationToken;

use crate::collaborators::{ProcessRunner, ProvenanceSink, SessionProvider, WorkflowRegistry};
use crate::error::WorkflowError;
use crate::scope::Scope;
use crate::session::SessionManager;

/// Everything an executor needs beyond the step definition and the scope
/// snapshot taken at step entry. Built once per run by the round engine and
/// threaded through each step's execution; child `workflow` steps clone the
/// `Arc` collaborators to recurse into a fresh run rather than borrowing
/// this context.
pub struct ExecutorContext<'a> {
    pub document: &'a WorkflowDocument,
    pub session_manager: &'a mut SessionManager,
    pub model: String,
    pub session_dir: String,
    pub cancel: CancellationToken,
    pub process_runner: Arc<dyn ProcessRunner>,
    pub registry: Arc<dyn WorkflowRegistry>,
    pub provenance: Arc<dyn ProvenanceSink>,
    pub session_provider: Arc<dyn SessionProvider>,
    pub capture_cap_bytes: usize,
}

/// Dispatches to the executor matching `step`'s kind and wraps the result
/// into a `StepResult`.
pub async fn execute_step(
    step: &Step,
    scope: &Scope,
    ctx: &mut ExecutorContext<'_>,
) -> Result<StepResult, WorkflowError> {
    let (raw, parsed) = match step {
        Step::Agent { role, prompt, .. } => agent::execute(step.key(), role, prompt, scope, ctx).await?,
        Step::Cli { command, args, args_object, args_schema, cwd, stdin_from, capture, .. } => {
            cli::execute(
                step.key(),
                command,
                args.as_deref(),
                args_object.as_ref(),
                args_schema.as_ref(),
                cwd.as_deref(),
                stdin_from.as_deref(),
                *capture,
                scope,
                ctx,
            )
            .await?
        }
        Step::Workflow { workflow_id, input, input_schema, .. } => {
            workflow::execute(step.key(), workflow_id, input.as_ref(), input_schema.as_ref(), scope, ctx).await?
        }
        Step::Transform { template, input, input_schema, .. } => {
            transform::execute(template, input.as_ref(), input_schema.as_ref(), scope)?
        }
    };

    Ok(StepResult { step_type: step.kind_name().to_string(), key: step.key().to_string(), raw, parsed })
}
