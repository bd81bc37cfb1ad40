//! The round loop & flow engine: orders steps, applies `stateUpdates`,
//! selects the next step, and decides termination (SPEC_FULL.md §4.6).
//!
//! This is the one synchronous-looking piece of an otherwise async crate:
//! exactly one step executes at a time per run (§5), so the whole state
//! machine is a plain loop over `&mut Scope` rather than anything requiring
//! synchronization.

use std::sync::Arc;

use hyperagent_types::{AgentRecord, RoundRecord, RunOutcome, RunResult, Step, WorkflowDocument};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collaborators::{ProcessRunner, ProvenanceSink, SessionProvider, WorkflowRegistry};
use crate::error::WorkflowError;
use crate::executor::{self, ExecutorContext};
use crate::scope::Scope;
use crate::session::SessionManager;
use crate::template::render;
use crate::transition;

/// A single step-completion event, forwarded to the harness's `onStream`
/// channel (SPEC_FULL.md §4.9).
#[derive(Clone, Debug)]
pub struct StreamEvent {
    pub step: String,
    pub round: u32,
    pub raw: String,
    pub parsed_summary: serde_json::Value,
}

/// What a single step execution (plus its transitions/exits) resolves to.
enum StepOutcome {
    Continue(Option<String>),
    Terminate(RunOutcome),
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    document: &WorkflowDocument,
    user: serde_json::Value,
    run_id: String,
    session_dir: String,
    model: String,
    max_rounds_override: Option<u32>,
    capture_cap_bytes: usize,
    session_provider: Arc<dyn SessionProvider>,
    process_runner: Arc<dyn ProcessRunner>,
    provenance: Arc<dyn ProvenanceSink>,
    registry: Arc<dyn WorkflowRegistry>,
    cancel: CancellationToken,
    stream_tx: UnboundedSender<StreamEvent>,
) -> Result<RunResult, WorkflowError> {
    let max_rounds = max_rounds_override.unwrap_or(document.flow.round.max_rounds);

    provenance.begin(&run_id, &document.id).await?;

    let mut scope = Scope::new(user, run_id.clone(), max_rounds);
    let seed_scope = scope.with_current(None, None);
    for (key, template) in &document.state.initial {
        let rendered = render(template, &seed_scope)?;
        scope.state.insert(key.clone(), rendered);
    }

    let mut session_manager = SessionManager::new(session_provider.clone(), session_dir.clone());
    let resolved = session_manager.bootstrap(&document.sessions.roles, &document.roles, &model, &scope).await?;
    for (role, session) in resolved {
        provenance
            .register_agent(&run_id, AgentRecord { role, session_id: session.session_id, name: session.name })
            .await?;
    }

    let mut ctx = ExecutorContext {
        document,
        session_manager: &mut session_manager,
        model,
        session_dir,
        cancel,
        process_runner,
        registry,
        provenance: provenance.clone(),
        session_provider,
        capture_cap_bytes,
    };

    let mut rounds: Vec<RoundRecord> = Vec::new();

    if let Some(bootstrap) = &document.flow.bootstrap {
        if let StepOutcome::Terminate(outcome) = run_step(bootstrap, &mut scope, &mut ctx, &stream_tx).await? {
            return finalize(provenance.as_ref(), &run_id, outcome, rounds).await;
        }
    }

    let mut round_index = 0u32;
    loop {
        round_index += 1;
        scope.round = round_index;
        debug!(round = round_index, max_rounds, "starting round");

        let mut step_keys = Vec::new();
        let start_key = document
            .flow
            .round
            .start
            .clone()
            .unwrap_or_else(|| document.flow.round.steps[0].key().to_string());
        let mut current_key = start_key;

        let round_terminal = loop {
            let step = document
                .flow
                .round
                .steps
                .iter()
                .find(|s| s.key() == current_key)
                .ok_or_else(|| WorkflowError::schema(format!("step '{current_key}' not found in round")))?
                .clone();
            step_keys.push(step.key().to_string());

            match run_step(&step, &mut scope, &mut ctx, &stream_tx).await? {
                StepOutcome::Terminate(outcome) => break Some(outcome),
                StepOutcome::Continue(Some(next)) => current_key = next,
                StepOutcome::Continue(None) => {
                    let position = document.flow.round.steps.iter().position(|s| s.key() == step.key()).expect("step came from this list");
                    match document.flow.round.steps.get(position + 1) {
                        Some(next) => current_key = next.key().to_string(),
                        None => break None,
                    }
                }
            }
        };

        rounds.push(RoundRecord { index: round_index, step_keys });

        if let Some(outcome) = round_terminal {
            return finalize(provenance.as_ref(), &run_id, outcome, rounds).await;
        }

        if round_index >= max_rounds {
            let default = &document.flow.round.default_outcome;
            let reason_scope = scope.with_current(None, None);
            let reason = default.reason.as_deref().map(|r| render(r, &reason_scope)).transpose()?;
            let outcome = RunOutcome { outcome: default.outcome.clone(), reason };
            return finalize(provenance.as_ref(), &run_id, outcome, rounds).await;
        }
    }
}

async fn run_step(
    step: &Step,
    scope: &mut Scope,
    ctx: &mut ExecutorContext<'_>,
    stream_tx: &UnboundedSender<StreamEvent>,
) -> Result<StepOutcome, WorkflowError> {
    if ctx.cancel.is_cancelled() {
        return Err(WorkflowError::Cancelled);
    }

    let entry_snapshot = scope.clone();
    let result = executor::execute_step(step, &entry_snapshot, ctx).await?;

    let _ = stream_tx.send(StreamEvent {
        step: step.key().to_string(),
        round: scope.round,
        raw: result.raw.clone(),
        parsed_summary: result.parsed.clone(),
    });

    scope.steps.insert(step.key().to_string(), result.clone());

    let scope_with_parsed = scope.with_current(Some(result.parsed.clone()), None);
    apply_state_updates(&step.common().state_updates, &scope_with_parsed, scope)?;

    let scope_for_conditions = scope.with_current(Some(result.parsed.clone()), None);

    let mut transition_fired = false;
    let mut outcome_from_transition = None;
    for candidate in &step.common().transitions {
        if transition::evaluate(&candidate.condition, &scope_for_conditions) {
            transition_fired = true;
            apply_state_updates(&candidate.state_updates, &scope_for_conditions, scope)?;
            if let Some(outcome) = &candidate.outcome {
                let reason = candidate.reason.as_deref().map(|r| render(r, &scope_for_conditions)).transpose()?;
                outcome_from_transition = Some(StepOutcome::Terminate(RunOutcome { outcome: outcome.clone(), reason }));
            } else if let Some(next) = &candidate.next {
                outcome_from_transition = Some(StepOutcome::Continue(Some(next.clone())));
            }
            break;
        }
    }
    if let Some(outcome) = outcome_from_transition {
        return Ok(outcome);
    }

    if !transition_fired {
        for exit in &step.common().exits {
            if transition::evaluate(&exit.condition, &scope_for_conditions) {
                apply_state_updates(&exit.state_updates, &scope_for_conditions, scope)?;
                let reason = exit.reason.as_deref().map(|r| render(r, &scope_for_conditions)).transpose()?;
                let outcome = exit.outcome.clone().unwrap_or_else(|| "completed".to_string());
                return Ok(StepOutcome::Terminate(RunOutcome { outcome, reason }));
            }
        }
    }

    match &step.common().next {
        Some(next) => Ok(StepOutcome::Continue(Some(next.clone()))),
        None => Ok(StepOutcome::Continue(None)),
    }
}

/// Renders each `stateUpdates` entry against `render_scope` augmented with
/// state written earlier in the same batch, then writes it into `target`.
fn apply_state_updates(
    updates: &std::collections::BTreeMap<String, String>,
    render_scope: &Scope,
    target: &mut Scope,
) -> Result<(), WorkflowError> {
    let mut working = render_scope.clone();
    working.state = target.state.clone();
    for (key, template) in updates {
        let rendered = render(template, &working)?;
        working.state.insert(key.clone(), rendered.clone());
        target.state.insert(key.clone(), rendered);
    }
    Ok(())
}

async fn finalize(
    provenance: &dyn ProvenanceSink,
    run_id: &str,
    outcome: RunOutcome,
    rounds: Vec<RoundRecord>,
) -> Result<RunResult, WorkflowError> {
    provenance.finalize(run_id, outcome.clone()).await?;
    Ok(RunResult { run_id: run_id.to_string(), outcome: outcome.outcome, reason: outcome.reason, rounds })
}
