//! The run harness: the public entry point. Validates inputs, wires
//! collaborators, and returns a handle with `runId` and a result future
//! (SPEC_FULL.md §4.9).

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use hyperagent_types::{RunResult, WorkflowDocument};

use crate::collaborators::{ProcessRunner, ProvenanceSink, SessionProvider, WorkflowRegistry};
use crate::document::validate_document;
use crate::error::WorkflowError;
use crate::provenance::ProvenanceConfig;
use crate::round::{self, StreamEvent};

/// The options enumerated in SPEC_FULL.md §4.9. Extra keys on a
/// deserialized options document are ignored rather than forwarded, per
/// §9's design note: this struct simply has no field to receive them.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub user: Value,
    pub session_dir: String,
    pub model: Option<String>,
    pub max_rounds: Option<u32>,
    pub provenance_config: ProvenanceConfig,
}

impl RunOptions {
    pub fn new(session_dir: impl Into<String>) -> Self {
        Self { user: Value::Null, session_dir: session_dir.into(), model: None, max_rounds: None, provenance_config: ProvenanceConfig::default() }
    }

    pub fn with_user(mut self, user: Value) -> Self {
        self.user = user;
        self
    }
}

/// The collaborators a run needs, grouped so callers construct this once
/// and reuse it across runs rather than threading four `Arc`s individually.
#[derive(Clone)]
pub struct Collaborators {
    pub session_provider: Arc<dyn SessionProvider>,
    pub process_runner: Arc<dyn ProcessRunner>,
    pub provenance: Arc<dyn ProvenanceSink>,
    pub registry: Arc<dyn WorkflowRegistry>,
}

/// A running (or completed) workflow run. `result` resolves with the
/// terminal `RunResult` or rejects on fatal error.
pub struct RunHandle {
    pub run_id: String,
    pub result: tokio::task::JoinHandle<Result<RunResult, WorkflowError>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle").field("run_id", &self.run_id).finish_non_exhaustive()
    }
}

impl RunHandle {
    /// Signals cancellation to the active collaborator boundary. In-flight
    /// LLM prompts abort; in-flight processes are killed; the result
    /// future rejects with `CancelledError`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Validates `document` and `options.user`, seeds the run, and starts the
/// flow engine on a dedicated worker task. Returns synchronously with the
/// `runId`, the result handle, and the `onStream` receiver the caller may
/// drain (or drop, if uninterested in step-completion events).
pub fn run_workflow(
    document: WorkflowDocument,
    options: RunOptions,
    collaborators: Collaborators,
) -> Result<(RunHandle, UnboundedReceiver<StreamEvent>), WorkflowError> {
    let document = validate_document(document)?;
    let user = validate_user_input(&document, &options.user)?;

    let run_id = Uuid::new_v4().to_string();
    let model = options.model.clone().or_else(|| document.model.clone()).unwrap_or_else(|| "default".to_string());
    let cancel = CancellationToken::new();
    let (stream_tx, stream_rx) = tokio::sync::mpsc::unbounded_channel();

    let task_document = document.clone();
    let task_run_id = run_id.clone();
    let task_cancel = cancel.clone();
    let Collaborators { session_provider, process_runner, provenance, registry } = collaborators;

    let result = tokio::spawn(async move {
        round::execute(
            &task_document,
            user,
            task_run_id,
            options.session_dir,
            model,
            options.max_rounds,
            options.provenance_config.capture_cap_bytes,
            session_provider,
            process_runner,
            provenance,
            registry,
            task_cancel,
            stream_tx,
        )
        .await
    });

    Ok((RunHandle { run_id, result, cancel }, stream_rx))
}

/// Validates `user` against the document's `user` schema (§4.1), field by
/// field, collecting the first failure into an `InputValidationError`.
/// Keys not named in the schema pass through untouched.
fn validate_user_input(document: &WorkflowDocument, user: &Value) -> Result<Value, WorkflowError> {
    let input_object = user.as_object().cloned().unwrap_or_default();
    let mut validated = serde_json::Map::new();

    for (key, schema) in &document.user {
        let candidate = input_object.get(key).cloned().unwrap_or(Value::Null);
        match schema.validate(&candidate) {
            Ok(value) => {
                validated.insert(key.clone(), value);
            }
            Err(e) => {
                return Err(WorkflowError::InputValidation {
                    workflow_id: document.id.clone(),
                    details: format!("{key}: {e}"),
                });
            }
        }
    }

    for (key, value) in input_object {
        validated.entry(key).or_insert(value);
    }

    Ok(Value::Object(validated))
}
