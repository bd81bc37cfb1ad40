//! Collaborator interfaces the orchestrator consumes: the LLM provider, a
//! subprocess runner, the provenance sink, and the workflow registry. Each
//! is an `#[async_trait]`, `Send + Sync` trait so a single run can await a
//! collaborator boundary without blocking the executor thread.

use async_trait::async_trait;
use hyperagent_types::{AgentRecord, RunOutcome, ToolPermissions, WorkflowDocument};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use hyperagent_types::CaptureMode;

use crate::error::WorkflowError;

/// A single part of a prompt or reply. Text-only for now; the interface is
/// shaped to admit richer part kinds (images, file refs) without changing
/// its signature.
#[derive(Clone, Debug)]
pub struct MessagePart {
    pub text: String,
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    pub name: Option<String>,
}

/// A diff of files touched by a given message, as reported by the provider.
#[derive(Clone, Debug, Default)]
pub struct MessageDiff {
    pub files: Vec<FileDiff>,
}

#[derive(Clone, Debug)]
pub struct FileDiff {
    pub path: String,
    pub patch: String,
}

/// The external LLM provider. Operations mirror SPEC_FULL.md §6.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn create_session(&self, dir: &str, opts: SessionOptions) -> Result<String, WorkflowError>;

    async fn list_sessions(&self, dir: &str) -> Result<Vec<String>, WorkflowError>;

    async fn prompt(
        &self,
        session: &str,
        parts: Vec<MessagePart>,
        model: &str,
        agent_name: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<Vec<MessagePart>, WorkflowError>;

    async fn message_diff(&self, session: &str, message_id: &str) -> Result<MessageDiff, WorkflowError>;

    async fn register_agent_definition(
        &self,
        dir: &str,
        name: &str,
        model: &str,
        system_prompt: &str,
        tools: ToolPermissions,
    ) -> Result<(), WorkflowError>;

    /// Drops any cached session listing for `dir`. Must be called after
    /// `register_agent_definition` so a changed role definition is picked
    /// up by subsequent `list_sessions`/`create_session` calls.
    async fn invalidate(&self, dir: &str) -> Result<(), WorkflowError>;
}

/// A single process invocation, as built by the cli executor.
#[derive(Clone, Debug)]
pub struct ProcessInvocation {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<String>,
    pub stdin_value: Option<StdinValue>,
    pub capture: CaptureMode,
}

#[derive(Clone, Debug)]
pub enum StdinValue {
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Clone, Debug)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub stdout_buffer: Option<Vec<u8>>,
    pub stderr_buffer: Option<Vec<u8>>,
    pub exit_code: i32,
}

/// Process spawning, exposed as a collaborator so the core never shells out
/// directly. Spawn failures (not found, IO error) are the only fatal case;
/// non-zero exit is carried in `ProcessOutput::exit_code` as data.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: ProcessInvocation) -> Result<ProcessOutput, WorkflowError>;
}

/// Append-only provenance sink. `entry` is pre-serialized JSON so the sink
/// itself need not depend on `hyperagent_types::provenance` shapes.
#[async_trait]
pub trait ProvenanceSink: Send + Sync {
    /// Opens the record for a new run. Must be called exactly once before
    /// the first `append`/`register_agent` for that `run_id`.
    async fn begin(&self, run_id: &str, workflow_id: &str) -> Result<(), WorkflowError>;

    /// Records a session resolved for a role, appended to `agents[]` rather
    /// than `log[]` (SPEC_FULL.md §4.8).
    async fn register_agent(&self, run_id: &str, agent: AgentRecord) -> Result<(), WorkflowError>;

    async fn append(&self, run_id: &str, entry: Value) -> Result<(), WorkflowError>;

    async fn finalize(&self, run_id: &str, result: RunOutcome) -> Result<(), WorkflowError>;
}

/// Resolves a `workflow` step's `workflowId` to a document.
#[async_trait]
pub trait WorkflowRegistry: Send + Sync {
    async fn resolve(&self, workflow_id: &str) -> Option<WorkflowDocument>;
}
