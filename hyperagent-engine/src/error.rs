//! The error taxonomy the orchestrator consumes and returns. One variant per
//! class named in the companion spec's error handling design; callers
//! pattern-match on the variant rather than parsing messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("Invalid user inputs for workflow {workflow_id}: {details}")]
    InputValidation { workflow_id: String, details: String },

    #[error("template error: {0}")]
    Template(String),

    #[error("parse error in step '{step_key}': {message}")]
    Parse { step_key: String, message: String },

    #[error("cli error in step '{step_key}': {message}")]
    Cli { step_key: String, message: String },

    #[error("child workflow '{workflow_id}' (run {run_id}) failed: {message}")]
    ChildWorkflow { workflow_id: String, run_id: String, message: String },

    #[error("workflow id '{0}' is not registered")]
    UnknownWorkflow(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("run cancelled")]
    Cancelled,
}

impl WorkflowError {
    pub fn schema(message: impl Into<String>) -> Self {
        WorkflowError::Schema(message.into())
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
