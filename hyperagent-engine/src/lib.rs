//! Declarative multi-agent workflow orchestrator: schema validation,
//! templating, the round/transition state machine and step executors.
//!
//! `hyperagent-types` defines the document shape this crate compiles and
//! executes. Collaborators (the LLM provider, process runner, provenance
//! sink, workflow registry) are trait objects a caller supplies; the
//! defaults in [`process`], [`provenance`], and [`registry`] are
//! batteries-included implementations, not the only way to run a workflow.

pub mod collaborators;
pub mod document;
pub mod error;
pub mod executor;
pub mod harness;
pub mod process;
pub mod provenance;
pub mod registry;
pub mod round;
pub mod scope;
pub mod session;
pub mod template;
pub mod transition;

pub use collaborators::{
    FileDiff, MessageDiff, MessagePart, ProcessInvocation, ProcessOutput, ProcessRunner,
    ProvenanceSink, SessionOptions, SessionProvider, StdinValue, WorkflowRegistry,
};
pub use document::{load_document_str, validate_document};
pub use error::{WorkflowError, WorkflowResult};
pub use harness::{run_workflow, Collaborators, RunHandle, RunOptions};
pub use process::TokioProcessRunner;
pub use provenance::{FileProvenanceSink, ProvenanceConfig};
pub use registry::InMemoryWorkflowRegistry;
pub use round::StreamEvent;
pub use scope::Scope;
pub use session::SessionManager;
pub use template::{render, render_tree};
