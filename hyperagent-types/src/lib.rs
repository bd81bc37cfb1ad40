//! Shared data model for hyperagent workflow documents.
//!
//! This crate centralizes the serde-friendly types that describe a workflow
//! document: roles, parser schemas, steps, transitions, run scope, and the
//! provenance record shape. `hyperagent-engine` compiles and executes these
//! types; this crate only defines their shape and the handful of pure
//! validation helpers that operate on a single value in isolation.

pub mod document;
pub mod provenance;
pub mod result;
pub mod schema;
pub mod step;
pub mod transition;

pub use document::{
    DefaultOutcome, FlowDefinition, RoleDefinition, RoundDefinition, SessionRoleDeclaration,
    SessionsDefinition, StateDefinition, ToolPermissions, WorkflowDocument,
};
pub use provenance::{AgentRecord, LogEntry, LogPayload, RunRecord};
pub use result::{CliParsed, RoundRecord, RunOutcome, RunResult, StepResult, WorkflowParsed};
pub use schema::{ParserSchema, ValidationError};
pub use step::{CaptureMode, Step, StepCommon};
pub use transition::{Comparator, Condition, Leaf, Transition};
