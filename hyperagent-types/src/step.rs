//! Step definitions: a tagged variant over the four step kinds the
//! orchestrator knows how to execute, plus the fields common to every kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::ParserSchema;
use crate::transition::Transition;

/// Fields every step kind carries regardless of what it does.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCommon {
    pub key: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub state_updates: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub exits: Vec<Transition>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Text,
    Buffer,
    Both,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Step {
    Agent {
        #[serde(flatten)]
        common: StepCommon,
        role: String,
        prompt: Vec<String>,
    },
    Cli {
        #[serde(flatten)]
        common: StepCommon,
        command: String,
        #[serde(default)]
        args: Option<Vec<String>>,
        #[serde(default)]
        args_object: Option<std::collections::BTreeMap<String, String>>,
        #[serde(default)]
        args_schema: Option<ParserSchema>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        stdin_from: Option<String>,
        capture: CaptureMode,
    },
    Workflow {
        #[serde(flatten)]
        common: StepCommon,
        workflow_id: String,
        #[serde(default)]
        input: Option<Value>,
        #[serde(default)]
        input_schema: Option<ParserSchema>,
    },
    Transform {
        #[serde(flatten)]
        common: StepCommon,
        template: Value,
        #[serde(default)]
        input: Option<Value>,
        #[serde(default)]
        input_schema: Option<ParserSchema>,
    },
}

impl Step {
    pub fn common(&self) -> &StepCommon {
        match self {
            Step::Agent { common, .. }
            | Step::Cli { common, .. }
            | Step::Workflow { common, .. }
            | Step::Transform { common, .. } => common,
        }
    }

    pub fn key(&self) -> &str {
        &self.common().key
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Step::Agent { .. } => "agent",
            Step::Cli { .. } => "cli",
            Step::Workflow { .. } => "workflow",
            Step::Transform { .. } => "transform",
        }
    }
}
