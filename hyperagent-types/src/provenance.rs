//! The provenance record shape: an append-only, self-contained audit log
//! for one run, persisted by a `ProvenanceSink` under
//! `<sessionDir>/.hyperagent/<runId>.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::RunOutcome;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentRecord {
    pub role: String,
    pub session_id: String,
    pub name: String,
}

/// A single append-only log entry. `role` is `"user"`,
/// `"<workflowId>.<role>"`, or `"<workflowId>.cli.<stepKey>"` per §6 of the
/// companion spec. `index` is assigned by the sink on append and is what
/// testable property 8 (append-order equals temporal order) is stated over.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: u64,
    pub role: String,
    pub timestamp: DateTime<Utc>,
    pub payload: LogPayload,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogPayload {
    UserPrompt { parts: Vec<String> },
    AgentReply { parts: Vec<String> },
    CliInvocation { command: String, args: Vec<String>, exit_code: i32, stdout: String, stderr: String },
    WorkflowDelegation { workflow_id: String, child_run_id: String },
    Raw(Value),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub workflow_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub agents: Vec<AgentRecord>,
    #[serde(default)]
    pub log: Vec<LogEntry>,
    #[serde(default)]
    pub result: Option<RunOutcome>,
}

impl RunRecord {
    pub fn new(id: impl Into<String>, workflow_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            started_at,
            finished_at: None,
            agents: Vec::new(),
            log: Vec::new(),
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_record_has_no_result_yet() {
        let record = RunRecord::new("run-1", "demo", Utc::now());
        assert!(record.result.is_none());
        assert!(record.log.is_empty());
    }

    #[test]
    fn log_entries_serialize_with_a_tagged_payload() {
        let entry = LogEntry {
            index: 0,
            role: "user".to_string(),
            timestamp: Utc::now(),
            payload: LogPayload::UserPrompt { parts: vec!["hi".to_string()] },
        };
        let text = serde_json::to_string(&entry).unwrap();
        assert!(text.contains("\"kind\":\"user_prompt\""));
    }
}
