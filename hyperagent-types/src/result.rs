//! Step and run results: the shapes produced by executing one step, a whole
//! round, or an entire run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The outcome of a single step execution, recorded under
/// `scope.steps[key]`. `parsed`'s shape depends on the step kind (see
/// `CliParsed`/`WorkflowParsed` for the two structured cases; `agent` and
/// `transform` store parser/template output directly as `Value`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    #[serde(rename = "type")]
    pub step_type: String,
    pub key: String,
    pub raw: String,
    pub parsed: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliParsed {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_buffer: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_buffer: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowParsed {
    pub outcome: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub run_id: String,
    pub rounds: u32,
    pub details: RunResult,
}

/// The step-key trace of one executed round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundRecord {
    pub index: u32,
    pub step_keys: Vec<String>,
}

/// The terminal outcome of a run: either declared by a firing transition or
/// exit, or minted by the round engine itself (`"max-rounds"`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunOutcome {
    pub outcome: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub outcome: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub rounds: Vec<RoundRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parsed_round_trips_through_json() {
        let parsed = CliParsed {
            stdout: "hi".into(),
            stderr: String::new(),
            exit_code: 0,
            args: vec!["--flag".into()],
            stdout_buffer: None,
            stderr_buffer: None,
        };
        let text = serde_json::to_string(&parsed).unwrap();
        let back: CliParsed = serde_json::from_str(&text).unwrap();
        assert_eq!(back.exit_code, 0);
        assert_eq!(back.args, vec!["--flag".to_string()]);
    }
}
