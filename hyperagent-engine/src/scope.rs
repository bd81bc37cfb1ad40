//! The run scope: the read-only binding environment the template renderer
//! and transition evaluator resolve dotted paths against.
//!
//! The scope is rebuilt (cheaply: a handful of small clones) at each step
//! boundary rather than kept as a persistent structurally-shared tree; see
//! SPEC_FULL.md §9 for why that is the right call in Rust even though the
//! original design note suggested immutable-map sharing.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use hyperagent_types::StepResult;

/// The binding environment available to templates and transitions.
/// `parsed` and `args` are populated only while a specific step is the
/// "current" one (during `stateUpdates` rendering and transition
/// evaluation); they are `None` everywhere else.
#[derive(Clone, Debug)]
pub struct Scope {
    pub user: Value,
    pub run_id: String,
    pub round: u32,
    pub max_rounds: u32,
    pub state: BTreeMap<String, String>,
    pub steps: IndexMap<String, StepResult>,
    pub parsed: Option<Value>,
    pub args: Option<Value>,
}

impl Scope {
    pub fn new(user: Value, run_id: impl Into<String>, max_rounds: u32) -> Self {
        Self {
            user,
            run_id: run_id.into(),
            round: 0,
            max_rounds,
            state: BTreeMap::new(),
            steps: IndexMap::new(),
            parsed: None,
            args: None,
        }
    }

    /// Returns a scope scoped to the given step's `parsed`/`args`, leaving
    /// everything else shared. Used while rendering `stateUpdates` and
    /// evaluating `transitions`/`exits` for that step.
    pub fn with_current(&self, parsed: Option<Value>, args: Option<Value>) -> Scope {
        let mut next = self.clone();
        next.parsed = parsed;
        next.args = args;
        next
    }

    /// Assembles the scope into the JSON shape described in the companion
    /// spec's §3 ("Run Scope"): `{user, run: {id}, round, maxRounds, state,
    /// steps, parsed, args}`.
    pub fn as_value(&self) -> Value {
        let mut steps = Map::new();
        for (key, result) in &self.steps {
            let mut entry = Map::new();
            entry.insert("raw".to_string(), Value::String(result.raw.clone()));
            entry.insert("parsed".to_string(), result.parsed.clone());
            steps.insert(key.clone(), Value::Object(entry));
        }

        let mut state = Map::new();
        for (key, value) in &self.state {
            state.insert(key.clone(), Value::String(value.clone()));
        }

        let mut root = Map::new();
        root.insert("user".to_string(), self.user.clone());
        root.insert("run".to_string(), serde_json::json!({ "id": self.run_id }));
        root.insert("round".to_string(), Value::from(self.round));
        root.insert("maxRounds".to_string(), Value::from(self.max_rounds));
        root.insert("state".to_string(), Value::Object(state));
        root.insert("steps".to_string(), Value::Object(steps));
        root.insert("parsed".to_string(), self.parsed.clone().unwrap_or(Value::Null));
        root.insert("args".to_string(), self.args.clone().unwrap_or(Value::Null));
        Value::Object(root)
    }

    /// Resolves a dotted path (`"steps.A.parsed.exitCode"`, `"state.k"`,
    /// `"user.goalFile"`) against the assembled scope value. Array indices
    /// use bracket notation (`"steps.A.parsed.items[0]"`). Returns `None`
    /// when any segment is missing, which callers treat as `undefined`.
    pub fn resolve_path(&self, path: &str) -> Option<Value> {
        resolve_json_path(&self.as_value(), path)
    }
}

/// Walks `root` by a dotted/bracket-indexed path, one segment at a time.
pub fn resolve_json_path(root: &Value, path: &str) -> Option<Value> {
    let mut current = root.clone();
    for raw_segment in path.split('.') {
        if raw_segment.is_empty() {
            continue;
        }
        let (name, indices) = split_name_and_indices(raw_segment);
        if !name.is_empty() {
            current = current.as_object()?.get(name)?.clone();
        }
        for idx in indices {
            current = current.as_array()?.get(idx)?.clone();
        }
    }
    Some(current)
}

fn split_name_and_indices(segment: &str) -> (&str, Vec<usize>) {
    let mut indices = Vec::new();
    let mut rest = segment;
    let name_end = rest.find('[').unwrap_or(rest.len());
    let name = &rest[..name_end];
    rest = &rest[name_end..];
    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find(']') else { break };
        let close = open + close;
        if let Ok(idx) = rest[open + 1..close].parse::<usize>() {
            indices.push(idx);
        }
        rest = &rest[close + 1..];
    }
    (name, indices)
}
