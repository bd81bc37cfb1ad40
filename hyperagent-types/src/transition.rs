//! The transition DSL: a structured JSON predicate tree, not a string
//! expression language. A leaf names a `field` (a dotted scope path) and
//! exactly one comparator; composite nodes combine child conditions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single comparator applied to the value found at `field`. Represented as
/// an untagged enum over single-key objects so documents read naturally:
/// `{"field": "parsed.status", "equals": "approve"}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaf {
    pub field: String,
    #[serde(flatten)]
    pub comparator: Comparator,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparator {
    Equals(Value),
    Includes(Value),
    In(Vec<Value>),
    Matches(String),
    Exists(bool),
    Gt(f64),
    Ge(f64),
    Lt(f64),
    Le(f64),
    Absent(bool),
}

/// A condition node: the literal `"always"`, a leaf comparator, or a
/// composite of child conditions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Always(AlwaysMarker),
    Any { any: Vec<Condition> },
    All { all: Vec<Condition> },
    Not { not: Box<Condition> },
    Leaf(Leaf),
}

/// Deserializes only from the literal string `"always"`.
#[derive(Clone, Debug)]
pub struct AlwaysMarker;

impl Serialize for AlwaysMarker {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("always")
    }
}

impl<'de> Deserialize<'de> for AlwaysMarker {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "always" {
            Ok(AlwaysMarker)
        } else {
            Err(serde::de::Error::custom("expected the literal \"always\""))
        }
    }
}

/// A transition: a condition plus the effects to apply when it fires.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub condition: Condition,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub state_updates: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub next: Option<String>,
}
