//! Parser schemas: a compact JSON-schema-like type compiled directly into a
//! recursive validator. There is no separate `Validator` struct distinct
//! from `ParserSchema` itself: `ParserSchema::validate` is the compiled
//! form, operating directly on the schema value rather than building an
//! intermediate closure.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tagged-variant schema for a single value. Every variant may carry a
/// `default` and an `enum` restriction; numeric and string variants carry
/// their own bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParserSchema {
    /// Accepts any value as-is, unmodified.
    Unknown(CommonConstraints),
    String(StringSchema),
    Number(NumberSchema),
    Boolean(CommonConstraints),
    Array(ArraySchema),
    Object(ObjectSchema),
}

/// Constraints shared by every variant: a default value and an enum
/// restriction. Kept as a separate struct so each variant can `#[serde(flatten)]`
/// it alongside variant-specific fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CommonConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enumerated: Option<Vec<Value>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringSchema {
    #[serde(flatten)]
    pub common: CommonConstraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NumberSchema {
    #[serde(flatten)]
    pub common: CommonConstraints,
    #[serde(default)]
    pub integer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArraySchema {
    #[serde(flatten)]
    pub common: CommonConstraints,
    pub items: Box<ParserSchema>,
}

/// Object schemas preserve authoring order of `properties` via `IndexMap`,
/// which matters for `argsSchema`-driven positional ordering (see §4.5.1 of
/// the companion spec).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSchema {
    #[serde(flatten)]
    pub common: CommonConstraints,
    #[serde(default)]
    pub properties: IndexMap<String, ParserSchema>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default = "default_additional_properties")]
    pub additional_properties: bool,
}

fn default_additional_properties() -> bool {
    true
}

/// A structured validation failure. `path` is a dotted JSON-pointer-like
/// location (`"user.items[2].name"`), empty for a failure at the schema root.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn at(path: &str, message: impl Into<String>) -> Self {
        Self { path: path.to_string(), message: message.into() }
    }

    fn nested(&self, prefix: &str) -> Self {
        let path = if self.path.is_empty() {
            prefix.to_string()
        } else if prefix.is_empty() {
            self.path.clone()
        } else {
            format!("{prefix}.{}", self.path)
        };
        Self { path, message: self.message.clone() }
    }
}

impl ParserSchema {
    fn common(&self) -> &CommonConstraints {
        match self {
            ParserSchema::Unknown(c) | ParserSchema::Boolean(c) => c,
            ParserSchema::String(s) => &s.common,
            ParserSchema::Number(n) => &n.common,
            ParserSchema::Array(a) => &a.common,
            ParserSchema::Object(o) => &o.common,
        }
    }

    /// Validate and coerce `candidate` against this schema. On success,
    /// returns the coerced value: defaults applied recursively, enums
    /// checked, integers rounded when `integer: true`. Idempotent: calling
    /// `validate` again on the returned value yields the same value.
    pub fn validate(&self, candidate: &Value) -> Result<Value, ValidationError> {
        self.validate_at("", candidate)
    }

    fn validate_at(&self, path: &str, candidate: &Value) -> Result<Value, ValidationError> {
        let candidate = if candidate.is_null() {
            match &self.common().default {
                Some(default) => default.clone(),
                None => candidate.clone(),
            }
        } else {
            candidate.clone()
        };

        if let Some(enumerated) = &self.common().enumerated {
            if !candidate.is_null() && !enumerated.contains(&candidate) {
                return Err(ValidationError::at(
                    path,
                    format!("value {candidate} is not one of the allowed values {enumerated:?}"),
                ));
            }
        }

        match self {
            ParserSchema::Unknown(_) => Ok(candidate),
            ParserSchema::Boolean(_) => match candidate {
                Value::Bool(_) => Ok(candidate),
                Value::Null => Ok(Value::Null),
                other => Err(ValidationError::at(path, format!("expected boolean, got {other}"))),
            },
            ParserSchema::String(s) => Self::validate_string(path, s, candidate),
            ParserSchema::Number(n) => Self::validate_number(path, n, candidate),
            ParserSchema::Array(a) => self.validate_array(path, a, candidate),
            ParserSchema::Object(o) => self.validate_object(path, o, candidate),
        }
    }

    fn validate_string(path: &str, schema: &StringSchema, candidate: Value) -> Result<Value, ValidationError> {
        let Value::String(s) = &candidate else {
            if candidate.is_null() {
                return Ok(candidate);
            }
            return Err(ValidationError::at(path, format!("expected string, got {candidate}")));
        };
        if let Some(min) = schema.min_length {
            if s.len() < min {
                return Err(ValidationError::at(path, format!("string shorter than minimum length {min}")));
            }
        }
        if let Some(max) = schema.max_length {
            if s.len() > max {
                return Err(ValidationError::at(path, format!("string longer than maximum length {max}")));
            }
        }
        Ok(candidate)
    }

    fn validate_number(path: &str, schema: &NumberSchema, candidate: Value) -> Result<Value, ValidationError> {
        if candidate.is_null() {
            return Ok(candidate);
        }
        let Some(n) = candidate.as_f64() else {
            return Err(ValidationError::at(path, format!("expected number, got {candidate}")));
        };
        if let Some(min) = schema.minimum {
            if n < min {
                return Err(ValidationError::at(path, format!("{n} is below minimum {min}")));
            }
        }
        if let Some(max) = schema.maximum {
            if n > max {
                return Err(ValidationError::at(path, format!("{n} is above maximum {max}")));
            }
        }
        if schema.integer {
            let rounded = n.round();
            return Ok(serde_json::Number::from_f64(rounded).map(Value::Number).unwrap_or(candidate));
        }
        Ok(candidate)
    }

    fn validate_array(&self, path: &str, schema: &ArraySchema, candidate: Value) -> Result<Value, ValidationError> {
        if candidate.is_null() {
            return Ok(candidate);
        }
        let Value::Array(items) = candidate else {
            return Err(ValidationError::at(path, format!("expected array, got {candidate}")));
        };
        let mut out = Vec::with_capacity(items.len());
        for (idx, item) in items.into_iter().enumerate() {
            let item_path = format!("{path}[{idx}]");
            out.push(schema.items.validate_at(&item_path, &item).map_err(|e| e.nested(""))?);
        }
        Ok(Value::Array(out))
    }

    fn validate_object(&self, path: &str, schema: &ObjectSchema, candidate: Value) -> Result<Value, ValidationError> {
        if candidate.is_null() {
            return Ok(candidate);
        }
        let Value::Object(mut map) = candidate else {
            return Err(ValidationError::at(path, format!("expected object, got {candidate}")));
        };

        let mut out = serde_json::Map::new();
        for (key, property_schema) in &schema.properties {
            let raw = map.remove(key).unwrap_or(Value::Null);
            let field_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
            let validated = property_schema.validate_at(&field_path, &raw)?;
            if !validated.is_null() || map.contains_key(key) {
                out.insert(key.clone(), validated);
            } else if property_schema.common().default.is_some() {
                out.insert(key.clone(), validated);
            }
        }

        if schema.additional_properties {
            for (key, value) in map {
                out.insert(key, value);
            }
        } else if !map.is_empty() {
            let extra: Vec<&String> = map.keys().collect();
            return Err(ValidationError::at(path, format!("unexpected additional properties: {extra:?}")));
        }

        for required_key in &schema.required {
            if !out.contains_key(required_key) {
                let field_path = if path.is_empty() { required_key.clone() } else { format!("{path}.{required_key}") };
                return Err(ValidationError::at(&field_path, "required property is missing"));
            }
        }

        Ok(Value::Object(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_accepts_anything() {
        let schema = ParserSchema::Unknown(CommonConstraints::default());
        assert_eq!(schema.validate(&json!({"a": 1})).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn string_applies_default_when_absent() {
        let schema = ParserSchema::String(StringSchema {
            common: CommonConstraints { default: Some(json!("fallback")), enumerated: None },
            min_length: None,
            max_length: None,
        });
        assert_eq!(schema.validate(&Value::Null).unwrap(), json!("fallback"));
    }

    #[test]
    fn enum_rejects_values_outside_the_set() {
        let schema = ParserSchema::String(StringSchema {
            common: CommonConstraints { default: None, enumerated: Some(vec![json!("instruct"), json!("approve")]) },
            min_length: None,
            max_length: None,
        });
        assert!(schema.validate(&json!("fail")).is_err());
        assert!(schema.validate(&json!("approve")).is_ok());
    }

    #[test]
    fn integer_true_rounds_numeric_values() {
        let schema = ParserSchema::Number(NumberSchema {
            common: CommonConstraints::default(),
            integer: true,
            minimum: None,
            maximum: None,
        });
        assert_eq!(schema.validate(&json!(2.6)).unwrap(), json!(3.0));
    }

    #[test]
    fn object_requires_every_required_key_after_defaults() {
        let mut properties = IndexMap::new();
        properties.insert(
            "name".to_string(),
            ParserSchema::String(StringSchema::default()),
        );
        properties.insert(
            "retries".to_string(),
            ParserSchema::Number(NumberSchema {
                common: CommonConstraints { default: Some(json!(0)), enumerated: None },
                integer: true,
                minimum: None,
                maximum: None,
            }),
        );
        let schema = ParserSchema::Object(ObjectSchema {
            common: CommonConstraints::default(),
            properties,
            required: vec!["name".to_string(), "retries".to_string()],
            additional_properties: true,
        });

        let result = schema.validate(&json!({"name": "alice"})).unwrap();
        assert_eq!(result, json!({"name": "alice", "retries": 0.0}));

        let err = schema.validate(&json!({})).unwrap_err();
        assert_eq!(err.path, "name");
    }

    #[test]
    fn additional_properties_false_rejects_unknown_keys() {
        let schema = ParserSchema::Object(ObjectSchema {
            common: CommonConstraints::default(),
            properties: IndexMap::new(),
            required: vec![],
            additional_properties: false,
        });
        assert!(schema.validate(&json!({"surprise": true})).is_err());
    }

    #[test]
    fn validation_is_idempotent() {
        let schema = ParserSchema::Number(NumberSchema {
            common: CommonConstraints { default: Some(json!(1)), enumerated: None },
            integer: true,
            minimum: None,
            maximum: None,
        });
        let once = schema.validate(&json!(4.2)).unwrap();
        let twice = schema.validate(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn array_validates_each_item_against_items_schema() {
        let schema = ParserSchema::Array(ArraySchema {
            common: CommonConstraints::default(),
            items: Box::new(ParserSchema::Number(NumberSchema::default())),
        });
        assert!(schema.validate(&json!([1, 2, "x"])).is_err());
        assert!(schema.validate(&json!([1, 2, 3])).is_ok());
    }
}
