//! Structured output validation
//!
//! Every role answers with a JSON object of known fields. Model output is
//! never trusted directly: it is parsed, locally repaired when it arrives
//! wrapped in prose or code fences, checked field by field, and only then
//! deserialized into the role's output type.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::core::{ConclaveError, Result};

/// Expected shape of a single output field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// A JSON string
    String,
    /// A JSON array of strings
    StringList,
    /// One of a fixed set of lowercase strings
    Enum(&'static [&'static str]),
    /// Any JSON value
    Any,
}

impl FieldKind {
    fn json_schema(&self) -> Value {
        match self {
            FieldKind::String => json!({"type": "string"}),
            FieldKind::StringList => json!({"type": "array", "items": {"type": "string"}}),
            FieldKind::Enum(values) => json!({"type": "string", "enum": values}),
            FieldKind::Any => json!({}),
        }
    }

    fn describe(&self) -> String {
        match self {
            FieldKind::String => "a string".to_string(),
            FieldKind::StringList => "a list of strings".to_string(),
            FieldKind::Enum(values) => format!("one of {}", values.join(", ")),
            FieldKind::Any => "any value".to_string(),
        }
    }

    /// Check a value, normalizing enum spelling in place
    fn check(&self, value: &mut Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            FieldKind::Enum(allowed) => {
                let Some(normalized) = value.as_str().map(|s| s.trim().to_lowercase()) else {
                    return false;
                };
                if allowed.contains(&normalized.as_str()) {
                    *value = Value::String(normalized);
                    true
                } else {
                    false
                }
            }
            FieldKind::Any => true,
        }
    }
}

/// Declared field schema for a structured response
#[derive(Debug, Clone)]
pub struct OutputSchema {
    /// Schema name, used in prompts and errors
    pub name: &'static str,
    /// Required fields and their kinds
    pub fields: Vec<(&'static str, FieldKind)>,
}

impl OutputSchema {
    pub fn new(name: &'static str, fields: Vec<(&'static str, FieldKind)>) -> Self {
        Self { name, fields }
    }

    /// Render as a JSON Schema descriptor for the model
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, kind)| (name.to_string(), kind.json_schema()))
            .collect();
        let required: Vec<&str> = self.fields.iter().map(|(name, _)| *name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// One-line description of the expected object, appended to system prompts
    pub fn instructions(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(name, kind)| format!("\"{}\" ({})", name, kind.describe()))
            .collect();
        format!(
            "Respond with a single JSON object containing exactly these fields: {}.",
            fields.join(", ")
        )
    }

    /// Check that every declared field is present with the right kind
    pub fn validate(&self, component: &str, value: &mut Value) -> Result<()> {
        let object = value.as_object_mut().ok_or_else(|| {
            ConclaveError::schema(component, "expected a JSON object")
        })?;

        for (name, kind) in &self.fields {
            let Some(field) = object.get_mut(*name) else {
                return Err(ConclaveError::schema(
                    component,
                    format!("missing field '{}'", name),
                ));
            };
            if !kind.check(field) {
                return Err(ConclaveError::schema(
                    component,
                    format!("field '{}' must be {}", name, kind.describe()),
                ));
            }
        }
        Ok(())
    }
}

/// A role response type with a declared schema
pub trait StructuredOutput: DeserializeOwned {
    fn schema() -> OutputSchema;
}

/// Parse, repair, validate and deserialize a structured response
pub fn parse<T: StructuredOutput>(component: &str, raw: &str) -> Result<T> {
    let mut value = parse_json(component, raw)?;
    T::schema().validate(component, &mut value)?;
    serde_json::from_value(value).map_err(|e| ConclaveError::schema(component, e.to_string()))
}

/// Parse model text as JSON, repairing fenced or prose-wrapped objects
pub fn parse_json(component: &str, raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConclaveError::malformed(component, "empty response"));
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let unfenced = strip_code_fence(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        tracing::debug!(component, "repaired fenced structured output");
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&unfenced[start..=end]) {
                tracing::debug!(component, "repaired prose-wrapped structured output");
                return Ok(value);
            }
        }
    }

    let preview: String = trimmed.chars().take(200).collect();
    Err(ConclaveError::malformed(
        component,
        format!("response is not valid JSON: {}", preview),
    ))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
