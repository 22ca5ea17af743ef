//! Tool boundary and schema validation.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::llm_types::ToolDefinition;

/// Default per-tool execution timeout
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 10;

/// A tool the reasoning loop can invoke.
///
/// Handlers receive the raw arguments object (already schema-validated) and
/// return a JSON payload. Handlers never see or mutate session state directly.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn schema(&self) -> ToolSchema;

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError>;

    /// Validate arguments against the schema before execution.
    fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        self.schema().validate(arguments)
    }

    fn timeout_secs(&self) -> u64 {
        DEFAULT_TOOL_TIMEOUT_SECS
    }

    /// Definition advertised to the model
    fn definition(&self) -> ToolDefinition {
        self.schema().to_definition()
    }
}

/// Parameter type for schema validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Number,
    Boolean,
}

impl ParameterType {
    fn json_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone)]
pub struct ParameterSchema {
    pub name: String,
    pub description: String,
    pub param_type: ParameterType,
    pub required: bool,
}

/// Declarative tool schema, rendered to JSON Schema for the model.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn string_param(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.parameters.push(ParameterSchema {
            name: name.into(),
            description: description.into(),
            param_type: ParameterType::String,
            required,
        });
        self
    }

    pub fn param(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        param_type: ParameterType,
        required: bool,
    ) -> Self {
        self.parameters.push(ParameterSchema {
            name: name.into(),
            description: description.into(),
            param_type,
            required,
        });
        self
    }

    /// Validate an arguments object: required fields present, types match.
    pub fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        let object = match arguments {
            Value::Object(map) => map,
            Value::Null if self.parameters.iter().all(|p| !p.required) => return Ok(()),
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "expected an arguments object, got {}",
                    json_type_name(other)
                )))
            }
        };

        for param in &self.parameters {
            match object.get(&param.name) {
                Some(value) => {
                    if !param.param_type.matches(value) && !value.is_null() {
                        return Err(ToolError::InvalidArguments(format!(
                            "parameter '{}' expected {}, got {}",
                            param.name,
                            param.param_type.json_name(),
                            json_type_name(value)
                        )));
                    }
                }
                None if param.required => {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required parameter '{}'",
                        param.name
                    )));
                }
                None => {}
            }
        }

        Ok(())
    }

    /// Render as a JSON Schema object.
    pub fn to_json(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.param_type.json_name(),
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.to_json(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ToolSchema {
        ToolSchema::new("save_lead", "Save a renter's contact information")
            .string_param("name", "The renter's name", true)
            .string_param("email", "The renter's email address", true)
            .string_param("notes", "Additional notes", false)
    }

    #[test]
    fn validate_accepts_valid_arguments() {
        let args = json!({ "name": "Jordan", "email": "jordan@example.com" });
        assert!(schema().validate(&args).is_ok());
    }

    #[test]
    fn validate_rejects_missing_required() {
        let args = json!({ "name": "Jordan" });
        let err = schema().validate(&args).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let args = json!({ "name": 42, "email": "jordan@example.com" });
        assert!(schema().validate(&args).is_err());
    }

    #[test]
    fn validate_rejects_non_object() {
        assert!(schema().validate(&json!("name=Jordan")).is_err());
    }

    #[test]
    fn json_schema_shape() {
        let rendered = schema().to_json();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["required"].as_array().map(|r| r.len()), Some(2));
        assert_eq!(rendered["properties"]["name"]["type"], "string");
    }
}
