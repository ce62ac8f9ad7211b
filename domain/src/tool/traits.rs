//! Tool domain traits
//!
//! Pure validation of tool-call arguments against a [`ToolDefinition`].
//! The async `Tool` capability is defined in the application layer (ports).

use super::entities::{ToolDefinition, ToolParameter};
use serde_json::Value;

/// Validator for tool-call arguments
///
/// This is a pure domain trait that validates arguments
/// against a tool's declared schema without any I/O operations.
pub trait ToolValidator {
    /// Validate arguments against the tool definition
    fn validate(&self, args: &Value, definition: &ToolDefinition) -> Result<(), String>;
}

/// Default implementation of ToolValidator
///
/// Arguments must be a JSON object. Required parameters must be present,
/// unknown parameters are rejected, and each value must match its
/// declared `param_type`.
#[derive(Debug, Clone, Default)]
pub struct DefaultToolValidator;

impl ToolValidator for DefaultToolValidator {
    fn validate(&self, args: &Value, definition: &ToolDefinition) -> Result<(), String> {
        let Some(map) = args.as_object() else {
            return Err(format!(
                "Arguments for tool '{}' must be a JSON object",
                definition.name
            ));
        };

        for param in &definition.parameters {
            if param.required && !map.contains_key(&param.name) {
                return Err(format!(
                    "Missing required parameter '{}' for tool '{}'",
                    param.name, definition.name
                ));
            }
        }

        for (arg_name, value) in map {
            let Some(param) = definition.parameter(arg_name) else {
                return Err(format!(
                    "Unknown parameter '{}' for tool '{}'",
                    arg_name, definition.name
                ));
            };
            if !type_matches(param, value) {
                return Err(format!(
                    "Parameter '{}' for tool '{}' must be of type {}",
                    arg_name, definition.name, param.param_type
                ));
            }
        }

        Ok(())
    }
}

fn type_matches(param: &ToolParameter, value: &Value) -> bool {
    match param.param_type.as_str() {
        "string" | "path" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        // Unrecognised type hints are not enforced
        _ => true,
    }
}
