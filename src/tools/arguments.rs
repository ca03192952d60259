//! Typed access to tool call arguments.

use serde_json::Value;

use crate::error::RondoError;

/// Parsed arguments of one call, with typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    call_id: String,
    value: Value,
}

impl ToolArguments {
    pub fn new(call_id: impl Into<String>, value: Value) -> Self {
        Self {
            call_id: call_id.into(),
            value,
        }
    }

    /// Parse a raw argument string. An empty string is an empty object.
    pub fn parse(call_id: impl Into<String>, raw: &str) -> Result<Self, RondoError> {
        let call_id = call_id.into();
        let trimmed = raw.trim();
        let value = if trimmed.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str::<Value>(trimmed).map_err(|e| RondoError::InvalidArguments {
                call_id: call_id.clone(),
                message: format!("arguments are not valid JSON: {e}"),
            })?
        };
        Ok(Self { call_id, value })
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &Value {
        &self.value
    }

    fn missing(&self, what: &str, key: &str) -> RondoError {
        RondoError::InvalidArguments {
            call_id: self.call_id.clone(),
            message: format!("Missing {what} argument: {key}"),
        }
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, RondoError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| self.missing("string", key))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, RondoError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| self.missing("integer", key))
    }

    /// Get a float argument.
    pub fn get_f64(&self, key: &str) -> Result<f64, RondoError> {
        self.value
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| self.missing("float", key))
    }

    /// Get a boolean argument.
    pub fn get_bool(&self, key: &str) -> Result<bool, RondoError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| self.missing("boolean", key))
    }

    /// Get an array argument.
    pub fn get_array(&self, key: &str) -> Result<&Vec<Value>, RondoError> {
        self.value
            .get(key)
            .and_then(|v| v.as_array())
            .ok_or_else(|| self.missing("array", key))
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, RondoError> {
        serde_json::from_value(self.value.clone()).map_err(|e| RondoError::InvalidArguments {
            call_id: self.call_id.clone(),
            message: format!("Failed to deserialize arguments: {e}"),
        })
    }
}
