use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call request that the agent loop can execute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name of the tool to execute
    pub name: String,
    /// The parameters for the execution
    #[serde(alias = "input", default)]
    pub parameters: Value,
}

impl ToolCall {
    /// Create a new ToolCall with the given name and parameters
    pub fn new<S: Into<String>>(name: S, parameters: Value) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

/// The JSON object a model writes inside a `tool_code` block
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ToolCodePayload {
    pub tool_name: String,
    pub parameters: Value,
}

impl ToolCodePayload {
    /// Parse a fenced payload. Only JSON objects are accepted; arrays that would
    /// otherwise deserialize positionally into the struct are rejected.
    pub fn parse(payload: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(payload).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}
