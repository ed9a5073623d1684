use serde::{Deserialize, Serialize};

/// Token accounting for one call, as reported by a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Default::default()
        }
    }
}

/// One unit of the event stream handed back to the agent loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiStreamChunk {
    Text {
        text: String,
    },
    Reasoning {
        reasoning: String,
    },
    ToolCode {
        tool_code: String,
    },
    ToolUse {
        name: String,
        content: String,
        id: String,
    },
    Usage(Usage),
}

impl ApiStreamChunk {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ApiStreamChunk::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ApiStreamChunk::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(self, ApiStreamChunk::ToolUse { .. })
    }
}
