use chrono::Utc;
use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::{Content, TextContent};
use super::role::Role;
use super::tool::ToolCall;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    #[serde(flatten)]
    pub tool_call: ToolCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(alias = "tool_use_id")]
    pub id: String,
    #[serde(
        default,
        alias = "content",
        deserialize_with = "text_or_items"
    )]
    pub output: Vec<Content>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq)]
/// Content passed inside a message.
///
/// Items of a type this crate does not know are kept as opaque JSON in `Other`
/// rather than failing the whole message.
pub enum MessageContent {
    Text(TextContent),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
    Other(Value),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum TaggedContent {
    #[serde(rename = "text")]
    Text(TextContent),
    #[serde(rename = "tool_use")]
    ToolRequest(ToolRequest),
    #[serde(rename = "tool_result")]
    ToolResponse(ToolResponse),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum TaggedContentRef<'a> {
    #[serde(rename = "text")]
    Text(&'a TextContent),
    #[serde(rename = "tool_use")]
    ToolRequest(&'a ToolRequest),
    #[serde(rename = "tool_result")]
    ToolResponse(&'a ToolResponse),
}

impl Serialize for MessageContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MessageContent::Text(text) => TaggedContentRef::Text(text).serialize(serializer),
            MessageContent::ToolRequest(request) => {
                TaggedContentRef::ToolRequest(request).serialize(serializer)
            }
            MessageContent::ToolResponse(response) => {
                TaggedContentRef::ToolResponse(response).serialize(serializer)
            }
            MessageContent::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match serde_json::from_value::<TaggedContent>(value.clone()) {
            Ok(TaggedContent::Text(text)) => MessageContent::Text(text),
            Ok(TaggedContent::ToolRequest(request)) => MessageContent::ToolRequest(request),
            Ok(TaggedContent::ToolResponse(response)) => MessageContent::ToolResponse(response),
            Err(_) => MessageContent::Other(value),
        })
    }
}

impl From<TextContent> for MessageContent {
    fn from(text: TextContent) -> Self {
        MessageContent::Text(text)
    }
}

/// Accept either a bare string or a list of typed items
fn text_or_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + From<TextContent>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrItems<T> {
        Text(String),
        Items(Vec<T>),
    }

    Ok(match TextOrItems::<T>::deserialize(deserializer)? {
        TextOrItems::Text(text) => vec![TextContent { text }.into()],
        TextOrItems::Items(items) => items,
    })
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn tool_request<S: Into<String>>(id: S, tool_call: ToolCall) -> Self {
        MessageContent::ToolRequest(ToolRequest {
            id: id.into(),
            tool_call,
        })
    }

    pub fn tool_response<S: Into<String>>(id: S, output: Vec<Content>) -> Self {
        MessageContent::ToolResponse(ToolResponse {
            id: id.into(),
            output,
            is_error: false,
        })
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref tool_request) = self {
            Some(tool_request)
        } else {
            None
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        if let MessageContent::ToolResponse(ref tool_response) = self {
            Some(tool_response)
        } else {
            None
        }
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    #[serde(default = "now")]
    pub created: i64,
    #[serde(deserialize_with = "text_or_items")]
    pub content: Vec<MessageContent>,
}

fn now() -> i64 {
    Utc::now().timestamp()
}

impl Message {
    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message {
            role: Role::User,
            created: now(),
            content: Vec::new(),
        }
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Message {
            role: Role::Assistant,
            created: now(),
            content: Vec::new(),
        }
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add a tool request to the message
    pub fn with_tool_request<S: Into<String>>(self, id: S, tool_call: ToolCall) -> Self {
        self.with_content(MessageContent::tool_request(id, tool_call))
    }

    /// Add a tool response to the message
    pub fn with_tool_response<S: Into<String>>(self, id: S, output: Vec<Content>) -> Self {
        self.with_content(MessageContent::tool_response(id, output))
    }

    /// The text items of this message, in order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(MessageContent::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_builder() {
        let message = Message::assistant()
            .with_text("Let me look.")
            .with_tool_request("call_1", ToolCall::new("read_file", json!({"path": "a"})));

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content.len(), 2);
        assert_eq!(message.texts().collect::<Vec<_>>(), vec!["Let me look."]);
        assert_eq!(
            message.content[1].as_tool_request().unwrap().tool_call.name,
            "read_file"
        );
    }

    #[test]
    fn test_deserialize_bare_string_content() {
        let message: Message =
            serde_json::from_value(json!({"role": "user", "content": "hello"})).unwrap();
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content, vec![MessageContent::text("hello")]);
    }

    #[test]
    fn test_deserialize_item_list() {
        let message: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": [
                {"type": "text", "text": "checking"},
                {"type": "tool_use", "id": "toolu_1", "name": "shell", "input": {"cmd": "ls"}},
            ]
        }))
        .unwrap();

        assert_eq!(message.content.len(), 2);
        let request = message.content[1].as_tool_request().unwrap();
        assert_eq!(request.id, "toolu_1");
        assert_eq!(request.tool_call, ToolCall::new("shell", json!({"cmd": "ls"})));
    }

    #[test]
    fn test_deserialize_tool_result_with_string_content() {
        let message: Message = serde_json::from_value(json!({
            "role": "user",
            "content": [{"type": "tool_result", "tool_use_id": "toolu_1", "content": "a.txt"}]
        }))
        .unwrap();

        let response = message.content[0].as_tool_response().unwrap();
        assert_eq!(response.id, "toolu_1");
        assert_eq!(response.output, vec![Content::text("a.txt")]);
        assert!(!response.is_error);
    }

    #[test]
    fn test_unknown_items_are_kept_opaque() {
        let item = json!({"type": "document", "source": {"data": "..."}});
        let message: Message =
            serde_json::from_value(json!({"role": "user", "content": [item.clone()]})).unwrap();

        assert_eq!(message.content, vec![MessageContent::Other(item.clone())]);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["content"][0], item);
    }

    #[test]
    fn test_content_serialization_is_tagged() {
        let value = serde_json::to_value(MessageContent::text("hi")).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hi"}));

        let value = serde_json::to_value(MessageContent::tool_request(
            "t1",
            ToolCall::new("shell", json!({})),
        ))
        .unwrap();
        assert_eq!(value["type"], "tool_use");
        assert_eq!(value["name"], "shell");
    }
}
