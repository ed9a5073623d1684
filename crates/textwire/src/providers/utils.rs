use serde_json::json;

use crate::models::message::{Message, ToolResponse};

/// Flatten a system prompt and message history into the single transcript a
/// text-completion backend consumes.
///
/// Each message becomes `"<Role>: "` followed by its text items joined with a newline,
/// terminated by a blank line. Tool requests, tool responses and opaque items are not
/// inlined here; callers that need a tool result in the transcript add it as text,
/// see [`encode_tool_result`].
pub fn messages_to_transcript(system: &str, messages: &[Message]) -> String {
    let mut transcript = String::new();

    if !system.is_empty() {
        transcript.push_str("System: ");
        transcript.push_str(system);
        transcript.push_str("\n\n");
    }

    for message in messages {
        transcript.push_str(message.role.label());
        transcript.push_str(": ");
        transcript.push_str(&message.texts().collect::<Vec<_>>().join("\n"));
        transcript.push_str("\n\n");
    }

    transcript
}

/// Encode a tool response as a fenced `tool_result` block.
///
/// Backticks inside the payload are written as the JSON escape `\u0060`, so the
/// result can never close the fence early.
pub fn encode_tool_result(response: &ToolResponse) -> String {
    let content = response
        .output
        .iter()
        .map(|content| content.summary())
        .collect::<Vec<_>>()
        .join("\n");

    let mut payload = json!({
        "tool_use_id": response.id,
        "content": content,
    });
    if response.is_error {
        payload["is_error"] = json!(true);
    }

    format!(
        "tool_result\n```json\n{}\n```",
        payload.to_string().replace('`', "\\u0060")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::Content;
    use crate::models::message::MessageContent;
    use crate::models::tool::ToolCall;
    use serde_json::Value;

    #[test]
    fn test_transcript_with_system_prompt() {
        let messages = vec![
            Message::user().with_text("Hello"),
            Message::assistant().with_text("Hi!"),
        ];
        assert_eq!(
            messages_to_transcript("Be brief.", &messages),
            "System: Be brief.\n\nUser: Hello\n\nAssistant: Hi!\n\n"
        );
    }

    #[test]
    fn test_transcript_without_system_prompt() {
        let messages = vec![Message::user().with_text("Hello")];
        let transcript = messages_to_transcript("", &messages);
        assert_eq!(transcript, "User: Hello\n\n");
        assert!(!transcript.starts_with("System: "));
    }

    #[test]
    fn test_transcript_of_nothing() {
        assert_eq!(messages_to_transcript("", &[]), "");
    }

    #[test]
    fn test_text_items_are_joined_and_others_dropped() {
        let message = Message::assistant()
            .with_text("Reading the file.")
            .with_tool_request("t1", ToolCall::new("read_file", serde_json::json!({})))
            .with_text("Done.")
            .with_content(MessageContent::Other(serde_json::json!({"type": "image"})));
        let reply = Message::user().with_tool_response("t1", vec![Content::text("contents")]);

        assert_eq!(
            messages_to_transcript("", &[message, reply]),
            "Assistant: Reading the file.\nDone.\n\nUser: \n\n"
        );
    }

    #[test]
    fn test_one_fragment_per_message_in_order() {
        let messages: Vec<Message> = (0..5)
            .map(|i| {
                let message = if i % 2 == 0 {
                    Message::user()
                } else {
                    Message::assistant()
                };
                message.with_text(format!("turn {}", i))
            })
            .collect();
        let transcript = messages_to_transcript("sys", &messages);

        let fragments: Vec<&str> = transcript.split("\n\n").filter(|s| !s.is_empty()).collect();
        assert_eq!(
            fragments,
            vec![
                "System: sys",
                "User: turn 0",
                "Assistant: turn 1",
                "User: turn 2",
                "Assistant: turn 3",
                "User: turn 4",
            ]
        );
    }

    #[test]
    fn test_encode_tool_result() {
        let message = Message::user().with_tool_response(
            "tool_use_3",
            vec![Content::text("line one"), Content::image("xyz", "image/png")],
        );
        let response = message.content[0].as_tool_response().unwrap();
        let encoded = encode_tool_result(response);

        assert!(encoded.starts_with("tool_result\n```json\n"));
        assert!(encoded.ends_with("\n```"));
        let payload: Value = serde_json::from_str(
            encoded
                .trim_start_matches("tool_result\n```json\n")
                .trim_end_matches("\n```"),
        )
        .unwrap();
        assert_eq!(payload["tool_use_id"], "tool_use_3");
        assert_eq!(payload["content"], "line one\n[image: image/png]");
        assert!(payload.get("is_error").is_none());
    }

    #[test]
    fn test_encode_tool_result_escapes_fences() {
        let response = ToolResponse {
            id: "t".to_string(),
            output: vec![Content::text("```rust\nfn main() {}\n```")],
            is_error: true,
        };
        let encoded = encode_tool_result(&response);
        let body = encoded
            .trim_start_matches("tool_result\n```json\n")
            .trim_end_matches("\n```");

        assert!(!body.contains('`'));
        let payload: Value = serde_json::from_str(body).unwrap();
        assert_eq!(payload["content"], "```rust\nfn main() {}\n```");
        assert_eq!(payload["is_error"], true);
    }
}
