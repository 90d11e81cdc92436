use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::ParseError;
use crate::core::message::ChatHistory;

/// Outbound chat message for a text-only completion endpoint.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One streaming chat completion frame, as deserialized by the transport
/// layer. The delta-assembling parser consumes these.
#[derive(Deserialize, Debug, Clone)]
pub struct ChatResponse {
    pub choices: Vec<ChatResponseChoice>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatToolCallDelta>>,
}

/// Incremental fragment of a function call; the name and arguments arrive
/// spread across many frames.
#[derive(Deserialize, Debug, Clone)]
pub struct ChatToolCallDelta {
    pub index: Option<u32>,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub function: Option<ChatToolCallFunctionDelta>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChatToolCallFunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// Function-calling schema entry as sent to the provider on every turn.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ChatToolFunction,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatToolFunction {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

/// Flattens a conversation history into wire messages for a text-only
/// endpoint. Non-text payloads cannot be represented here and surface
/// [`ParseError::UnsupportedContent`]; hosts route such histories to a
/// multimodal request builder instead.
pub fn history_to_wire(history: &ChatHistory) -> Result<Vec<ChatMessage>, ParseError> {
    let mut messages = Vec::with_capacity(history.len());
    for message in history.iter() {
        for content in &message.contents {
            let text = content
                .payload
                .as_text()
                .ok_or_else(|| ParseError::UnsupportedContent(content.payload.kind().to_string()))?;
            messages.push(ChatMessage {
                role: message.role.as_str().to_string(),
                content: text.to_string(),
                name: if content.name.is_empty() {
                    None
                } else {
                    Some(content.name.clone())
                },
            });
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{ContentPayload, Message, MessageContent, Role};

    #[test]
    fn deserializes_content_and_tool_call_frames() {
        let frame: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#,
        )
        .expect("content frame");
        assert_eq!(frame.choices[0].delta.content.as_deref(), Some("Hello"));

        let frame: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":null,"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"draw","arguments":""}}]},"finish_reason":null}]}"#,
        )
        .expect("tool call frame");
        let calls = frame.choices[0].delta.tool_calls.as_ref().expect("calls");
        assert_eq!(
            calls[0].function.as_ref().and_then(|f| f.name.as_deref()),
            Some("draw")
        );
    }

    #[test]
    fn history_to_wire_flattens_text_messages() {
        let mut history = ChatHistory::new();
        history.add_text(Role::System, "be brief");
        history.add_text(Role::User, "hi");
        let wire = history_to_wire(&history).expect("wire messages");
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[1].content, "hi");
    }

    #[test]
    fn history_to_wire_rejects_non_text_content() {
        let mut history = ChatHistory::new();
        history.push(Message::new(
            Role::User,
            vec![MessageContent::new(
                "img",
                ContentPayload::ImageUrl("https://x/cat.png".into()),
            )],
        ));
        let err = history_to_wire(&history).expect_err("image content");
        assert!(matches!(err, ParseError::UnsupportedContent(kind) if kind == "image/url"));
    }
}
