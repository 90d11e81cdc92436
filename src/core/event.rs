use serde_json::{Map, Value};

/// Unified event vocabulary emitted by every wire parser.
///
/// The set is closed: parsers never introduce new variants, which is what
/// keeps provider-specific parsers interchangeable behind one contract.
/// `FunctionCallStart` is a hint only — a call may be announced and never
/// completed. `FunctionCallInvoke` arguments may carry keys that the matching
/// descriptor does not declare; consumers ignore unknown keys rather than
/// rejecting the call.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatEvent {
    TextChunk(String),
    ImageChunk(Vec<u8>),
    FunctionCallStart {
        name: String,
    },
    FunctionCallInvoke {
        name: String,
        arguments: Map<String, Value>,
    },
}

impl ChatEvent {
    pub fn text(content: impl Into<String>) -> Self {
        ChatEvent::TextChunk(content.into())
    }

    pub fn image(bytes: impl Into<Vec<u8>>) -> Self {
        ChatEvent::ImageChunk(bytes.into())
    }

    pub fn function_start(name: impl Into<String>) -> Self {
        ChatEvent::FunctionCallStart { name: name.into() }
    }

    pub fn function_invoke(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        ChatEvent::FunctionCallInvoke {
            name: name.into(),
            arguments,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ChatEvent::TextChunk(_))
    }

    /// Text payload, if this is a text chunk.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ChatEvent::TextChunk(text) => Some(text),
            _ => None,
        }
    }
}
