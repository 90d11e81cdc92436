use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// One content item inside a conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentPayload {
    Text(String),
    ImageBase64(String),
    ImageUrl(String),
    DocStream(Vec<u8>),
    DocUrl(String),
}

impl ContentPayload {
    pub fn is_text(&self) -> bool {
        matches!(self, ContentPayload::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPayload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContentPayload::Text(_) => "text",
            ContentPayload::ImageBase64(_) => "image/base64",
            ContentPayload::ImageUrl(_) => "image/url",
            ContentPayload::DocStream(_) => "doc/stream",
            ContentPayload::DocUrl(_) => "doc/url",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    pub id: String,
    pub name: String,
    pub payload: ContentPayload,
}

impl MessageContent {
    pub fn new(id: impl Into<String>, payload: ContentPayload) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            payload,
        }
    }

    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, ContentPayload::Text(text.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub contents: Vec<MessageContent>,
}

impl Message {
    pub fn new(role: Role, contents: Vec<MessageContent>) -> Self {
        Self { role, contents }
    }

    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![MessageContent::text("", text)])
    }

    /// Whether the message is exempt from token-budget trimming: system-role
    /// messages, multi-content messages, and messages whose first content is
    /// not plain text are never truncated or dropped.
    pub fn is_pinned(&self) -> bool {
        if self.role == Role::System {
            return true;
        }
        if self.contents.len() > 1 {
            return true;
        }
        self.contents
            .first()
            .is_some_and(|content| !content.payload.is_text())
    }
}

/// Chronologically ordered conversation history.
///
/// Ordering is an invariant: every transformation, trimming included, keeps
/// surviving messages in their original relative order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    messages: Vec<Message>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn add_message(&mut self, role: Role, contents: Vec<MessageContent>) {
        self.push(Message::new(role, contents));
    }

    pub fn add_text(&mut self, role: Role, text: impl Into<String>) {
        self.push(Message::text(role, text));
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }
}

impl FromIterator<Message> for ChatHistory {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}
