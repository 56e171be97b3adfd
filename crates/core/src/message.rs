//! Message domain types.
//!
//! A [`Message`] is one conversation turn. Each role is its own variant so
//! that role-specific attributes (tool invocations on assistant turns, the
//! back-reference on tool turns) cannot appear where they are meaningless.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// Tool execution result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// Message content: plain text or a sequence of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One typed part of structured content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
    },
    File {
        file_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Content {
    /// Concatenation of all plain-text fragments. Non-text parts contribute nothing.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Length of the plain text in characters.
    pub fn char_len(&self) -> usize {
        match self {
            Self::Text(text) => text.chars().count(),
            Self::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => text.chars().count(),
                    _ => 0,
                })
                .sum(),
        }
    }

    pub fn has_images(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Parts(parts) => parts
                .iter()
                .any(|part| matches!(part, ContentPart::ImageUrl { .. })),
        }
    }

    /// Replace the text of this content, keeping any non-text parts.
    ///
    /// For structured content the new text takes the position of the first
    /// text part; the remaining text parts are removed.
    pub fn with_text(&self, text: String) -> Self {
        match self {
            Self::Text(_) => Self::Text(text),
            Self::Parts(parts) => {
                let mut out = Vec::with_capacity(parts.len());
                let mut replacement = Some(text);
                for part in parts {
                    match part {
                        ContentPart::Text { .. } => {
                            if let Some(text) = replacement.take() {
                                out.push(ContentPart::Text { text });
                            }
                        }
                        other => out.push(other.clone()),
                    }
                }
                if let Some(text) = replacement {
                    out.insert(0, ContentPart::Text { text });
                }
                Self::Parts(out)
            }
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// A file or image attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Invocation id. Missing or empty ids can never be matched.
    #[serde(default)]
    pub id: Option<String>,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    #[serde(default)]
    pub arguments: String,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// The id, if present and non-empty.
    pub fn valid_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Model reasoning attached to an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reasoning {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub id: String,
    #[serde(default)]
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: String,
    #[serde(default)]
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub id: String,
    #[serde(default)]
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMessage {
    pub id: String,
    #[serde(default)]
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// The invocation id this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System(SystemMessage),
    User(UserMessage),
    Assistant(AssistantMessage),
    Tool(ToolMessage),
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<Content>) -> Self {
        Self::System(SystemMessage {
            id: new_id(),
            content: content.into(),
            created_at: Some(Utc::now()),
        })
    }

    /// Create a new user message.
    pub fn user(content: impl Into<Content>) -> Self {
        Self::User(UserMessage {
            id: new_id(),
            content: content.into(),
            created_at: Some(Utc::now()),
            attachments: Vec::new(),
        })
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::assistant_with_tool_calls(content, Vec::new())
    }

    /// Create an assistant message that invokes tools.
    pub fn assistant_with_tool_calls(
        content: impl Into<Content>,
        tool_calls: Vec<ToolInvocation>,
    ) -> Self {
        Self::Assistant(AssistantMessage {
            id: new_id(),
            content: content.into(),
            created_at: Some(Utc::now()),
            tool_calls,
            reasoning: None,
            attachments: Vec::new(),
        })
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<Content>) -> Self {
        Self::Tool(ToolMessage {
            id: new_id(),
            content: content.into(),
            created_at: Some(Utc::now()),
            tool_call_id: Some(tool_call_id.into()),
            name: None,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        match &mut self {
            Self::System(m) => m.id = id,
            Self::User(m) => m.id = id,
            Self::Assistant(m) => m.id = id,
            Self::Tool(m) => m.id = id,
        }
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        match &mut self {
            Self::System(m) => m.created_at = created_at,
            Self::User(m) => m.created_at = created_at,
            Self::Assistant(m) => m.created_at = created_at,
            Self::Tool(m) => m.created_at = created_at,
        }
        self
    }

    /// Return a copy with its content replaced.
    pub fn with_content(&self, content: Content) -> Self {
        let mut out = self.clone();
        match &mut out {
            Self::System(m) => m.content = content,
            Self::User(m) => m.content = content,
            Self::Assistant(m) => m.content = content,
            Self::Tool(m) => m.content = content,
        }
        out
    }

    pub fn id(&self) -> &str {
        match self {
            Self::System(m) => &m.id,
            Self::User(m) => &m.id,
            Self::Assistant(m) => &m.id,
            Self::Tool(m) => &m.id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System(_) => Role::System,
            Self::User(_) => Role::User,
            Self::Assistant(_) => Role::Assistant,
            Self::Tool(_) => Role::Tool,
        }
    }

    pub fn content(&self) -> &Content {
        match self {
            Self::System(m) => &m.content,
            Self::User(m) => &m.content,
            Self::Assistant(m) => &m.content,
            Self::Tool(m) => &m.content,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::System(m) => m.created_at,
            Self::User(m) => m.created_at,
            Self::Assistant(m) => m.created_at,
            Self::Tool(m) => m.created_at,
        }
    }

    /// Plain text of the content.
    pub fn text(&self) -> String {
        self.content().text()
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// Tool invocations declared by an assistant turn; empty for other roles.
    pub fn tool_calls(&self) -> &[ToolInvocation] {
        match self {
            Self::Assistant(m) => &m.tool_calls,
            _ => &[],
        }
    }

    /// Back-reference id of a tool turn, if present and non-empty.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::Tool(m) => m.tool_call_id.as_deref().filter(|id| !id.is_empty()),
            _ => None,
        }
    }

    pub fn has_images(&self) -> bool {
        let attached = match self {
            Self::User(m) => &m.attachments,
            Self::Assistant(m) => &m.attachments,
            _ => return self.content().has_images(),
        };
        attached.iter().any(|a| a.kind == AttachmentKind::Image) || self.content().has_images()
    }

    pub fn has_reasoning(&self) -> bool {
        matches!(self, Self::Assistant(m) if m.reasoning.as_ref().is_some_and(|r| !r.content.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.text(), "Hello, agent!");
        assert!(msg.tool_calls().is_empty());
        assert!(msg.created_at().is_some());
    }

    #[test]
    fn message_serializes_with_role_tag() {
        let msg = Message::tool_result("call_1", "42").with_id("t1");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");

        let parsed: Message = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.tool_call_id(), Some("call_1"));
        assert_eq!(parsed.id(), "t1");
    }

    #[test]
    fn structured_content_text_ignores_images() {
        let content = Content::Parts(vec![
            ContentPart::Text { text: "look at ".into() },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "https://example.com/cat.png".into(),
                    detail: None,
                },
            },
            ContentPart::Text { text: "this".into() },
        ]);
        assert_eq!(content.text(), "look at this");
        assert_eq!(content.char_len(), 12);
        assert!(content.has_images());
    }

    #[test]
    fn with_text_keeps_non_text_parts() {
        let content = Content::Parts(vec![
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "img".into(),
                    detail: None,
                },
            },
            ContentPart::Text { text: "a".into() },
            ContentPart::Text { text: "b".into() },
        ]);
        let replaced = content.with_text("short...".into());
        let Content::Parts(parts) = &replaced else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(replaced.text(), "short...");
        assert!(replaced.has_images());
    }

    #[test]
    fn empty_invocation_id_is_not_valid() {
        let mut call = ToolInvocation::new("", "search", "{}");
        assert_eq!(call.valid_id(), None);
        call.id = None;
        assert_eq!(call.valid_id(), None);
        call.id = Some("call_1".into());
        assert_eq!(call.valid_id(), Some("call_1"));
    }

    #[test]
    fn role_specific_accessors() {
        let assistant = Message::assistant_with_tool_calls(
            "",
            vec![ToolInvocation::new("call_1", "weather", "{}")],
        );
        assert_eq!(assistant.tool_calls().len(), 1);
        assert_eq!(assistant.tool_call_id(), None);

        let user = Message::user("hi");
        assert!(user.tool_calls().is_empty());
        assert!(!user.has_reasoning());
    }

    #[test]
    fn deserializes_missing_invocation_id() {
        let json = serde_json::json!({
            "role": "assistant",
            "id": "a1",
            "content": "",
            "tool_calls": [{"name": "search", "arguments": "{}"}]
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert_eq!(msg.tool_calls()[0].valid_id(), None);
    }
}
