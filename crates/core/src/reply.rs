//! Structured replies produced by a conversation engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A validated reply: either text to be spoken or a tool invocation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text the synthesizer should speak back to the user.
    Speech { text: String },
    /// An action result forwarded to the client verbatim.
    ToolCall { content: String },
}

/// A reply as an engine emits it, before shape validation.
///
/// Engines prompt their model to answer with `{"type": ..., "content": ...}`,
/// so nothing about this structure is trusted until it is converted into a
/// [`Reply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReply {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl RawReply {
    pub fn speech(text: impl Into<String>) -> Self {
        Self {
            kind: Some("speech".to_string()),
            content: Some(Value::String(text.into())),
        }
    }

    pub fn tool_call(content: impl Into<String>) -> Self {
        Self {
            kind: Some("tool_call".to_string()),
            content: Some(Value::String(content.into())),
        }
    }
}

/// Reasons a [`RawReply`] fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("reply is missing the `type` field")]
    MissingKind,
    #[error("reply is missing the `content` field")]
    MissingContent,
    #[error("unknown reply type `{0}`")]
    UnknownKind(String),
    #[error("reply content must be a string")]
    NonTextContent,
}

impl TryFrom<RawReply> for Reply {
    type Error = ReplyError;

    fn try_from(raw: RawReply) -> Result<Self, Self::Error> {
        let kind = raw.kind.ok_or(ReplyError::MissingKind)?;
        let content = match raw.content {
            None | Some(Value::Null) => return Err(ReplyError::MissingContent),
            Some(Value::String(content)) => content,
            Some(_) => return Err(ReplyError::NonTextContent),
        };
        // "audio" is what older prompts asked the model to emit for speech.
        match kind.as_str() {
            "speech" | "audio" => Ok(Reply::Speech { text: content }),
            "tool_call" => Ok(Reply::ToolCall { content }),
            _ => Err(ReplyError::UnknownKind(kind)),
        }
    }
}

impl From<Reply> for RawReply {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Speech { text } => RawReply::speech(text),
            Reply::ToolCall { content } => RawReply::tool_call(content),
        }
    }
}
