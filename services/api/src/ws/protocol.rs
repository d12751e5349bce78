//! Defines the WebSocket message protocol between the browser client and the API server.
//!
//! Inbound frames carry no reliable type tag: a frame is a control message
//! only if it parses as a JSON object with a string `type`, and everything
//! else is captured audio.

use crate::models::SessionSettings;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;

pub const GENERIC_ERROR: &str = "Error processing your request";

/// A typed request from the client, distinct from raw audio.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMessage {
    pub kind: String,
    /// The `payload` object of the message; empty when absent.
    pub payload: Map<String, Value>,
}

/// An inbound frame after classification.
#[derive(Debug, PartialEq)]
pub enum InboundFrame<'a> {
    Control(ControlMessage),
    Audio(&'a [u8]),
}

/// Classifies raw frame bytes. Never fails: anything that isn't a typed JSON
/// object is audio.
pub fn classify(raw: &[u8]) -> InboundFrame<'_> {
    let Ok(Value::Object(mut object)) = serde_json::from_slice::<Value>(raw) else {
        return InboundFrame::Audio(raw);
    };
    let Some(Value::String(kind)) = object.remove("type") else {
        return InboundFrame::Audio(raw);
    };
    let payload = match object.remove("payload") {
        Some(Value::Object(payload)) => payload,
        _ => Map::new(),
    };
    InboundFrame::Control(ControlMessage { kind, payload })
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Float32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SettingsPayload {
    pub settings: SessionSettings,
}

/// Messages sent from the server to the client (browser).
///
/// Audio chunks travel as binary frames between `AudioStart` and `AudioEnd`
/// and have no variant here.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `get_settings` and `update_settings`.
    SettingsData { payload: SettingsPayload },
    /// Marks the beginning of a synthesized audio reply.
    AudioStart { format: AudioFormat },
    /// Marks the end of a synthesized audio reply.
    AudioEnd,
    /// A tool invocation result, forwarded verbatim.
    ToolCall { content: String },
    /// A recoverable failure; the session stays open.
    Error { message: String },
    Voices { voices: Vec<String> },
    VoiceSelected { voice: String, success: bool },
}

impl ServerMessage {
    pub fn settings(settings: SessionSettings) -> Self {
        Self::SettingsData {
            payload: SettingsPayload { settings },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            error!(error = %e, "Failed to serialize server message");
            format!(r#"{{"type":"error","message":"{GENERIC_ERROR}"}}"#)
        })
    }
}
