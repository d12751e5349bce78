//! API and Session Models
//!
//! This module defines the per-session settings document and the request and
//! response bodies of the REST surface, which also feed the OpenAPI document
//! generated with `utoipa`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Per-connection client settings, returned verbatim by `get_settings`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub theme: String,
    #[serde(default)]
    pub active_voice_agent: String,
    /// Agent name to agent configuration. Opaque to the gateway beyond the
    /// `model`/`url` keys checked by [`SessionSettings::validate`].
    #[serde(default)]
    pub voice_agent_config: Map<String, Value>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::with_theme("system")
    }
}

impl SessionSettings {
    pub fn with_theme(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            active_voice_agent: String::new(),
            voice_agent_config: Map::new(),
        }
    }

    /// Checks a client-supplied settings document before it replaces the
    /// current one.
    pub fn validate(&self) -> Result<(), String> {
        if self.theme.trim().is_empty() {
            return Err("theme must be a non-empty string".to_string());
        }
        for (agent, config) in &self.voice_agent_config {
            let config = config
                .as_object()
                .ok_or_else(|| format!("config for agent '{agent}' must be an object"))?;
            for key in ["model", "url"] {
                match config.get(key) {
                    Some(Value::String(value)) if !value.is_empty() => {}
                    _ => return Err(format!("config for agent '{agent}' requires a '{key}' string")),
                }
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct VoiceList {
    #[schema(example = json!(["en_US/amy", "en_US/joe", "en_US/sara"]))]
    pub voices: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Success,
    Error,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct VoiceChangeResponse {
    #[schema(example = "success")]
    pub status: ChangeStatus,
    #[schema(example = "Changed voice to en_US/joe")]
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    /// Number of live WebSocket sessions.
    pub connections: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct BroadcastPayload {
    #[schema(example = "Server restarting in 5 minutes")]
    pub message: String,
}

/// Outcome of a best-effort fan-out to every live session.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Sessions busy streaming a reply; they get the message after `audio_end`.
    pub queued: usize,
    /// Sessions that did not get the message: their connection failed (and
    /// they were deregistered) or their outbound queue was full.
    pub dropped: usize,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
