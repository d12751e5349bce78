//! Handlers for typed control messages.
//!
//! Each handler is registered under the `type` it answers. Frames whose type
//! has no handler fall through to the audio path, so adding a handler never
//! touches audio handling.

use super::{protocol::ServerMessage, registry::Session};
use crate::models::SessionSettings;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::{collections::HashMap, sync::Arc};
use tracing::info;
use vox_core::VoiceSynthesizer;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The request was understood but refused; the message goes to the client.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[async_trait]
pub trait ControlHandler: Send + Sync {
    async fn handle(
        &self,
        session: &Session,
        payload: &Map<String, Value>,
    ) -> Result<ServerMessage, ControlError>;
}

/// Maps control message types to their handlers.
#[derive(Default)]
pub struct ControlRouter {
    handlers: HashMap<String, Box<dyn ControlHandler>>,
}

impl ControlRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A router with every built-in control message registered.
    pub fn with_defaults(synthesizer: Arc<dyn VoiceSynthesizer>) -> Self {
        let mut router = Self::new();
        router
            .register("get_settings", GetSettings)
            .register("update_settings", UpdateSettings)
            .register("list_voices", ListVoices(synthesizer.clone()))
            .register("select_voice", SelectVoice(synthesizer));
        router
    }

    pub fn register(
        &mut self,
        kind: impl Into<String>,
        handler: impl ControlHandler + 'static,
    ) -> &mut Self {
        self.handlers.insert(kind.into(), Box::new(handler));
        self
    }

    pub fn get(&self, kind: &str) -> Option<&dyn ControlHandler> {
        self.handlers.get(kind).map(|handler| handler.as_ref())
    }
}

/// `get_settings`: the session's settings, verbatim.
pub struct GetSettings;

#[async_trait]
impl ControlHandler for GetSettings {
    async fn handle(
        &self,
        session: &Session,
        _payload: &Map<String, Value>,
    ) -> Result<ServerMessage, ControlError> {
        Ok(ServerMessage::settings(session.settings().await))
    }
}

/// `update_settings`: replaces the session's settings with `payload.settings`.
pub struct UpdateSettings;

#[async_trait]
impl ControlHandler for UpdateSettings {
    async fn handle(
        &self,
        session: &Session,
        payload: &Map<String, Value>,
    ) -> Result<ServerMessage, ControlError> {
        let raw = payload
            .get("settings")
            .cloned()
            .ok_or_else(|| ControlError::Rejected("Invalid settings: missing settings".into()))?;
        let settings: SessionSettings = serde_json::from_value(raw)
            .map_err(|e| ControlError::Rejected(format!("Invalid settings: {e}")))?;
        settings
            .validate()
            .map_err(|reason| ControlError::Rejected(format!("Invalid settings: {reason}")))?;
        session.replace_settings(settings.clone()).await;
        info!(theme = %settings.theme, "Session settings updated");
        Ok(ServerMessage::settings(settings))
    }
}

/// `list_voices`: the synthesizer's available voices.
pub struct ListVoices(pub Arc<dyn VoiceSynthesizer>);

#[async_trait]
impl ControlHandler for ListVoices {
    async fn handle(
        &self,
        _session: &Session,
        _payload: &Map<String, Value>,
    ) -> Result<ServerMessage, ControlError> {
        Ok(ServerMessage::Voices {
            voices: self.0.list_voices(),
        })
    }
}

/// `select_voice`: switches the synthesizer to `payload.name`.
pub struct SelectVoice(pub Arc<dyn VoiceSynthesizer>);

#[async_trait]
impl ControlHandler for SelectVoice {
    async fn handle(
        &self,
        _session: &Session,
        payload: &Map<String, Value>,
    ) -> Result<ServerMessage, ControlError> {
        let voice = payload
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ControlError::Rejected("select_voice requires a voice name".into()))?;
        let success = match self.0.select_voice(voice) {
            Ok(()) => true,
            Err(e) => {
                info!(error = %e, "Voice change refused");
                false
            }
        };
        Ok(ServerMessage::VoiceSelected {
            voice: voice.to_string(),
            success,
        })
    }
}
