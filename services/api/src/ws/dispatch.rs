//! Routes inbound frames and drives the audio reply handshake.

use super::{
    control::{ControlError, ControlRouter},
    outbox::panic_message,
    protocol::{self, GENERIC_ERROR, InboundFrame, ServerMessage},
    registry::Session,
    sink::TransportError,
};
use futures_util::FutureExt;
use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc, time::Duration};
use tracing::{debug, error, info, instrument, warn};
use vox_core::{ConversationEngine, Reply, VoiceSynthesizer};

/// Every way handling a single frame can fail.
///
/// Only `Transport` ends the session; the rest become an `error` frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Invalid response format from {engine}")]
    InvalidReply { engine: String, reason: String },
    #[error("Timed out waiting for {engine}")]
    EngineTimeout { engine: String },
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl From<ControlError> for FrameError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Rejected(message) => FrameError::Rejected(message),
            ControlError::Internal(e) => FrameError::Internal(e),
        }
    }
}

impl FrameError {
    /// The text of the `error` frame reported to the client.
    fn client_message(&self) -> String {
        match self {
            FrameError::Internal(_) | FrameError::Transport(_) => GENERIC_ERROR.to_string(),
            other => other.to_string(),
        }
    }
}

/// The per-frame protocol shared by every session.
pub struct SessionProtocol {
    engine: Arc<dyn ConversationEngine>,
    /// Engines a session can pick by name through `active_voice_agent`.
    agents: HashMap<String, Arc<dyn ConversationEngine>>,
    synthesizer: Arc<dyn VoiceSynthesizer>,
    control: ControlRouter,
    engine_timeout: Option<Duration>,
}

impl SessionProtocol {
    /// `engine` answers every session that has not picked a voice agent.
    pub fn new(
        engine: Arc<dyn ConversationEngine>,
        synthesizer: Arc<dyn VoiceSynthesizer>,
        control: ControlRouter,
    ) -> Self {
        Self {
            engine,
            agents: HashMap::new(),
            synthesizer,
            control,
            engine_timeout: None,
        }
    }

    pub fn with_agent(
        mut self,
        name: impl Into<String>,
        engine: Arc<dyn ConversationEngine>,
    ) -> Self {
        self.agents.insert(name.into(), engine);
        self
    }

    pub fn with_engine_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.engine_timeout = timeout;
        self
    }

    /// The engine for a session whose `active_voice_agent` is `agent`. An
    /// empty or unknown name selects the default engine.
    pub fn engine_for(&self, agent: &str) -> &Arc<dyn ConversationEngine> {
        if agent.is_empty() {
            return &self.engine;
        }
        match self.agents.get(agent) {
            Some(engine) => engine,
            None => {
                debug!(agent, "Unknown voice agent; using the default engine");
                &self.engine
            }
        }
    }

    /// Handles one inbound frame to completion, including the whole audio
    /// handshake if the frame produces speech.
    ///
    /// Per-frame failures, panics included, are reported to the client as
    /// `error` frames and the session stays usable. Only a transport failure is
    /// returned.
    #[instrument(name = "frame", skip_all, fields(bytes = raw.len()))]
    pub async fn handle_frame(&self, session: &Session, raw: &[u8]) -> Result<(), TransportError> {
        let outcome = AssertUnwindSafe(self.process_frame(session, raw))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(FrameError::Internal(anyhow::anyhow!(
                    "frame handler panicked: {}",
                    panic_message(&panic)
                )))
            });
        let err = match outcome {
            Ok(()) => return Ok(()),
            Err(FrameError::Transport(e)) => return Err(e),
            Err(err) => err,
        };
        match &err {
            FrameError::Internal(e) => error!(error = ?e, "Error processing message"),
            FrameError::InvalidReply { engine, reason } => {
                warn!(%engine, %reason, "Engine reply rejected")
            }
            other => warn!(error = %other, "Frame rejected"),
        }
        session
            .send(&ServerMessage::error(err.client_message()))
            .await
    }

    async fn process_frame(&self, session: &Session, raw: &[u8]) -> Result<(), FrameError> {
        if let InboundFrame::Control(msg) = protocol::classify(raw) {
            if let Some(handler) = self.control.get(&msg.kind) {
                debug!(kind = %msg.kind, "Handling control message");
                let reply = handler.handle(session, &msg.payload).await?;
                session.send(&reply).await?;
                return Ok(());
            }
            debug!(kind = %msg.kind, "No handler for message type; treating frame as audio");
        }

        let agent = session.settings().await.active_voice_agent;
        match self.converse(self.engine_for(&agent), raw).await? {
            Reply::Speech { text } => {
                session.speak(self.synthesizer.stream(&text)).await?;
            }
            Reply::ToolCall { content } => {
                info!("Forwarding tool call");
                session.send(&ServerMessage::ToolCall { content }).await?;
            }
        }
        Ok(())
    }

    /// Runs the conversation engine and validates the shape of its reply.
    async fn converse(
        &self,
        engine: &Arc<dyn ConversationEngine>,
        audio: &[u8],
    ) -> Result<Reply, FrameError> {
        let name = engine.name().to_string();
        let pending = engine.process_audio(audio);
        let raw = match self.engine_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| FrameError::EngineTimeout {
                    engine: name.clone(),
                })?,
            None => pending.await,
        };
        let raw = raw.ok_or_else(|| FrameError::InvalidReply {
            engine: name.clone(),
            reason: "engine returned no reply".to_string(),
        })?;
        Reply::try_from(raw).map_err(|e| FrameError::InvalidReply {
            engine: name,
            reason: e.to_string(),
        })
    }
}
