//! A conversation engine that repeats what it was sent.

use crate::engine::{ConversationEngine, NOT_UNDERSTOOD};
use crate::reply::RawReply;
use async_trait::async_trait;
use tracing::debug;

/// Answers every utterance by echoing it back as speech.
///
/// Text sent over the audio path is repeated word for word; anything else is
/// described by its size. Useful for exercising the handshake without any
/// external service.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoEngine;

impl EchoEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConversationEngine for EchoEngine {
    fn name(&self) -> &str {
        "Echo"
    }

    async fn process_audio(&self, audio: &[u8]) -> Option<RawReply> {
        if audio.is_empty() {
            return Some(RawReply::speech(NOT_UNDERSTOOD));
        }
        let text = match std::str::from_utf8(audio).map(str::trim) {
            Ok(text) if !text.is_empty() => format!("Echo: {text}"),
            _ => format!("Echo: received {} bytes of audio", audio.len()),
        };
        debug!(bytes = audio.len(), "Echoing utterance");
        Some(RawReply::speech(text))
    }
}
