//! Conversation engine contract and the Ultravox stand-in.

use crate::reply::{RawReply, Reply};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, warn};

/// Turns a captured utterance into a structured reply.
///
/// Implementations must not fail past this boundary: internal errors become a
/// spoken apology, or `None` when no reply can be produced at all. The caller
/// validates the shape of whatever comes back.
#[async_trait]
pub trait ConversationEngine: Send + Sync {
    /// Human readable service name, used in client-facing error messages.
    fn name(&self) -> &str;

    async fn process_audio(&self, audio: &[u8]) -> Option<RawReply>;
}

pub const NOT_UNDERSTOOD: &str = "I couldn't understand the audio. Could you please try again?";
pub const RESPONSE_FAILED: &str = "Sorry, I encountered an error generating a response.";

const SYSTEM_PROMPT: &str = r#"You are a voice assistant. Format all responses as JSON:
{
  "type": "speech" or "tool_call",
  "content": "..."
}"#;

/// Placeholder client for the Ultravox speech-understanding service.
///
/// Transcription always yields a fixed sentence and the "model" echoes it back
/// as speech, but the reply still goes through the same JSON parsing a real
/// model answer would.
pub struct UltravoxEngine {
    api_key: SecretString,
}

impl UltravoxEngine {
    pub fn new(api_key: SecretString) -> Self {
        Self { api_key }
    }

    pub fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    /// Transcribes `audio`. `None` means nothing usable was heard.
    pub async fn speech_to_text(&self, audio: &[u8]) -> Option<String> {
        if self.api_key.expose_secret().is_empty() {
            warn!("Ultravox API key is empty; skipping transcription");
            return None;
        }
        if audio.is_empty() {
            return None;
        }
        debug!(bytes = audio.len(), "Transcribing audio");
        Some("Placeholder text from speech".to_string())
    }

    /// Asks the model for a reply to `text`. Always returns a reply, falling
    /// back to a spoken apology when the model output can't be parsed.
    pub async fn get_response(&self, text: &str) -> RawReply {
        let model_output = json!({
            "type": "speech",
            "content": format!("I understood: {text}"),
        })
        .to_string();
        parse_model_output(&model_output)
    }
}

/// Parses a model answer formatted per the system prompt.
///
/// Anything that is not a well-formed reply falls back to the spoken
/// `RESPONSE_FAILED` apology.
pub fn parse_model_output(output: &str) -> RawReply {
    let raw = match serde_json::from_str::<RawReply>(output.trim()) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Model output was not a JSON reply");
            return RawReply::speech(RESPONSE_FAILED);
        }
    };
    match Reply::try_from(raw) {
        Ok(reply) => reply.into(),
        Err(e) => {
            warn!(error = %e, "Model output was not a valid reply");
            RawReply::speech(RESPONSE_FAILED)
        }
    }
}

#[async_trait]
impl ConversationEngine for UltravoxEngine {
    fn name(&self) -> &str {
        "UltraVox"
    }

    async fn process_audio(&self, audio: &[u8]) -> Option<RawReply> {
        match self.speech_to_text(audio).await {
            Some(text) => Some(self.get_response(&text).await),
            None => Some(RawReply::speech(NOT_UNDERSTOOD)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> UltravoxEngine {
        UltravoxEngine::new(SecretString::from("test-key"))
    }

    #[tokio::test]
    async fn test_process_audio_echoes_transcript() {
        let reply = engine().process_audio(b"\x00\x01\x02\x03").await.unwrap();
        assert_eq!(
            Reply::try_from(reply),
            Ok(Reply::Speech {
                text: "I understood: Placeholder text from speech".into()
            })
        );
    }

    #[tokio::test]
    async fn test_empty_audio_gets_apology() {
        let reply = engine().process_audio(&[]).await.unwrap();
        assert_eq!(reply, RawReply::speech(NOT_UNDERSTOOD));
    }

    #[tokio::test]
    async fn test_missing_credentials_get_apology() {
        let engine = UltravoxEngine::new(SecretString::from(""));
        assert_eq!(engine.speech_to_text(b"abc").await, None);
        assert_eq!(
            engine.process_audio(b"abc").await,
            Some(RawReply::speech(NOT_UNDERSTOOD))
        );
    }

    #[test]
    fn test_parse_model_output() {
        assert_eq!(
            parse_model_output(r#"  {"type":"tool_call","content":"lights_on"} "#),
            RawReply::tool_call("lights_on")
        );
        assert_eq!(
            parse_model_output(r#"{"type":"audio","content":"hello"}"#),
            RawReply::speech("hello")
        );
        let malformed = [
            "Sure! Here you go.",
            "{}",
            r#"{"content":"x"}"#,
            r#"{"type":"speech"}"#,
            r#"{"type":"video","content":"hi"}"#,
            r#"{"type":"tool_call","content":{"tool":"lights"}}"#,
        ];
        for output in malformed {
            assert_eq!(
                parse_model_output(output),
                RawReply::speech(RESPONSE_FAILED),
                "{output} should fall back to the apology"
            );
        }
    }

    #[test]
    fn test_system_prompt_describes_reply_format() {
        let engine = engine();
        assert!(engine.system_prompt().contains("\"type\""));
        assert!(engine.system_prompt().contains("tool_call"));
    }
}
