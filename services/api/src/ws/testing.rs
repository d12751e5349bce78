//! In-memory collaborators shared by the WebSocket unit tests.

use super::sink::{FrameSink, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vox_core::{AudioStream, ConversationEngine, RawReply, SynthesisError, VoiceSynthesizer};

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    pub fn json(&self) -> Value {
        match self {
            Frame::Text(text) => serde_json::from_str(text).expect("text frame is JSON"),
            Frame::Binary(_) => panic!("expected a text frame, got binary"),
        }
    }
}

/// Records every frame sent through it. Can be told to fail after a number
/// of successful sends.
#[derive(Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<Frame>>>,
    fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self::failing_after(0)
    }

    pub fn failing_after(sends: usize) -> Self {
        Self {
            frames: Arc::default(),
            fail_after: Some(sends),
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    fn push(&self, frame: Frame) -> Result<(), TransportError> {
        let mut frames = self.frames.lock().unwrap();
        if self.fail_after.is_some_and(|limit| frames.len() >= limit) {
            return Err(TransportError::Closed);
        }
        frames.push(frame);
        Ok(())
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.push(Frame::Text(text))
    }

    async fn send_binary(&mut self, data: Bytes) -> Result<(), TransportError> {
        self.push(Frame::Binary(data))
    }
}

/// An engine that answers every utterance with the same reply.
pub struct ScriptedEngine {
    reply: Option<RawReply>,
    delay: Option<Duration>,
    heard: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedEngine {
    pub fn new(reply: Option<RawReply>) -> Self {
        Self {
            reply,
            delay: None,
            heard: Mutex::default(),
        }
    }

    pub fn slow(reply: Option<RawReply>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(reply)
        }
    }

    pub fn heard(&self) -> Vec<Vec<u8>> {
        self.heard.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "ScriptedEngine"
    }

    async fn process_audio(&self, audio: &[u8]) -> Option<RawReply> {
        self.heard.lock().unwrap().push(audio.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}

/// An engine that panics on every utterance.
pub struct PanickingEngine;

#[async_trait]
impl ConversationEngine for PanickingEngine {
    fn name(&self) -> &str {
        "PanickingEngine"
    }

    async fn process_audio(&self, _audio: &[u8]) -> Option<RawReply> {
        panic!("engine crashed")
    }
}

/// A synthesizer that yields a fixed sequence of chunk results for any text.
pub struct ScriptedSynth {
    chunks: Vec<Result<Bytes, SynthesisError>>,
    spoken: Mutex<Vec<String>>,
}

impl ScriptedSynth {
    pub fn new(chunks: Vec<Result<Bytes, SynthesisError>>) -> Self {
        Self {
            chunks,
            spoken: Mutex::default(),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoiceSynthesizer for ScriptedSynth {
    fn stream(&self, text: &str) -> AudioStream {
        self.spoken.lock().unwrap().push(text.to_string());
        Box::pin(stream::iter(self.chunks.clone()))
    }

    fn select_voice(&self, name: &str) -> Result<(), SynthesisError> {
        Err(SynthesisError::UnknownVoice(name.to_string()))
    }

    fn active_voice(&self) -> String {
        "scripted".to_string()
    }

    fn list_voices(&self) -> Vec<String> {
        vec!["scripted".to_string()]
    }
}
