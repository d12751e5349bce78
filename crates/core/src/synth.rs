//! Text-to-speech contract and the tone-based stand-in synthesizer.

use crate::audio::{self, OUTPUT_SAMPLE_RATE};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};
use std::pin::Pin;
use std::sync::{PoisonError, RwLock};
use tracing::{info, warn};

/// A finite, single-pass stream of float32 PCM chunks.
///
/// Each successful item is one chunk, in the order it must reach the client.
/// An `Err` item ends the stream early; nothing follows it.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Bytes, SynthesisError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("unknown voice: {0}")]
    UnknownVoice(String),
    #[error("synthesis failed: {0}")]
    Failed(String),
}

/// A text-to-speech backend.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    /// Starts synthesizing `text` with the voice active at call time.
    ///
    /// Selecting another voice while the returned stream is being drained does
    /// not affect it.
    fn stream(&self, text: &str) -> AudioStream;

    /// Synthesizes a whole utterance into one buffer.
    ///
    /// Returns `None` when synthesis fails or produces no audio.
    async fn synthesize(&self, text: &str) -> Option<Bytes> {
        let mut chunks = self.stream(text);
        let mut buf = BytesMut::new();
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => buf.extend_from_slice(&chunk),
                Err(e) => {
                    warn!(error = %e, "Text-to-speech failed");
                    return None;
                }
            }
        }
        (!buf.is_empty()).then(|| buf.freeze())
    }

    /// Makes `name` the voice for every call issued after this returns.
    fn select_voice(&self, name: &str) -> Result<(), SynthesisError>;

    fn active_voice(&self) -> String;

    fn list_voices(&self) -> Vec<String>;
}

#[derive(Debug, PartialEq)]
struct Voice {
    name: &'static str,
    pitch_hz: f32,
}

const VOICES: &[Voice] = &[
    Voice {
        name: "en_US/amy",
        pitch_hz: 220.0,
    },
    Voice {
        name: "en_US/joe",
        pitch_hz: 130.0,
    },
    Voice {
        name: "en_US/sara",
        pitch_hz: 262.0,
    },
];

pub const DEFAULT_VOICE: &str = "en_US/amy";

/// Duration of the tone rendered for each word.
const WORD_MS: u32 = 180;
const AMPLITUDE: f32 = 0.3;

fn find_voice(name: &str) -> Option<&'static Voice> {
    VOICES.iter().find(|voice| voice.name == name)
}

/// A synthesizer that renders one short tone per word of the input text.
///
/// Every voice has its own base pitch and the pitch moves with word length,
/// so different texts and voices produce audibly (and byte-wise) different
/// output while staying deterministic.
pub struct ToneSynthesizer {
    voice: RwLock<&'static Voice>,
}

impl ToneSynthesizer {
    pub fn new(voice_name: &str) -> Result<Self, SynthesisError> {
        let voice =
            find_voice(voice_name).ok_or_else(|| SynthesisError::UnknownVoice(voice_name.into()))?;
        info!(voice = voice.name, "Initialized tone synthesizer");
        Ok(Self {
            voice: RwLock::new(voice),
        })
    }

    fn current(&self) -> &'static Voice {
        *self.voice.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self {
            voice: RwLock::new(&VOICES[0]),
        }
    }
}

fn render_word(voice: &Voice, word: &str) -> Bytes {
    let step = (word.chars().count() % 5) as f32;
    let pitch = voice.pitch_hz * (1.0 + step * 0.06);
    audio::encode_f32(&audio::tone(pitch, WORD_MS, OUTPUT_SAMPLE_RATE, AMPLITUDE))
}

#[async_trait]
impl VoiceSynthesizer for ToneSynthesizer {
    fn stream(&self, text: &str) -> AudioStream {
        let voice = self.current();
        let words: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
        Box::pin(stream::iter(words).map(move |word| Ok(render_word(voice, &word))))
    }

    fn select_voice(&self, name: &str) -> Result<(), SynthesisError> {
        let voice = find_voice(name).ok_or_else(|| SynthesisError::UnknownVoice(name.into()))?;
        *self.voice.write().unwrap_or_else(PoisonError::into_inner) = voice;
        info!(voice = name, "Changed voice");
        Ok(())
    }

    fn active_voice(&self) -> String {
        self.current().name.to_string()
    }

    fn list_voices(&self) -> Vec<String> {
        VOICES.iter().map(|voice| voice.name.to_string()).collect()
    }
}
