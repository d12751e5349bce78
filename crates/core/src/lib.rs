//! Vox Core
//!
//! Contracts for the collaborators the gateway drives: the conversation engine
//! that turns captured audio into a structured reply, and the voice synthesizer
//! that turns reply text into float32 PCM. The stub implementations in this
//! crate stand in for the real services and keep the gateway runnable offline.

pub mod audio;
pub mod echo;
pub mod engine;
pub mod reply;
pub mod synth;

pub use echo::EchoEngine;
pub use engine::{ConversationEngine, UltravoxEngine};
pub use reply::{RawReply, Reply, ReplyError};
pub use synth::{AudioStream, SynthesisError, ToneSynthesizer, VoiceSynthesizer};
