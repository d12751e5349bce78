//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the session registry and service clients.

use crate::ws::{dispatch::SessionProtocol, registry::SessionRegistry};
use std::sync::Arc;
use vox_core::VoiceSynthesizer;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub protocol: Arc<SessionProtocol>,
    pub synthesizer: Arc<dyn VoiceSynthesizer>,
}
