//! WebSocket Session Management
//!
//! This module contains the core logic for handling voice sessions over
//! WebSockets. It is structured into submodules for clarity:
//!
//! - `protocol`: Defines the frame classification and the JSON messages sent to the client.
//! - `sink`: The outbound half of a connection, abstracted for testing.
//! - `outbox`: The per-session outbound queue and the writer task that owns the sink.
//! - `registry`: Tracks live sessions and performs best-effort broadcasts.
//! - `control`: Handlers for typed control messages, registered by `type`.
//! - `dispatch`: Routes each inbound frame and drives the audio reply handshake.
//! - `session`: Manages the WebSocket connection lifecycle, from upgrade to termination.

pub mod control;
pub mod dispatch;
pub mod outbox;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use session::ws_handler;
