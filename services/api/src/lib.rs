//! Vox API Library Crate
//!
//! This library contains all the core logic for the voice gateway service,
//! including configuration, shared state, the WebSocket session protocol,
//! REST handlers, and routing. The `api` binary is a thin wrapper around this
//! library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
