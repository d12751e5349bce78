//! The outbound half of a client connection.

use super::protocol::ServerMessage;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, stream::SplitSink};

/// A failure of the underlying connection. Once one is seen, no further frames
/// are attempted on that session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to send frame: {0}")]
    Send(#[source] axum::Error),
    #[error("failed to receive frame: {0}")]
    Receive(#[source] axum::Error),
    #[error("connection closed")]
    Closed,
}

/// Anything that can carry frames to a client.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;
    async fn send_binary(&mut self, data: Bytes) -> Result<(), TransportError>;
}

#[async_trait]
impl FrameSink for SplitSink<WebSocket, Message> {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.send(Message::Text(text.into()))
            .await
            .map_err(TransportError::Send)
    }

    async fn send_binary(&mut self, data: Bytes) -> Result<(), TransportError> {
        self.send(Message::Binary(data))
            .await
            .map_err(TransportError::Send)
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub async fn send_msg(sink: &mut dyn FrameSink, msg: &ServerMessage) -> Result<(), TransportError> {
    sink.send_text(msg.to_json()).await
}
