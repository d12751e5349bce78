//! Manages the WebSocket connection lifecycle for a voice session.

use super::{dispatch::SessionProtocol, outbox::panic_message, registry::Session, sink::TransportError};
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{FutureExt, StreamExt, stream::Stream};
use std::{panic::AssertUnwindSafe, sync::Arc};
use tracing::{Instrument, error, info, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Registers the session, runs its frame loop until the client leaves, the
/// transport fails or the loop panics, then deregisters it.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (socket_tx, socket_rx) = socket.split();
    let session = state.registry.register(Box::new(socket_tx)).await;

    let session_span = tracing::info_span!("ws_session", session_id = %session.id());
    async move {
        let outcome = AssertUnwindSafe(run_session(&state.protocol, &session, socket_rx))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => info!("WebSocket connection closed."),
            Ok(Err(e)) => warn!(error = %e, "Session terminated by transport failure."),
            Err(panic) => error!(panic = %panic_message(&panic), "Session task panicked."),
        }
        state.registry.deregister(session.id()).await;
    }
    .instrument(session_span)
    .await;
}

/// The frame loop of one session.
///
/// Frames are handled strictly one at a time: the next frame is not read until
/// the previous one, including any audio reply, has been fully handled. Text
/// and binary frames go through the same classification. The loop also ends
/// as soon as the session's writer stops, even while the client is silent.
pub async fn run_session<S>(
    protocol: &SessionProtocol,
    session: &Session,
    mut frames: S,
) -> Result<(), TransportError>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let msg_result = tokio::select! {
            biased;
            _ = session.closed() => return Err(TransportError::Closed),
            next = frames.next() => match next {
                Some(msg_result) => msg_result,
                None => break,
            },
        };
        match msg_result.map_err(TransportError::Receive)? {
            Message::Binary(data) => protocol.handle_frame(session, &data).await?,
            Message::Text(text) => protocol.handle_frame(session, text.as_str().as_bytes()).await?,
            Message::Close(_) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
    Ok(())
}
