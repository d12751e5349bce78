//! The per-session outbound queue and the writer task that drains it.
//!
//! Every frame bound for a client goes through its session's queue, so the
//! writer task is the only code that touches the socket. A speech reply is a
//! single queue item: the writer streams it from `audio_start` to `audio_end`
//! before it looks at the next item, which keeps the handshake contiguous
//! without anyone holding a lock across the synthesizer.

use super::{
    protocol::{AudioFormat, ServerMessage},
    registry::SessionId,
    sink::{FrameSink, TransportError, send_msg},
};
use futures_util::{FutureExt, StreamExt};
use std::{any::Any, panic::AssertUnwindSafe};
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, error, info, warn};
use vox_core::AudioStream;

/// Queue depth per session.
pub const OUTBOX_CAPACITY: usize = 128;

pub type Ack<T> = oneshot::Sender<Result<T, TransportError>>;

/// A unit of work for the writer task.
pub enum Outbound {
    /// One text frame. `ack` receives the send outcome when present.
    Text { text: String, ack: Option<Ack<()>> },
    /// A complete speech reply, streamed as one uninterrupted handshake.
    Speech { chunks: AudioStream, ack: Ack<Handshake> },
}

/// How far a speech reply got through the handshake.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub chunks: usize,
    pub bytes: usize,
    /// `false` when synthesis failed before the stream was drained.
    pub complete: bool,
}

/// Spawns the writer task for one session and returns its queue.
///
/// The task ends when every sender is dropped or the first send fails. Items
/// still queued at that point are dropped, so their acks resolve as closed.
pub fn spawn_writer(
    session_id: SessionId,
    sink: Box<dyn FrameSink>,
    capacity: usize,
) -> mpsc::Sender<Outbound> {
    let (tx, rx) = mpsc::channel(capacity);
    let span = tracing::info_span!("outbox", session_id = %session_id);
    tokio::spawn(run_writer(sink, rx).instrument(span));
    tx
}

async fn run_writer(mut sink: Box<dyn FrameSink>, mut rx: mpsc::Receiver<Outbound>) {
    while let Some(item) = rx.recv().await {
        let healthy = match item {
            Outbound::Text { text, ack } => settle(sink.send_text(text).await, ack),
            Outbound::Speech { chunks, ack } => {
                settle(stream_speech(&mut *sink, chunks).await, Some(ack))
            }
        };
        if !healthy {
            warn!("Outbound connection failed; writer stopping");
            return;
        }
    }
    debug!("Outbound queue closed");
}

/// Hands `result` to whoever is waiting on it. Returns whether the connection
/// is still usable.
fn settle<T>(result: Result<T, TransportError>, ack: Option<Ack<T>>) -> bool {
    let healthy = result.is_ok();
    match ack {
        // The waiter may have given up; the outcome is still reflected in `healthy`.
        Some(ack) => {
            let _ = ack.send(result);
        }
        None => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to deliver queued frame");
            }
        }
    }
    healthy
}

/// Sends `audio_start`, every synthesized chunk in order, then `audio_end`.
///
/// A synthesis failure after `audio_start` (an error item or a panic while
/// polling the stream) is only logged: the handshake is closed with
/// `audio_end` and the client sees a truncated stream.
pub async fn stream_speech(
    sink: &mut dyn FrameSink,
    mut chunks: AudioStream,
) -> Result<Handshake, TransportError> {
    send_msg(
        sink,
        &ServerMessage::AudioStart {
            format: AudioFormat::Float32,
        },
    )
    .await?;

    let mut handshake = Handshake {
        complete: true,
        ..Handshake::default()
    };
    loop {
        let next = AssertUnwindSafe(chunks.next()).catch_unwind().await;
        match next {
            Ok(None) => break,
            Ok(Some(Ok(chunk))) => {
                handshake.bytes += chunk.len();
                sink.send_binary(chunk).await?;
                handshake.chunks += 1;
            }
            Ok(Some(Err(e))) => {
                error!(error = %e, chunks_sent = handshake.chunks, "Streaming text-to-speech failed");
                handshake.complete = false;
                break;
            }
            Err(panic) => {
                error!(panic = %panic_message(&panic), chunks_sent = handshake.chunks, "Synthesizer panicked mid-stream");
                handshake.complete = false;
                break;
            }
        }
    }
    if handshake.complete && handshake.chunks == 0 {
        warn!("Synthesizer produced no audio");
    }

    send_msg(sink, &ServerMessage::AudioEnd).await?;
    info!(
        chunks = handshake.chunks,
        bytes = handshake.bytes,
        complete = handshake.complete,
        "Audio reply streamed"
    );
    Ok(handshake)
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
