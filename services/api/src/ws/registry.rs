//! Tracks the live sessions of the gateway.

use super::{
    outbox::{self, Handshake, OUTBOX_CAPACITY, Outbound},
    protocol::ServerMessage,
    sink::{FrameSink, TransportError},
};
use crate::models::{BroadcastReport, SessionSettings};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{
    RwLock,
    mpsc::{self, error::TrySendError},
    oneshot,
};
use tracing::{debug, info, warn};
use uuid::Uuid;
use vox_core::AudioStream;

pub type SessionId = Uuid;

/// How long a broadcast waits for a session's writer to confirm delivery.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Server-side state for one live client connection.
///
/// Outbound frames are queued to a writer task owned by the session; see
/// [`outbox`]. The writer stops on the first transport failure, after which
/// every send reports [`TransportError::Closed`].
pub struct Session {
    id: SessionId,
    settings: RwLock<SessionSettings>,
    outbox: mpsc::Sender<Outbound>,
}

impl Session {
    /// Must be called from within a Tokio runtime: it spawns the writer task.
    pub fn new(sink: Box<dyn FrameSink>, settings: SessionSettings) -> Self {
        Self::with_outbox_capacity(sink, settings, OUTBOX_CAPACITY)
    }

    pub fn with_outbox_capacity(
        sink: Box<dyn FrameSink>,
        settings: SessionSettings,
        capacity: usize,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            settings: RwLock::new(settings),
            outbox: outbox::spawn_writer(id, sink, capacity),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub async fn settings(&self) -> SessionSettings {
        self.settings.read().await.clone()
    }

    pub async fn replace_settings(&self, settings: SessionSettings) {
        *self.settings.write().await = settings;
    }

    /// Sends one message and waits until it has been written to the client.
    pub async fn send(&self, msg: &ServerMessage) -> Result<(), TransportError> {
        self.send_text(msg.to_json()).await
    }

    pub async fn send_text(&self, text: String) -> Result<(), TransportError> {
        let (ack, done) = oneshot::channel();
        self.outbox
            .send(Outbound::Text {
                text,
                ack: Some(ack),
            })
            .await
            .map_err(|_| TransportError::Closed)?;
        done.await.map_err(|_| TransportError::Closed)?
    }

    /// Streams a speech reply as one uninterrupted handshake and waits for it
    /// to finish.
    pub async fn speak(&self, chunks: AudioStream) -> Result<Handshake, TransportError> {
        let (ack, done) = oneshot::channel();
        self.outbox
            .send(Outbound::Speech { chunks, ack })
            .await
            .map_err(|_| TransportError::Closed)?;
        done.await.map_err(|_| TransportError::Closed)?
    }

    /// Queues `text` without waiting for room or for delivery.
    fn try_queue_text(
        &self,
        text: String,
    ) -> Result<oneshot::Receiver<Result<(), TransportError>>, TrySendError<Outbound>> {
        let (ack, done) = oneshot::channel();
        self.outbox.try_send(Outbound::Text {
            text,
            ack: Some(ack),
        })?;
        Ok(done)
    }

    /// Resolves once the writer task has stopped.
    pub async fn closed(&self) {
        self.outbox.closed().await
    }
}

/// The set of live sessions.
///
/// Iteration (for broadcasts) works on a snapshot taken under the read lock,
/// so sessions may register or deregister while a broadcast is in flight.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    defaults: SessionSettings,
    outbox_capacity: usize,
    delivery_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(defaults: SessionSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            defaults,
            outbox_capacity: OUTBOX_CAPACITY,
            delivery_timeout: DELIVERY_TIMEOUT,
        }
    }

    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity;
        self
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Creates a session with default settings around an accepted connection.
    pub async fn register(&self, sink: Box<dyn FrameSink>) -> Arc<Session> {
        let session = Arc::new(Session::with_outbox_capacity(
            sink,
            self.defaults.clone(),
            self.outbox_capacity,
        ));
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id(), session.clone());
        info!(session_id = %session.id(), total = sessions.len(), "Client connected");
        session
    }

    /// Removes a session. Returns `false` if it was already gone, which is
    /// expected when a broadcast failure and a disconnect race.
    pub async fn deregister(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&id).is_some() {
            info!(session_id = %id, total = sessions.len(), "Client disconnected");
            true
        } else {
            debug!(session_id = %id, "Session already deregistered");
            false
        }
    }

    pub async fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Queues `text` to every live session and waits, up to the delivery
    /// timeout, for each writer to confirm.
    ///
    /// A session whose connection has failed is deregistered. One that is busy
    /// streaming a reply keeps the message queued and receives it after
    /// `audio_end`. One whose queue is full is skipped. No session can delay
    /// delivery to the others beyond the timeout.
    pub async fn broadcast(&self, text: &str) -> BroadcastReport {
        let snapshot: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        let mut report = BroadcastReport::default();
        let mut pending = Vec::with_capacity(snapshot.len());
        for session in snapshot {
            match session.try_queue_text(text.to_string()) {
                Ok(done) => pending.push((session, done)),
                Err(TrySendError::Full(_)) => {
                    warn!(session_id = %session.id(), "Outbound queue full; skipping session");
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(session_id = %session.id(), "Broadcast to closed session; dropping it");
                    self.deregister(session.id()).await;
                    report.dropped += 1;
                }
            }
        }

        let timeout = self.delivery_timeout;
        let outcomes = join_all(pending.into_iter().map(|(session, done)| async move {
            let outcome = tokio::time::timeout(timeout, done).await;
            (session, outcome)
        }))
        .await;

        for (session, outcome) in outcomes {
            match outcome {
                Ok(Ok(Ok(()))) => report.delivered += 1,
                Ok(Ok(Err(e))) => {
                    warn!(session_id = %session.id(), error = %e, "Broadcast failed; dropping session");
                    self.deregister(session.id()).await;
                    report.dropped += 1;
                }
                Ok(Err(_)) => {
                    warn!(session_id = %session.id(), "Writer stopped before delivery; dropping session");
                    self.deregister(session.id()).await;
                    report.dropped += 1;
                }
                Err(_) => {
                    debug!(session_id = %session.id(), "Broadcast queued behind an in-flight reply");
                    report.queued += 1;
                }
            }
        }
        report
    }
}
