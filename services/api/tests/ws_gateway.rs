//! Drives a real server over WebSocket and HTTP with the stub speech services.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use vox_api::{
    models::SessionSettings,
    router::create_router,
    state::AppState,
    ws::{control::ControlRouter, dispatch::SessionProtocol, registry::SessionRegistry},
};
use vox_core::{
    ConversationEngine, EchoEngine, RawReply, ToneSynthesizer, UltravoxEngine, VoiceSynthesizer,
    audio, engine::NOT_UNDERSTOOD,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fails the way a buggy engine would: by panicking mid-call.
struct CrashingEngine;

#[async_trait]
impl ConversationEngine for CrashingEngine {
    fn name(&self) -> &str {
        "Crashing"
    }

    async fn process_audio(&self, _audio: &[u8]) -> Option<RawReply> {
        panic!("engine crashed")
    }
}

async fn spawn_server() -> (SocketAddr, Arc<AppState>) {
    spawn_server_with(Arc::new(UltravoxEngine::new("integration-key".into()))).await
}

async fn spawn_server_with(engine: Arc<dyn ConversationEngine>) -> (SocketAddr, Arc<AppState>) {
    let synthesizer: Arc<dyn VoiceSynthesizer> = Arc::new(ToneSynthesizer::default());
    let state = Arc::new(AppState {
        registry: Arc::new(SessionRegistry::new(SessionSettings::default())),
        protocol: Arc::new(
            SessionProtocol::new(
                engine,
                synthesizer.clone(),
                ControlRouter::with_defaults(synthesizer.clone()),
            )
            .with_agent("Echo", Arc::new(EchoEngine::new())),
        ),
        synthesizer,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    client
}

async fn next_frame(client: &mut Client) -> Message {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection ended")
            .unwrap();
        if !matches!(msg, Message::Ping(_) | Message::Pong(_)) {
            return msg;
        }
    }
}

async fn next_json(client: &mut Client) -> Value {
    match next_frame(client).await {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

async fn wait_for_connections(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.registry.len().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("registry never reached {expected} connections");
}

#[tokio::test]
async fn test_get_settings_over_websocket() {
    let (addr, _state) = spawn_server().await;
    let mut client = connect(addr).await;

    client
        .send(Message::text(r#"{"type":"get_settings"}"#))
        .await
        .unwrap();

    assert_eq!(
        next_json(&mut client).await,
        json!({"type":"settings_data","payload":{"settings":{"theme":"system","active_voice_agent":"","voice_agent_config":{}}}})
    );
}

#[tokio::test]
async fn test_audio_frame_gets_streamed_speech_reply() {
    let (addr, _state) = spawn_server().await;
    let mut client = connect(addr).await;

    client
        .send(Message::binary(vec![0u8, 1, 2, 3, 4, 5, 6, 7]))
        .await
        .unwrap();

    assert_eq!(
        next_json(&mut client).await,
        json!({"type": "audio_start", "format": "float32"})
    );
    // The stub synthesizer emits one chunk per word of the reply.
    let words = "I understood: Placeholder text from speech"
        .split_whitespace()
        .count();
    for _ in 0..words {
        match next_frame(&mut client).await {
            Message::Binary(chunk) => {
                assert!(!chunk.is_empty());
                assert_eq!(chunk.len() % 4, 0);
                assert!(audio::decode_f32(&chunk).iter().all(|s| s.abs() <= 1.0));
            }
            other => panic!("expected an audio chunk, got {other:?}"),
        }
    }
    assert_eq!(next_json(&mut client).await, json!({"type": "audio_end"}));
}

#[tokio::test]
async fn test_empty_audio_gets_spoken_apology() {
    let (addr, state) = spawn_server().await;
    let mut client = connect(addr).await;

    client.send(Message::binary(Vec::new())).await.unwrap();

    assert_eq!(next_json(&mut client).await["type"], "audio_start");
    let expected_chunks = NOT_UNDERSTOOD.split_whitespace().count();
    for _ in 0..expected_chunks {
        assert!(matches!(next_frame(&mut client).await, Message::Binary(_)));
    }
    assert_eq!(next_json(&mut client).await["type"], "audio_end");
    assert_eq!(state.registry.len().await, 1);
}

#[tokio::test]
async fn test_disconnect_deregisters_session() {
    let (addr, state) = spawn_server().await;
    let mut first = connect(addr).await;
    let _second = connect(addr).await;
    wait_for_connections(&state, 2).await;

    first.close(None).await.unwrap();
    wait_for_connections(&state, 1).await;
}

#[tokio::test]
async fn test_rest_voice_change_and_broadcast() {
    let (addr, state) = spawn_server().await;
    let mut client = connect(addr).await;
    wait_for_connections(&state, 1).await;

    let http = Http::new(addr);
    let voices: Value = http.get("/voices").await;
    assert_eq!(voices, json!({"voices": ["en_US/amy", "en_US/joe", "en_US/sara"]}));

    let changed: Value = http.post("/voice/en_US/joe", None).await;
    assert_eq!(changed["status"], "success");
    assert_eq!(state.synthesizer.active_voice(), "en_US/joe");

    let refused: Value = http.post("/voice/nobody", None).await;
    assert_eq!(
        refused,
        json!({"status": "error", "message": "Failed to change voice"})
    );

    let report: Value = http
        .post("/broadcast", Some(json!({"message": "hello everyone"})))
        .await;
    assert_eq!(report, json!({"delivered": 1, "queued": 0, "dropped": 0}));
    match next_frame(&mut client).await {
        Message::Text(text) => assert_eq!(text.as_str(), "hello everyone"),
        other => panic!("expected broadcast text, got {other:?}"),
    }

    let health: Value = http.get("/health").await;
    assert_eq!(health, json!({"status": "ok", "connections": 1}));
}

#[tokio::test]
async fn test_engine_panic_is_reported_and_session_cleaned_up() {
    let (addr, state) = spawn_server_with(Arc::new(CrashingEngine)).await;
    let mut client = connect(addr).await;
    wait_for_connections(&state, 1).await;

    client.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    assert_eq!(
        next_json(&mut client).await,
        json!({"type": "error", "message": "Error processing your request"})
    );

    // The session survives the panic and keeps answering.
    client
        .send(Message::text(r#"{"type":"get_settings"}"#))
        .await
        .unwrap();
    assert_eq!(next_json(&mut client).await["type"], "settings_data");
    assert_eq!(state.registry.len().await, 1);

    client.close(None).await.unwrap();
    wait_for_connections(&state, 0).await;
}

#[tokio::test]
async fn test_echo_agent_answers_selected_session() {
    let (addr, _state) = spawn_server().await;
    let mut client = connect(addr).await;

    client
        .send(Message::text(
            r#"{"type":"update_settings","payload":{"settings":{"theme":"dark","active_voice_agent":"Echo"}}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(
        next_json(&mut client).await["payload"]["settings"]["active_voice_agent"],
        "Echo"
    );

    client.send(Message::text("hello there")).await.unwrap();
    assert_eq!(next_json(&mut client).await["type"], "audio_start");
    // "Echo: hello there" is three words, one chunk each.
    for _ in 0..3 {
        assert!(matches!(next_frame(&mut client).await, Message::Binary(_)));
    }
    assert_eq!(next_json(&mut client).await["type"], "audio_end");
}

/// JSON calls against the REST surface of a test server.
struct Http {
    client: reqwest::Client,
    base: String,
}

impl Http {
    fn new(addr: SocketAddr) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: format!("http://{addr}"),
        }
    }

    async fn get(&self, path: &str) -> Value {
        let response = self
            .client
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .unwrap();
        Self::json(response).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Value {
        let mut request = self.client.post(format!("{}{path}", self.base));
        if let Some(body) = body {
            request = request.json(&body);
        }
        Self::json(request.send().await.unwrap()).await
    }

    async fn json(response: reqwest::Response) -> Value {
        assert!(
            response.status().is_success(),
            "unexpected status: {}",
            response.status()
        );
        response.json().await.unwrap()
    }
}
