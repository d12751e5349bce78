//! Main Entrypoint for the Vox API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the conversation engine and the voice synthesizer.
//! 3. Building the session registry and the per-frame session protocol.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use vox_api::{
    config::Config,
    models::SessionSettings,
    router::create_router,
    state::AppState,
    ws::{control::ControlRouter, dispatch::SessionProtocol, registry::SessionRegistry},
};
use vox_core::{ConversationEngine, EchoEngine, ToneSynthesizer, UltravoxEngine, VoiceSynthesizer};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Speech Services ---
    let engine: Arc<dyn ConversationEngine> = Arc::new(UltravoxEngine::new(SecretString::from(
        config.ultravox_api_key.expose_secret(),
    )));
    let synthesizer: Arc<dyn VoiceSynthesizer> = Arc::new(
        ToneSynthesizer::new(&config.default_voice)
            .with_context(|| format!("Invalid KOKORO_VOICE '{}'", config.default_voice))?,
    );
    if config.engine_timeout.is_none() {
        info!("No engine timeout configured; a stalled engine call blocks its session.");
    }

    // --- 4. Build Session Handling ---
    let registry = Arc::new(SessionRegistry::new(SessionSettings::with_theme(
        config.default_theme.clone(),
    )));
    let protocol = Arc::new(
        SessionProtocol::new(
            engine.clone(),
            synthesizer.clone(),
            ControlRouter::with_defaults(synthesizer.clone()),
        )
        .with_agent("UltraVoxKokoro", engine.clone())
        .with_agent("Echo", Arc::new(EchoEngine::new()))
        .with_engine_timeout(config.engine_timeout),
    );

    let app_state = Arc::new(AppState {
        registry,
        protocol,
        synthesizer: synthesizer.clone(),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        engine = engine.name(),
        voice = %synthesizer.active_voice(),
        engine_timeout = ?config.engine_timeout,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
