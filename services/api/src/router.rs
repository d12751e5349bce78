//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        BroadcastPayload, BroadcastReport, ChangeStatus, ErrorResponse, HealthResponse,
        VoiceChangeResponse, VoiceList,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_voices,
        handlers::change_voice,
        handlers::health,
        handlers::broadcast,
    ),
    components(
        schemas(VoiceList, VoiceChangeResponse, ChangeStatus, HealthResponse, BroadcastPayload, BroadcastReport, ErrorResponse)
    ),
    tags(
        (name = "Vox API", description = "Voice gateway: voice selection and session operations")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/voices", get(handlers::list_voices))
        // Voice identifiers contain a slash (`en_US/amy`), hence the wildcard.
        .route("/voice/{*voice_name}", post(handlers::change_voice))
        .route("/health", get(handlers::health))
        .route("/broadcast", post(handlers::broadcast))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
