//! Axum Handlers for the REST API
//!
//! This module contains the voice management and operational endpoints that
//! sit beside the WebSocket session. It uses `utoipa` doc comments to
//! generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    models::{
        BroadcastPayload, BroadcastReport, ChangeStatus, ErrorResponse, HealthResponse,
        VoiceChangeResponse, VoiceList,
    },
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

/// List the voices the synthesizer can speak with.
#[utoipa::path(
    get,
    path = "/voices",
    responses(
        (status = 200, description = "Available voices", body = VoiceList)
    )
)]
pub async fn list_voices(State(state): State<Arc<AppState>>) -> Json<VoiceList> {
    Json(VoiceList {
        voices: state.synthesizer.list_voices(),
    })
}

/// Change the voice used for every subsequent reply.
///
/// Replies already being streamed keep their voice. An unknown voice leaves
/// the current one active and is reported in the body, not the status code.
#[utoipa::path(
    post,
    path = "/voice/{voice_name}",
    responses(
        (status = 200, description = "Outcome of the voice change", body = VoiceChangeResponse)
    ),
    params(
        ("voice_name" = String, Path, description = "Identifier of the voice, e.g. en_US/joe")
    )
)]
pub async fn change_voice(
    State(state): State<Arc<AppState>>,
    Path(voice_name): Path<String>,
) -> Json<VoiceChangeResponse> {
    match state.synthesizer.select_voice(&voice_name) {
        Ok(()) => Json(VoiceChangeResponse {
            status: ChangeStatus::Success,
            message: format!("Changed voice to {}", voice_name),
        }),
        Err(e) => {
            warn!(error = %e, "Failed to change voice");
            Json(VoiceChangeResponse {
                status: ChangeStatus::Error,
                message: "Failed to change voice".to_string(),
            })
        }
    }
}

/// Liveness probe with the number of live sessions.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        connections: state.registry.len().await,
    })
}

/// Send a text message to every connected client.
///
/// Delivery is best effort: clients whose connection fails are disconnected
/// and counted as dropped. Clients in the middle of an audio reply get the
/// message once it ends and are counted as queued.
#[utoipa::path(
    post,
    path = "/broadcast",
    request_body = BroadcastPayload,
    responses(
        (status = 200, description = "Broadcast attempted", body = BroadcastReport),
        (status = 400, description = "Bad request", body = ErrorResponse)
    )
)]
pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BroadcastPayload>,
) -> Result<Json<BroadcastReport>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }
    let report = state.registry.broadcast(&payload.message).await;
    info!(
        delivered = report.delivered,
        queued = report.queued,
        dropped = report.dropped,
        "Broadcast sent"
    );
    Ok(Json(report))
}
