//! HTTP boundary: session publishing and observability.
//!
//! The authoring tool publishes configurations here; everything device-facing
//! happens over the WebSocket endpoint. Responses are JSON with camelCase
//! keys to match the wire protocol.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use stagelink_core::config::SessionConfig;
use stagelink_core::validate::validate_config;
use stagelink_registry::SessionRegistry;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    /// Base URL devices are told to open, e.g. `https://play.example.com`.
    pub public_url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn create_session(
    State(state): State<AppState>,
    Json(config): Json<SessionConfig>,
) -> Response {
    let errors = validate_config(&config);
    if !errors.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Invalid session config",
                "details": errors,
            })),
        )
            .into_response();
    }

    let session = state.registry.create_session(config).await;
    info!(session_id = %session.id, "session published");
    Json(json!({
        "sessionId": session.id,
        "driverUrl": format!("{}/driver/{}", state.public_url, session.id),
        "controllerUrl": format!("{}/controller/{}", state.public_url, session.id),
        "publishedAt": session.created_at,
    }))
    .into_response()
}

async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(session) = state.registry.get_session(&id).await else {
        return not_found();
    };
    let devices: Vec<serde_json::Value> = session
        .list_devices()
        .await
        .into_iter()
        .map(|d| {
            json!({
                "deviceId": d.id,
                "deviceType": d.role,
                "frameId": d.frame_id,
                "joinedAt": d.joined_at,
            })
        })
        .collect();
    Json(json!({
        "sessionId": session.id,
        "fileName": session.config.file_name,
        "config": &*session.config,
        "deviceCount": devices.len(),
        "devices": devices,
        "createdAt": session.created_at,
    }))
    .into_response()
}

async fn list_sessions(State(state): State<AppState>) -> Response {
    Json(state.registry.stats().await).into_response()
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if state.registry.delete_session(&id).await {
        Json(json!({ "deleted": true })).into_response()
    } else {
        not_found()
    }
}

async fn health(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "sessions": state.registry.session_count().await,
    }))
    .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Session not found" })),
    )
        .into_response()
}
