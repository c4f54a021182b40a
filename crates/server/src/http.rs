use axum::extract::State;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::websocket::ws_handler;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><title>voice agent</title></head>
<body><p>voice-agent-server is running. Connect to /ws/new.</p></body>
</html>"#;

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Stub voice catalog; a concrete TTS vendor integration would populate
/// this from the provider's own voice-listing API. Out of scope for the
/// core pipeline, kept here only so clients have somewhere to ask.
async fn voices() -> Json<serde_json::Value> {
    Json(json!({
        "voices": [
            { "voice_id": "en-US-amara", "name": "Amara", "labels": { "gender": "female" } },
            { "voice_id": "en-US-terrell", "name": "Terrell", "labels": { "gender": "male" } },
        ]
    }))
}

async fn health() -> &'static str {
    "ok"
}

async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ready = voice_agent_config::providers_ready(&state.settings);
    Json(json!({
        "ready": ready,
        "active_sessions": state.sessions.active_count(),
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus_handle {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/voices", get(voices))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics_handler))
        .nest_service("/static", tower_http::services::ServeDir::new("static"))
        .route("/ws/:session_id", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
        .with_state(state)
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_agent_config::Settings;

    #[tokio::test]
    async fn router_builds() {
        let state = AppState::new(Settings::default()).expect("state construction");
        let _router = create_router(state);
    }
}
