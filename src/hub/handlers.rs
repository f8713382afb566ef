use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    hub::ai::{self, ChatMessage},
    state::AppState,
};

pub fn hub_routes() -> Router<AppState> {
    Router::new()
        .route("/hub/status", get(hub_status))
        .route("/ai/chat", post(ai_chat))
}

#[derive(Debug, Serialize)]
struct CapabilityStatus {
    connected: bool,
}

#[derive(Debug, Serialize)]
pub struct HubStatusResponse {
    configured: bool,
    ai: CapabilityStatus,
    email: CapabilityStatus,
}

#[instrument(skip(state))]
pub async fn hub_status(State(state): State<AppState>) -> Json<HubStatusResponse> {
    let configured = state.hub.is_configured();

    let ai_connected = if configured {
        state
            .hub
            .request::<(), serde_json::Value>(Method::GET, "/hub/ai/v1/models", None)
            .await
            .is_ok()
    } else {
        false
    };

    // The email hub exposes no status endpoint; configured is the best
    // signal available.
    Json(HubStatusResponse {
        configured,
        ai: CapabilityStatus {
            connected: ai_connected,
        },
        email: CapabilityStatus {
            connected: configured,
        },
    })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[instrument(skip(state, user, payload))]
pub async fn ai_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.hub.is_configured() {
        return Err(ApiError::Upstream("AI Hub not configured".into()));
    }
    if payload.message.trim().is_empty() {
        return Err(ApiError::Validation("Message required".into()));
    }

    let mut messages = payload.history;
    messages.push(ChatMessage {
        role: "user".into(),
        content: payload.message,
    });

    let response = ai::chat(&state.hub, &messages).await.map_err(|e| {
        warn!(error = %e, user_id = %user.user_id, "hub chat failed");
        ApiError::Upstream("AI Hub unavailable".into())
    })?;

    Ok(Json(json!({ "reply": response.reply, "model": response.model })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_defaults_to_empty_history() {
        let req: ChatRequest = serde_json::from_value(json!({"message": "hi"})).unwrap();
        assert!(req.history.is_empty());
        assert_eq!(req.message, "hi");
    }
}
