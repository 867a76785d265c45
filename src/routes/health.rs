use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let dispatch = state.notification_service.status(Utc::now());
    let body = json!({
        "status": "ok",
        "email_dispatch": dispatch,
    });
    (StatusCode::OK, Json(body))
}
