//! Health check endpoint

use axum::{response::IntoResponse, Json};
use serde_json::json;

/// `{"status":"healthy"}` with 200
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}
