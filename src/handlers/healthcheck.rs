use axum::response::IntoResponse;
use serde_json::json;

use crate::response::ApiResponse;

pub async fn healthcheck() -> impl IntoResponse {
    ApiResponse::ok(json!({ "message": "Everything is O.K" }), "Health check successful")
}
