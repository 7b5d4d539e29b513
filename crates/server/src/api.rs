//! HTTP handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use athenaviz_core::{ParamValue, QueryRequest, ResourceParams};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::state::AppState;

/// `{"error": message}` with status 400.
pub fn error_reply(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message.into() }))).into_response()
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: String,
}

/// Lists named queries in the default region.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let status = state.finder().check(&state.default_region).await;
    if status.is_success() {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                message: status.message,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "error",
                message: status.message,
            }),
        )
    }
}

/// `GET /resources/{name}`; query parameters are passed through as text.
pub async fn resource(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let params: ResourceParams = query
        .into_iter()
        .map(|(k, v)| (k, ParamValue::Text(v)))
        .collect();
    debug!(resource = %name, ?params, "Resource request");

    match state.resources.fetch(&name, &params).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => {
            warn!(resource = %name, error = %e, "Resource request failed");
            error_reply(e.to_string())
        }
    }
}

/// `POST /query`; per-target failures are carried in the reply.
pub async fn query(State(state): State<Arc<AppState>>, Json(request): Json<QueryRequest>) -> Response {
    debug!(targets = request.queries.len(), "Query request");
    match state.backend.query(&request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            warn!(error = %e, "Query request failed");
            error_reply(e.to_string())
        }
    }
}
