use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::fetch::FetchError;
use crate::models::ErrorResponse;
use crate::resolver::{ResolveError, Resolver};

pub fn router(resolver: Arc<Resolver>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/problem/:id", get(problem_endpoint))
        .with_state(resolver)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn problem_endpoint(
    State(resolver): State<Arc<Resolver>>,
    Path(id): Path<String>,
) -> Response {
    match resolver.resolve(&id).await {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(e) => {
            let status = match &e {
                ResolveError::Fetch(FetchError::InvalidIdentifier(_)) => StatusCode::BAD_REQUEST,
                ResolveError::Fetch(FetchError::NotFound(_)) => StatusCode::NOT_FOUND,
                ResolveError::Fetch(_) => StatusCode::BAD_GATEWAY,
                ResolveError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ResolveError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            };
            tracing::warn!(problem = %id, error = %e, "problem request failed");
            let body = ErrorResponse {
                detail: e.user_message(),
            };
            (status, Json(body)).into_response()
        }
    }
}
