use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ransomeye_types::{ErrorKind, ProblemDetails};
use tracing::warn;

use crate::state::AppState;

/// Blocks all traffic while the service is not operational; every
/// listening binary in this workspace gates on a liveness check before
/// serving anything but `/healthz`.
pub async fn health_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Err(reason) = state.is_operational() {
        warn!(reason = %reason, "rejecting request: service not operational");
        let body = ProblemDetails::new(ErrorKind::Unavailable, "Service Unavailable", reason);
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }
    next.run(req).await
}

/// Single bearer token check. There is no operator/worker identity split
/// at this layer, so there is exactly one credential to check.
pub async fn auth_guard(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    let presented = req.headers().get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()).and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == state.config.bearer_token => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
