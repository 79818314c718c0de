use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{alerts, bundles, correlation, events, health, jobs, rehydrate};
use crate::middleware::{auth_guard, health_guard};
use crate::state::AppState;

/// Request bodies above this are rejected before deserialization; bundle
/// uploads use `BundleRepository`'s file path reference instead of a huge
/// JSON body on `POST /rehydrate`.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let guarded = Router::new()
        .route("/events", post(events::ingest_event))
        .route("/heartbeat", post(health::heartbeat))
        .route("/alerts/batch", post(alerts::ingest_batch))
        .route("/alerts", get(alerts::list_alerts))
        .route("/alerts/:alert_id", get(alerts::get_alert).patch(alerts::transition_alert))
        .route("/correlation/ingest", post(correlation::ingest_batch))
        .route("/incidents/:incident_id", get(correlation::get_incident))
        .route("/bundles", post(bundles::enqueue_bundle))
        .route("/jobs/:job_id", get(jobs::get_job))
        .route("/rehydrate", post(rehydrate::enqueue_rehydrate))
        .layer(middleware::from_fn_with_state(state.clone(), health_guard))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(health::metrics))
        .merge(guarded)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}
