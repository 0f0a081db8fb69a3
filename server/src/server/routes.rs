//! Router configuration.

use super::state::AppState;
use crate::api::{bookings, events};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json,
};
use eventease_web::correlation_id_layer;
use eventease_web::handlers::{HealthCheck, health_check, metrics_response, readiness_check};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the complete Axum router.
///
/// - `/health`, `/ready`, `/metrics`
/// - `/api/events` catalog (writes and attendee lists require the admin role)
/// - `/api/bookings` create, list own, cancel
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/attendees", get(events::list_attendees))
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/mine", get(bookings::list_my_bookings))
        .route("/bookings/:id/cancel", put(bookings::cancel_booking));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(correlation_id_layer())
        .with_state(state)
}

async fn ready(State(state): State<AppState>) -> (StatusCode, Json<HealthCheck>) {
    readiness_check(state.storage.as_ref()).await
}

#[allow(clippy::unused_async)]
async fn metrics(State(state): State<AppState>) -> Response {
    metrics_response(state.metrics.render())
}
