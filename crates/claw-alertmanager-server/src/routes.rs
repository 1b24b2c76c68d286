//! Route configuration for the alertmanager API.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{Router, get};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    add_receiver, delete_receiver, delete_silence, edit_receiver, get_alerts, get_metrics,
    get_silence_by_id, get_silences, get_status, list_receivers, post_alerts, post_silence,
};
use crate::state::AppState;

/// Headers set on every response.
const FIXED_HEADERS: [(HeaderName, &str); 5] = [
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "Accept, Authorization, Content-Type, Origin",
    ),
    (
        header::ACCESS_CONTROL_ALLOW_METHODS,
        "GET, POST, DELETE, OPTIONS",
    ),
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_EXPOSE_HEADERS, "Date"),
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
];

/// Create the v1 API router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/status", get(get_status))
        // Receivers
        .route("/receivers", get(list_receivers).post(add_receiver))
        .route("/receivers/", axum::routing::put(edit_receiver).delete(delete_receiver))
        // Alerts
        .route("/alerts", get(get_alerts).post(post_alerts))
        // Silences
        .route("/silences", get(get_silences).post(post_silence))
        .route("/silence/{sid}", get(get_silence_by_id).delete(delete_silence));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(get_metrics))
        .with_state(state)
        .layer(middleware::from_fn(preflight));

    for (name, value) in FIXED_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(
            name,
            HeaderValue::from_static(value),
        ));
    }

    router.layer(TraceLayer::new_for_http())
}

/// Answers every `OPTIONS` request with an empty 200.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}
