// Route modules
pub mod credits;
pub mod enrollments;
pub mod payments;

use crate::{app_state::AppState, middleware::logging_middleware};
use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::middleware::REQUEST_ID_HEADER;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    timeout,
                )),
        )
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes() -> Router<AppState> {
    // Normalized payment gateway events
    let payment_routes = Router::new()
        .route("/payments/confirmed", post(payments::payment_confirmed))
        .route("/payments/reversed", post(payments::payment_reversed));

    let enrollment_routes = Router::new()
        .route("/enrollments", post(enrollments::enroll))
        .route("/enrollments/{id}/cancel", post(enrollments::cancel));

    let credit_routes = Router::new()
        .route("/admin/credits/adjust", post(credits::admin_adjust))
        .route("/students/{id}/balances", get(credits::get_student_balances))
        .route(
            "/students/{id}/subjects/{subject_id}/balance",
            get(credits::get_balance),
        )
        .route(
            "/students/{id}/subjects/{subject_id}/ledger",
            get(credits::get_ledger_history),
        );

    // Combine all routes with request/response body logging
    Router::new()
        .merge(payment_routes)
        .merge(enrollment_routes)
        .merge(credit_routes)
        .layer(middleware::from_fn(logging_middleware))
}
