use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

use super::handlers;

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Expiration status
        .route("/api/expiration/summary", get(handlers::expiration::summary))
        .route(
            "/api/expiration/check/:signal_id",
            get(handlers::expiration::check),
        )
        .route("/api/expiration/expired", get(handlers::expiration::expired))
        .route(
            "/api/expiration/grace-period",
            get(handlers::expiration::grace_period),
        )
        .route(
            "/api/expiration/approaching/:minutes",
            get(handlers::expiration::approaching),
        )
        // User preferences
        .route(
            "/api/expiration/preferences/:user_id",
            get(handlers::preferences::get_preference)
                .put(handlers::preferences::update_preference),
        )
        // Manual actions
        .route("/api/expiration/cancel", post(handlers::expiration::cancel))
        // Background jobs
        .route(
            "/api/expiration/jobs/check-single",
            post(handlers::jobs::check_single),
        )
        .route(
            "/api/expiration/jobs/check-all",
            post(handlers::jobs::check_all),
        )
        .route(
            "/api/expiration/jobs/check-grace-periods",
            post(handlers::jobs::check_grace_periods),
        )
        .route(
            "/api/expiration/jobs/send-warnings",
            post(handlers::jobs::send_warnings),
        )
        .route(
            "/api/expiration/jobs/:job_id/status",
            get(handlers::jobs::status),
        )
        // Notifications
        .route(
            "/api/notifications/:user_id",
            get(handlers::notifications::list),
        )
        .route(
            "/api/notifications/:user_id/unread",
            get(handlers::notifications::unread),
        )
        .route(
            "/api/notifications/:notification_id/read",
            post(handlers::notifications::mark_read),
        )
        .route(
            "/api/notifications/:user_id/read-all",
            post(handlers::notifications::mark_all_read),
        );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render))
        .merge(api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
