use crate::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub fn create_router(body_limit_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(crate::api::handlers::health::health))
        .route("/health", get(crate::api::handlers::health::health))
        .route(
            "/slack/events",
            post(crate::api::handlers::slack::slack_events),
        )
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
}
