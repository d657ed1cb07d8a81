use crate::{handlers, health, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// The four endpoints of spec.md §4.12, layered with CORS and request
/// tracing the same way the teacher's router does.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/process_article", post(handlers::process_article))
        .route("/process_fragment", post(handlers::process_fragment))
        .route("/status/:job_id", get(handlers::job_status))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(TraceLayer::new_for_http())
}
