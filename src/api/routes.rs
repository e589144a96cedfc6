use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

/// Room for the multipart framing around the uploaded photo
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Creates the main router: UI shell, JSON API and cached style images
pub fn create_router(state: AppState) -> Router {
    let images = ServeDir::new(state.store.root());
    let body_limit = state.settings.max_upload_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .nest_service("/images", images)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/styles", get(handlers::list_styles))
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/:id/votes", post(handlers::cast_vote))
        .route("/sessions/:id/room", post(handlers::upload_room))
}
