pub mod auth;
pub mod reviews;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;

use common::types::Health;

use crate::openapi::ApiDoc;
use auth::ServerState;

/// Room for the text fields and multipart framing on top of the files themselves.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "Service is up", body = crate::openapi::HealthResponse)))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the full application router.
///
/// `GET /reviews/:id` takes a *service* id and is public; `PUT`/`DELETE` on
/// the same path take a review id and require an authenticated actor.
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let limits = state.reviews.upload_limits();
    let body_limit = limits
        .max_files
        .saturating_mul(limits.max_file_bytes)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let require_actor = middleware::from_fn_with_state(state.clone(), auth::require_actor);

    Router::new()
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/reviews", post(reviews::create).route_layer(require_actor.clone()))
        .route(
            "/reviews/:id",
            get(reviews::list).merge(
                put(reviews::update)
                    .delete(reviews::delete)
                    .route_layer(require_actor),
            ),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
