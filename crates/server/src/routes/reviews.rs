use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::extract::WithRejection;
use common::types::MessageBody;
use service::authz::Actor;
use service::reviews::ReviewView;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::forms::ReviewForm;
use crate::routes::auth::ServerState;

#[utoipa::path(
    post,
    path = "/reviews",
    tag = "reviews",
    request_body(content = crate::openapi::CreateReviewForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Review created", body = crate::openapi::ReviewDoc),
        (status = 400, description = "Validation failed or file limits exceeded"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Upload or persistence failed")
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<ServerState>,
    Extension(actor): Extension<Actor>,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<(StatusCode, Json<ReviewView>), ApiError> {
    let form = ReviewForm::read(multipart, state.reviews.upload_limits()).await?;
    let input = form.into_create_input()?;
    let view = state.reviews.create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Reviews for one service, newest first. The path segment is the service id.
#[utoipa::path(
    get,
    path = "/reviews/{service_id}",
    tag = "reviews",
    params(("service_id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 200, description = "Reviews for the service", body = [crate::openapi::ReviewDoc]),
        (status = 500, description = "Persistence failed")
    )
)]
pub async fn list(
    State(state): State<ServerState>,
    WithRejection(Path(service_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<Vec<ReviewView>>, ApiError> {
    let views = state.reviews.list_for_service(service_id).await?;
    Ok(Json(views))
}

#[utoipa::path(
    put,
    path = "/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review id")),
    request_body(content = crate::openapi::UpdateReviewForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Review updated", body = crate::openapi::ReviewDoc),
        (status = 400, description = "Validation failed or file limits exceeded"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Review not found"),
        (status = 500, description = "Upload or persistence failed")
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<ServerState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<Json<ReviewView>, ApiError> {
    // not-found and forbidden take precedence over file limits
    let form = ReviewForm::read_unchecked(multipart).await?;
    let input = form.into_update_input()?;
    let view = state.reviews.update(&actor, id, input).await?;
    Ok(Json(view))
}

#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review deleted", body = crate::openapi::MessageDoc),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Neither the author nor an admin"),
        (status = 404, description = "Review not found"),
        (status = 500, description = "Persistence failed")
    ),
    security(("bearer" = []))
)]
pub async fn delete(
    State(state): State<ServerState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<MessageBody>, ApiError> {
    let outcome = state.reviews.delete(&actor, id).await?;
    if !outcome.cleanup.is_clean() {
        tracing::warn!(
            review_id = %outcome.review_id,
            leaked = outcome.cleanup.failed().count(),
            "review deleted with images left in the object store"
        );
    }
    Ok(Json(MessageBody { message: "Review deleted successfully".to_string() }))
}
