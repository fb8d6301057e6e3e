use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::PathRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::types::ErrorBody;
use service::errors::ReviewError;
use thiserror::Error;
use tracing::{error, warn};

/// Error returned by every handler; rendered as `{"error": ..., "code": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Review(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Review(e) => ErrorBody::new(e.to_string()).with_code(e.code()),
            ApiError::Unauthorized(msg) => ErrorBody::new(msg.clone()).with_code(401),
            ApiError::BadRequest(msg) => ErrorBody::new(msg.clone()).with_code(400),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();
        if status.is_server_error() {
            error!(status = status.as_u16(), code = ?body.code, error = %body.error, "request failed");
        } else {
            warn!(status = status.as_u16(), code = ?body.code, error = %body.error, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_errors_keep_their_status() {
        assert_eq!(ApiError::from(ReviewError::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(ReviewError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(ReviewError::TooManyFiles { max: 5, got: 6 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ReviewError::UploadFailed("s3 down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn body_carries_the_review_code() {
        let body = ApiError::from(ReviewError::NotFound).body();
        assert_eq!(body.code, Some(2005));
        assert_eq!(body.error, "review not found");
    }

    #[test]
    fn unauthorized_is_401() {
        let err = ApiError::Unauthorized("missing token".into());
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
