use serde::Serialize;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use uuid::Uuid;

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(Serialize, ToSchema)]
pub struct AuthorDoc { pub id: Uuid, pub name: String }

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDoc {
    pub id: Uuid,
    pub author: AuthorDoc,
    pub service: Uuid,
    pub rating: i16,
    pub comment: String,
    pub images: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(ToSchema)]
pub struct MessageDoc { pub message: String }

#[derive(ToSchema)]
pub struct ErrorDoc { pub error: String, pub code: Option<u16> }

/// Multipart body of `POST /reviews`.
#[derive(ToSchema)]
pub struct CreateReviewForm {
    pub service: Uuid,
    /// Integer 1..=5
    pub rating: i16,
    pub comment: Option<String>,
    #[schema(value_type = Vec<String>)]
    pub images: Vec<Vec<u8>>,
}

/// Multipart body of `PUT /reviews/{id}`.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReviewForm {
    pub rating: Option<i16>,
    pub comment: Option<String>,
    /// JSON-encoded array of image references to remove
    pub deleted_images: Option<String>,
    #[schema(value_type = Vec<String>)]
    pub images: Vec<Vec<u8>>,
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::reviews::create,
        crate::routes::reviews::list,
        crate::routes::reviews::update,
        crate::routes::reviews::delete,
    ),
    components(
        schemas(
            HealthResponse,
            AuthorDoc,
            ReviewDoc,
            MessageDoc,
            ErrorDoc,
            CreateReviewForm,
            UpdateReviewForm,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health"),
        (name = "reviews")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_review_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/reviews"));
        assert!(paths.iter().any(|p| p.as_str() == "/reviews/{id}"));
        assert!(paths.iter().any(|p| p.as_str() == "/reviews/{service_id}"));
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
    }
}
