use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compensation::CleanupReport;
use crate::uploads::FilePart;

/// Stored review (business view).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub author_id: Uuid,
    pub service_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review about to be persisted; id and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub author_id: Uuid,
    pub service_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorView {
    pub id: Uuid,
    pub name: String,
}

/// Read-only projection returned to clients: the author is resolved to a display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: Uuid,
    pub author: AuthorView,
    pub service: Uuid,
    pub rating: i16,
    pub comment: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewView {
    pub fn from_review(review: Review, author_name: String) -> Self {
        Self {
            id: review.id,
            author: AuthorView { id: review.author_id, name: author_name },
            service: review.service_id,
            rating: review.rating,
            comment: review.comment,
            images: review.images,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

/// Create request. `service_id` and `rating` are optional here so that their
/// absence is reported as a validation failure by the coordinator.
#[derive(Debug, Clone, Default)]
pub struct CreateReviewInput {
    pub service_id: Option<Uuid>,
    pub rating: Option<i16>,
    pub comment: Option<String>,
    pub images: Vec<FilePart>,
}

/// Partial update. `None` (or an empty comment) keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateReviewInput {
    pub rating: Option<i16>,
    pub comment: Option<String>,
    pub deleted_images: Vec<String>,
    pub images: Vec<FilePart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub review_id: Uuid,
    pub cleanup: CleanupReport,
}
