use chrono::Utc;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::errors::ReviewError;
use crate::reviews::domain::{NewReview, Review, ReviewView};
use crate::reviews::repository::ReviewRepository;

pub struct SeaOrmReviewRepository {
    pub db: DatabaseConnection,
}

fn persistence(e: models::errors::ModelError) -> ReviewError {
    ReviewError::PersistenceFailed(e.to_string())
}

fn to_domain(m: models::review::Model) -> Review {
    let images = m.image_list();
    Review {
        id: m.id,
        author_id: m.author_id,
        service_id: m.service_id,
        rating: m.rating,
        comment: m.comment,
        images,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

#[async_trait::async_trait]
impl ReviewRepository for SeaOrmReviewRepository {
    async fn create(&self, review: NewReview) -> Result<Review, ReviewError> {
        let created = models::review::create(
            &self.db,
            review.author_id,
            review.service_id,
            review.rating,
            &review.comment,
            &review.images,
        )
        .await
        .map_err(persistence)?;
        Ok(to_domain(created))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>, ReviewError> {
        let found = models::review::find(&self.db, id).await.map_err(persistence)?;
        Ok(found.map(to_domain))
    }

    async fn save(&self, review: &Review) -> Result<Review, ReviewError> {
        let saved = models::review::save(&self.db, review.id, review.rating, &review.comment, &review.images)
            .await
            .map_err(persistence)?;
        Ok(to_domain(saved))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ReviewError> {
        models::review::delete(&self.db, id).await.map_err(persistence)
    }

    async fn list_by_service(&self, service_id: Uuid) -> Result<Vec<ReviewView>, ReviewError> {
        let rows = models::review::list_by_service_with_authors(&self.db, service_id)
            .await
            .map_err(persistence)?;
        Ok(rows
            .into_iter()
            .map(|(review, author)| {
                let name = author.map(|u| u.name).unwrap_or_default();
                ReviewView::from_review(to_domain(review), name)
            })
            .collect())
    }

    async fn author_name(&self, user_id: Uuid) -> Result<Option<String>, ReviewError> {
        models::user::find_name(&self.db, user_id).await.map_err(persistence)
    }
}
