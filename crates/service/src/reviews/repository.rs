use async_trait::async_trait;
use uuid::Uuid;

use super::domain::{NewReview, Review, ReviewView};
use crate::errors::ReviewError;

/// Persistence for review records. Implementations report storage failures
/// as `ReviewError::PersistenceFailed`.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create(&self, review: NewReview) -> Result<Review, ReviewError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>, ReviewError>;
    /// Overwrite rating, comment and images of an existing review.
    async fn save(&self, review: &Review) -> Result<Review, ReviewError>;
    /// Returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, ReviewError>;
    /// Reviews of a service, newest first, with authors resolved.
    async fn list_by_service(&self, service_id: Uuid) -> Result<Vec<ReviewView>, ReviewError>;
    async fn author_name(&self, user_id: Uuid) -> Result<Option<String>, ReviewError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use chrono::Utc;

    #[derive(Default)]
    pub struct MockReviewRepository {
        reviews: Mutex<HashMap<Uuid, Review>>,
        users: Mutex<HashMap<Uuid, String>>,
        fail_create: AtomicBool,
        fail_save: AtomicBool,
        fail_delete: AtomicBool,
    }

    impl MockReviewRepository {
        pub fn add_user(&self, id: Uuid, name: &str) {
            self.users.lock().unwrap().insert(id, name.to_string());
        }

        /// Seed a stored review directly.
        pub fn insert(&self, review: Review) {
            self.reviews.lock().unwrap().insert(review.id, review);
        }

        pub fn get(&self, id: Uuid) -> Option<Review> {
            self.reviews.lock().unwrap().get(&id).cloned()
        }

        pub fn len(&self) -> usize {
            self.reviews.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        pub fn fail_create(&self, on: bool) { self.fail_create.store(on, Ordering::SeqCst); }
        pub fn fail_save(&self, on: bool) { self.fail_save.store(on, Ordering::SeqCst); }
        pub fn fail_delete(&self, on: bool) { self.fail_delete.store(on, Ordering::SeqCst); }

        fn name_of(&self, id: Uuid) -> String {
            self.users.lock().unwrap().get(&id).cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ReviewRepository for MockReviewRepository {
        async fn create(&self, review: NewReview) -> Result<Review, ReviewError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(ReviewError::PersistenceFailed("injected create failure".into()));
            }
            let now = Utc::now();
            let stored = Review {
                id: Uuid::new_v4(),
                author_id: review.author_id,
                service_id: review.service_id,
                rating: review.rating,
                comment: review.comment,
                images: review.images,
                created_at: now,
                updated_at: now,
            };
            self.reviews.lock().unwrap().insert(stored.id, stored.clone());
            Ok(stored)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>, ReviewError> {
            Ok(self.get(id))
        }

        async fn save(&self, review: &Review) -> Result<Review, ReviewError> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(ReviewError::PersistenceFailed("injected save failure".into()));
            }
            let mut reviews = self.reviews.lock().unwrap();
            let existing = reviews
                .get_mut(&review.id)
                .ok_or_else(|| ReviewError::PersistenceFailed("review vanished".into()))?;
            existing.rating = review.rating;
            existing.comment = review.comment.clone();
            existing.images = review.images.clone();
            existing.updated_at = Utc::now();
            Ok(existing.clone())
        }

        async fn delete(&self, id: Uuid) -> Result<bool, ReviewError> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(ReviewError::PersistenceFailed("injected delete failure".into()));
            }
            Ok(self.reviews.lock().unwrap().remove(&id).is_some())
        }

        async fn list_by_service(&self, service_id: Uuid) -> Result<Vec<ReviewView>, ReviewError> {
            let mut found: Vec<Review> = self
                .reviews
                .lock()
                .unwrap()
                .values()
                .filter(|r| r.service_id == service_id)
                .cloned()
                .collect();
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(found
                .into_iter()
                .map(|r| {
                    let name = self.name_of(r.author_id);
                    ReviewView::from_review(r, name)
                })
                .collect())
        }

        async fn author_name(&self, user_id: Uuid) -> Result<Option<String>, ReviewError> {
            Ok(self.users.lock().unwrap().get(&user_id).cloned())
        }
    }
}
