use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use configs::MAX_REVIEW_IMAGES;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::domain::{CreateReviewInput, DeleteOutcome, NewReview, Review, ReviewView, UpdateReviewInput};
use super::repository::ReviewRepository;
use crate::authz::{authorize, Actor, Policy};
use crate::compensation::{reclaim, CleanupReport};
use crate::errors::ReviewError;
use crate::storage::ObjectStore;
use crate::uploads::{UploadIntake, UploadLimits};

/// Orchestrates review writes across the record store and the object store.
///
/// The invariant it maintains: every reference committed in a review's
/// `images` names a blob that exists, and a failed request leaves no blobs
/// that no review references. Cleanup is best-effort and never changes the
/// outcome reported to the caller.
pub struct ReviewService {
    repo: Arc<dyn ReviewRepository>,
    store: Arc<dyn ObjectStore>,
    intake: UploadIntake,
    op_timeout: Duration,
}

impl ReviewService {
    pub fn new(
        repo: Arc<dyn ReviewRepository>,
        store: Arc<dyn ObjectStore>,
        limits: UploadLimits,
        op_timeout: Duration,
    ) -> Self {
        let intake = UploadIntake::new(Arc::clone(&store), limits, op_timeout);
        Self { repo, store, intake, op_timeout }
    }

    pub fn upload_limits(&self) -> &UploadLimits { self.intake.limits() }

    /// Create a review, uploading its images first.
    ///
    /// # Examples
    /// ```
    /// use std::{sync::Arc, time::Duration};
    /// use service::authz::{Actor, Role};
    /// use service::reviews::{CreateReviewInput, ReviewService, repository::mock::MockReviewRepository};
    /// use service::storage::InMemoryObjectStore;
    /// use service::uploads::{FilePart, UploadLimits};
    ///
    /// let repo = Arc::new(MockReviewRepository::default());
    /// let store = Arc::new(InMemoryObjectStore::new());
    /// let svc = ReviewService::new(repo.clone(), store.clone(), UploadLimits::default(), Duration::from_secs(5));
    /// let author = uuid::Uuid::new_v4();
    /// repo.add_user(author, "Ada");
    /// let input = CreateReviewInput {
    ///     service_id: Some(uuid::Uuid::new_v4()),
    ///     rating: Some(5),
    ///     comment: Some("Great".into()),
    ///     images: vec![FilePart::new("a.png", "image/png", vec![1u8, 2, 3])],
    /// };
    /// let view = tokio_test::block_on(svc.create(&Actor::new(author, Role::User), input)).unwrap();
    /// assert_eq!(view.author.name, "Ada");
    /// assert_eq!(view.images.len(), 1);
    /// assert!(store.contains(&view.images[0]));
    /// ```
    #[instrument(skip(self, input), fields(actor = %actor.id, files = input.images.len()))]
    pub async fn create(&self, actor: &Actor, input: CreateReviewInput) -> Result<ReviewView, ReviewError> {
        let service_id = input.service_id.ok_or_else(|| ReviewError::validation("service is required"))?;
        let rating = input.rating.ok_or_else(|| ReviewError::validation("rating is required"))?;
        models::review::validate_rating(rating)?;
        self.intake.check(&input.images)?;

        let images = self.intake.upload(input.images, Some(actor.id)).await?;

        let new_review = NewReview {
            author_id: actor.id,
            service_id,
            rating,
            comment: input.comment.unwrap_or_default(),
            images: images.clone(),
        };
        match self.repo.create(new_review).await {
            Ok(review) => {
                info!(review_id = %review.id, service_id = %service_id, images = review.images.len(), "review_created");
                Ok(self.project(review).await)
            }
            Err(e) => {
                error!(error = %e, "review insert failed; reclaiming uploaded images");
                self.compensate(&images, "create_rollback").await;
                Err(e)
            }
        }
    }

    pub async fn list_for_service(&self, service_id: Uuid) -> Result<Vec<ReviewView>, ReviewError> {
        self.repo.list_by_service(service_id).await
    }

    /// Apply a partial update as the review's author.
    ///
    /// Removals run first and stay committed even if a later step fails;
    /// newly uploaded images are reclaimed on any later failure.
    #[instrument(skip(self, input), fields(actor = %actor.id, review_id = %id))]
    pub async fn update(&self, actor: &Actor, id: Uuid, input: UpdateReviewInput) -> Result<ReviewView, ReviewError> {
        let mut review = self.repo.find_by_id(id).await?.ok_or(ReviewError::NotFound)?;
        authorize(actor, review.author_id, Policy::AuthorOnly)?;

        if let Some(rating) = input.rating {
            models::review::validate_rating(rating)?;
        }
        self.intake.check(&input.images)?;

        // Only references this review owns are reclaimed.
        let mut seen = HashSet::new();
        let (to_remove, ignored): (Vec<String>, Vec<String>) = input
            .deleted_images
            .into_iter()
            .filter(|r| seen.insert(r.clone()))
            .partition(|r| review.images.contains(r));
        if !ignored.is_empty() {
            warn!(count = ignored.len(), "ignoring deletions for images not on this review");
        }
        if !to_remove.is_empty() {
            self.compensate(&to_remove, "update_remove").await;
            review.images.retain(|img| !to_remove.contains(img));
        }
        let removed_any = !to_remove.is_empty();

        let added = match self.intake.upload(input.images, Some(actor.id)).await {
            Ok(refs) => refs,
            Err(e) => {
                self.commit_removals(&review, removed_any).await;
                return Err(e);
            }
        };

        let combined = review.images.len() + added.len();
        if combined > MAX_REVIEW_IMAGES {
            warn!(combined, max = MAX_REVIEW_IMAGES, "image ceiling exceeded; reclaiming new uploads");
            self.compensate(&added, "update_over_limit").await;
            self.commit_removals(&review, removed_any).await;
            return Err(ReviewError::TooManyFiles { max: MAX_REVIEW_IMAGES, got: combined });
        }
        review.images.extend(added.iter().cloned());

        if let Some(rating) = input.rating {
            review.rating = rating;
        }
        if let Some(comment) = input.comment.filter(|c| !c.is_empty()) {
            review.comment = comment;
        }

        match self.repo.save(&review).await {
            Ok(saved) => {
                info!(review_id = %saved.id, images = saved.images.len(), added = added.len(), removed = to_remove.len(), "review_updated");
                Ok(self.project(saved).await)
            }
            Err(e) => {
                error!(error = %e, "review save failed; reclaiming new images");
                self.compensate(&added, "update_rollback").await;
                Err(e)
            }
        }
    }

    /// Delete a review as its author or an admin. Blobs are reclaimed before
    /// the record so an interruption leaves a re-deletable record, not orphans.
    #[instrument(skip(self), fields(actor = %actor.id, review_id = %id))]
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<DeleteOutcome, ReviewError> {
        let review = self.repo.find_by_id(id).await?.ok_or(ReviewError::NotFound)?;
        authorize(actor, review.author_id, Policy::AuthorOrAdmin)?;

        let cleanup = self.compensate(&review.images, "review_delete").await;

        if !self.repo.delete(id).await? {
            warn!("review already removed by a concurrent request");
        }
        info!(images = review.images.len(), reclaimed = cleanup.deleted_count(), "review_deleted");
        Ok(DeleteOutcome { review_id: id, cleanup })
    }

    async fn compensate(&self, references: &[String], reason: &'static str) -> CleanupReport {
        let report = reclaim(self.store.as_ref(), references, self.op_timeout, reason).await;
        if !report.is_clean() {
            warn!(reason, failed = report.failed().count(), "some images could not be deleted");
        }
        report
    }

    /// Persist removals already applied to the object store when the rest of
    /// an update is abandoned; rating and comment stay as loaded.
    async fn commit_removals(&self, review: &Review, removed_any: bool) {
        if !removed_any {
            return;
        }
        if let Err(e) = self.repo.save(review).await {
            error!(review_id = %review.id, error = %e, "could not persist image removals; record may hold dangling references");
        }
    }

    async fn project(&self, review: Review) -> ReviewView {
        let name = match self.repo.author_name(review.author_id).await {
            Ok(Some(name)) => name,
            Ok(None) => {
                warn!(author_id = %review.author_id, "author not found for review");
                String::new()
            }
            Err(e) => {
                warn!(author_id = %review.author_id, error = %e, "author lookup failed");
                String::new()
            }
        };
        ReviewView::from_review(review, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Role;
    use crate::reviews::repository::mock::MockReviewRepository;
    use crate::storage::InMemoryObjectStore;
    use crate::uploads::FilePart;
    use bytes::Bytes;
    use chrono::Utc;

    struct Fixture {
        repo: Arc<MockReviewRepository>,
        store: Arc<InMemoryObjectStore>,
        svc: ReviewService,
        author: Actor,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MockReviewRepository::default());
        let store = Arc::new(InMemoryObjectStore::new());
        let svc = ReviewService::new(repo.clone(), store.clone(), UploadLimits::default(), Duration::from_secs(2));
        let author = Actor::new(Uuid::new_v4(), Role::User);
        repo.add_user(author.id, "Grace");
        Fixture { repo, store, svc, author }
    }

    fn png(name: &str) -> FilePart {
        FilePart::new(name, "image/png", Bytes::from(vec![7u8; 32]))
    }

    /// Seed a review whose images exist in the store.
    fn seed(f: &Fixture, images: &[&str]) -> Review {
        for r in images {
            f.store.insert(*r, Bytes::from_static(b"img"));
        }
        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4(),
            author_id: f.author.id,
            service_id: Uuid::new_v4(),
            rating: 3,
            comment: "ok".into(),
            images: images.iter().map(|s| s.to_string()).collect(),
            created_at: now,
            updated_at: now,
        };
        f.repo.insert(review.clone());
        review
    }

    fn create_input(images: Vec<FilePart>) -> CreateReviewInput {
        CreateReviewInput {
            service_id: Some(Uuid::new_v4()),
            rating: Some(4),
            comment: Some("nice".into()),
            images,
        }
    }

    #[tokio::test]
    async fn create_stores_every_uploaded_reference() {
        let f = fixture();
        let view = f.svc.create(&f.author, create_input(vec![png("a.png"), png("b.png")])).await.unwrap();
        assert_eq!(view.images.len(), 2);
        assert_eq!(f.store.len(), 2);
        for r in &view.images {
            assert!(f.store.contains(r));
        }
        assert_eq!(view.author.name, "Grace");
        assert_eq!(view.comment, "nice");
        assert_eq!(f.repo.len(), 1);
    }

    #[tokio::test]
    async fn create_without_rating_touches_nothing() {
        let f = fixture();
        let input = CreateReviewInput { rating: None, ..create_input(vec![png("a.png")]) };
        let err = f.svc.create(&f.author, input).await.unwrap_err();
        assert!(matches!(err, ReviewError::ValidationFailed(_)));
        assert_eq!(f.store.put_calls(), 0);
        assert!(f.store.delete_calls().is_empty());
        assert!(f.repo.is_empty());
    }

    #[tokio::test]
    async fn create_without_service_fails_validation() {
        let f = fixture();
        let input = CreateReviewInput { service_id: None, ..create_input(vec![]) };
        assert!(matches!(f.svc.create(&f.author, input).await, Err(ReviewError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn create_rejects_out_of_range_rating_before_upload() {
        let f = fixture();
        let input = CreateReviewInput { rating: Some(6), ..create_input(vec![png("a.png")]) };
        assert!(matches!(f.svc.create(&f.author, input).await, Err(ReviewError::ValidationFailed(_))));
        assert_eq!(f.store.put_calls(), 0);
    }

    #[tokio::test]
    async fn create_persistence_failure_reclaims_uploads() {
        let f = fixture();
        f.repo.fail_create(true);
        let err = f.svc.create(&f.author, create_input(vec![png("a.png"), png("b.png"), png("c.png")])).await.unwrap_err();
        assert!(matches!(err, ReviewError::PersistenceFailed(_)));
        assert_eq!(f.store.put_calls(), 3);
        assert!(f.store.is_empty());
        assert_eq!(f.store.delete_calls().len(), 3);
    }

    #[tokio::test]
    async fn create_cleanup_failure_does_not_mask_primary_error() {
        let f = fixture();
        f.repo.fail_create(true);
        f.store.fail_all_deletes(true);
        let err = f.svc.create(&f.author, create_input(vec![png("a.png")])).await.unwrap_err();
        assert!(matches!(err, ReviewError::PersistenceFailed(_)));
        assert_eq!(f.store.delete_calls().len(), 1);
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn create_with_defaults_to_empty_comment() {
        let f = fixture();
        let input = CreateReviewInput { comment: None, ..create_input(vec![]) };
        let view = f.svc.create(&f.author, input).await.unwrap();
        assert_eq!(view.comment, "");
        assert!(view.images.is_empty());
    }

    #[tokio::test]
    async fn update_removes_requested_image() {
        let f = fixture();
        let review = seed(&f, &["a", "b"]);
        f.store.fail_delete_of("a");
        let input = UpdateReviewInput { deleted_images: vec!["a".into()], ..Default::default() };
        let view = f.svc.update(&f.author, review.id, input).await.unwrap();
        assert_eq!(view.images, vec!["b".to_string()]);
        assert_eq!(f.store.delete_calls(), vec!["a".to_string()]);
        assert_eq!(f.repo.get(review.id).unwrap().images, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn update_over_ceiling_reclaims_new_uploads() {
        let f = fixture();
        let review = seed(&f, &["a", "b", "c", "d"]);
        let input = UpdateReviewInput { images: vec![png("e.png"), png("f.png")], ..Default::default() };
        let err = f.svc.update(&f.author, review.id, input).await.unwrap_err();
        assert!(matches!(err, ReviewError::TooManyFiles { max: 5, got: 6 }));

        let stored = f.repo.get(review.id).unwrap();
        assert_eq!(stored.images, review.images);
        assert_eq!(f.store.put_calls(), 2);
        assert_eq!(f.store.delete_calls().len(), 2);
        assert_eq!(f.store.references(), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn update_over_ceiling_keeps_committed_removals() {
        let f = fixture();
        let review = seed(&f, &["a", "b", "c", "d", "e"]);
        let input = UpdateReviewInput {
            deleted_images: vec!["a".into()],
            images: vec![png("x.png"), png("y.png")],
            ..Default::default()
        };
        let err = f.svc.update(&f.author, review.id, input).await.unwrap_err();
        assert!(matches!(err, ReviewError::TooManyFiles { got: 6, .. }));
        assert_eq!(f.repo.get(review.id).unwrap().images, vec!["b", "c", "d", "e"]);
        assert!(!f.store.contains("a"));
        assert_eq!(f.store.len(), 4);
    }

    #[tokio::test]
    async fn update_appends_and_applies_fields() {
        let f = fixture();
        let review = seed(&f, &["a"]);
        let input = UpdateReviewInput {
            rating: Some(5),
            comment: Some("better now".into()),
            images: vec![png("n.png")],
            ..Default::default()
        };
        let view = f.svc.update(&f.author, review.id, input).await.unwrap();
        assert_eq!(view.rating, 5);
        assert_eq!(view.comment, "better now");
        assert_eq!(view.images.len(), 2);
        assert_eq!(view.images[0], "a");
        assert!(f.store.contains(&view.images[1]));
    }

    #[tokio::test]
    async fn update_empty_comment_keeps_existing() {
        let f = fixture();
        let review = seed(&f, &[]);
        let input = UpdateReviewInput { comment: Some(String::new()), ..Default::default() };
        let view = f.svc.update(&f.author, review.id, input).await.unwrap();
        assert_eq!(view.comment, "ok");
        assert_eq!(view.rating, 3);
    }

    #[tokio::test]
    async fn update_by_other_user_is_forbidden() {
        let f = fixture();
        let review = seed(&f, &["a"]);
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let input = UpdateReviewInput { deleted_images: vec!["a".into()], ..Default::default() };
        let err = f.svc.update(&admin, review.id, input).await.unwrap_err();
        assert!(matches!(err, ReviewError::Forbidden));
        assert!(f.store.contains("a"));
        assert!(f.store.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn update_missing_review() {
        let f = fixture();
        let err = f.svc.update(&f.author, Uuid::new_v4(), UpdateReviewInput::default()).await.unwrap_err();
        assert!(matches!(err, ReviewError::NotFound));
    }

    #[tokio::test]
    async fn update_ignores_foreign_references() {
        let f = fixture();
        let review = seed(&f, &["a"]);
        f.store.insert("other-review-image", Bytes::from_static(b"x"));
        let input = UpdateReviewInput { deleted_images: vec!["other-review-image".into()], ..Default::default() };
        let view = f.svc.update(&f.author, review.id, input).await.unwrap();
        assert_eq!(view.images, vec!["a".to_string()]);
        assert!(f.store.contains("other-review-image"));
    }

    #[tokio::test]
    async fn update_save_failure_reclaims_only_new_uploads() {
        let f = fixture();
        let review = seed(&f, &["a", "b"]);
        f.repo.fail_save(true);
        let input = UpdateReviewInput {
            deleted_images: vec!["a".into()],
            images: vec![png("n.png")],
            ..Default::default()
        };
        let err = f.svc.update(&f.author, review.id, input).await.unwrap_err();
        assert!(matches!(err, ReviewError::PersistenceFailed(_)));
        // removal of "a" is not rolled back; the new upload is reclaimed
        assert_eq!(f.store.references(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn update_rejects_bad_rating_before_side_effects() {
        let f = fixture();
        let review = seed(&f, &["a"]);
        let input = UpdateReviewInput { rating: Some(0), deleted_images: vec!["a".into()], ..Default::default() };
        assert!(matches!(f.svc.update(&f.author, review.id, input).await, Err(ReviewError::ValidationFailed(_))));
        assert!(f.store.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn delete_by_stranger_is_forbidden() {
        let f = fixture();
        let review = seed(&f, &["a", "b"]);
        let stranger = Actor::new(Uuid::new_v4(), Role::Provider);
        let err = f.svc.delete(&stranger, review.id).await.unwrap_err();
        assert!(matches!(err, ReviewError::Forbidden));
        assert!(f.repo.get(review.id).is_some());
        assert_eq!(f.store.len(), 2);
    }

    #[tokio::test]
    async fn admin_delete_tolerates_missing_blob() {
        let f = fixture();
        let review = seed(&f, &["a", "b"]);
        assert!(f.store.remove_out_of_band("a"));
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let outcome = f.svc.delete(&admin, review.id).await.unwrap();
        assert!(outcome.cleanup.is_clean());
        assert_eq!(outcome.cleanup.items.len(), 2);
        assert!(f.repo.get(review.id).is_none());
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn delete_continues_past_failed_blob() {
        let f = fixture();
        let review = seed(&f, &["a", "b", "c"]);
        f.store.fail_delete_of("b");
        let outcome = f.svc.delete(&f.author, review.id).await.unwrap();
        assert_eq!(outcome.cleanup.deleted_count(), 2);
        assert_eq!(f.store.delete_calls().len(), 3);
        assert!(f.repo.get(review.id).is_none());
    }

    #[tokio::test]
    async fn delete_record_failure_is_reported() {
        let f = fixture();
        let review = seed(&f, &["a"]);
        f.repo.fail_delete(true);
        let err = f.svc.delete(&f.author, review.id).await.unwrap_err();
        assert!(matches!(err, ReviewError::PersistenceFailed(_)));
        assert!(f.repo.get(review.id).is_some());
    }

    #[tokio::test]
    async fn list_projects_author_names() {
        let f = fixture();
        let service_id = Uuid::new_v4();
        let input = CreateReviewInput { service_id: Some(service_id), ..create_input(vec![]) };
        f.svc.create(&f.author, input).await.unwrap();
        let listed = f.svc.list_for_service(service_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].author.name, "Grace");
        assert!(f.svc.list_for_service(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_removals_when_upload_fails() {
        let f = fixture();
        let review = seed(&f, &["a", "b"]);
        f.store.fail_puts_after(0);
        let input = UpdateReviewInput {
            deleted_images: vec!["a".into()],
            images: vec![png("n.png")],
            ..Default::default()
        };
        let err = f.svc.update(&f.author, review.id, input).await.unwrap_err();
        assert!(matches!(err, ReviewError::UploadFailed(_)));
        assert_eq!(f.repo.get(review.id).unwrap().images, vec!["b"]);
        assert!(f.store.delete_calls().contains(&"a".to_string()));
        assert_eq!(f.store.references(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn put_timeout_surfaces_as_upload_failure() {
        let repo = Arc::new(MockReviewRepository::default());
        let store = Arc::new(InMemoryObjectStore::new());
        store.set_put_delay(Some(Duration::from_millis(500)));
        let svc = ReviewService::new(repo.clone(), store.clone(), UploadLimits::default(), Duration::from_millis(20));
        let author = Actor::new(Uuid::new_v4(), Role::User);

        let err = svc.create(&author, create_input(vec![png("slow.png")])).await.unwrap_err();
        assert!(matches!(err, ReviewError::UploadFailed(ref msg) if msg.contains("timed out")));
        assert!(repo.is_empty());
        assert!(store.is_empty());
    }
}
