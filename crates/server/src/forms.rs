//! Multipart parsing for review create/update requests.
//!
//! File parts are buffered chunk by chunk so an oversized file is rejected
//! as soon as it crosses the per-file limit, before anything reaches the
//! object store.

use std::collections::HashMap;

use axum::extract::multipart::{Multipart, MultipartError};
use bytes::BytesMut;
use uuid::Uuid;

use service::errors::ReviewError;
use service::reviews::{CreateReviewInput, UpdateReviewInput};
use service::uploads::{FilePart, UploadLimits};

const FILE_FIELDS: [&str; 2] = ["images", "images[]"];

fn malformed(e: MultipartError) -> ReviewError {
    ReviewError::validation(format!("malformed multipart body: {}", e.body_text()))
}

#[derive(Debug, Default)]
pub struct ReviewForm {
    fields: HashMap<String, String>,
    pub files: Vec<FilePart>,
}

impl ReviewForm {
    /// Read a form, enforcing file count and size while streaming.
    pub async fn read(multipart: Multipart, limits: &UploadLimits) -> Result<Self, ReviewError> {
        Self::read_inner(multipart, Some(limits)).await
    }

    /// Read a form bounded only by the router's body limit. File limits are
    /// left to the coordinator, which checks them after authorization.
    pub async fn read_unchecked(multipart: Multipart) -> Result<Self, ReviewError> {
        Self::read_inner(multipart, None).await
    }

    async fn read_inner(mut multipart: Multipart, limits: Option<&UploadLimits>) -> Result<Self, ReviewError> {
        let max_files = limits.map_or(usize::MAX, |l| l.max_files);
        let max_file_bytes = limits.map_or(usize::MAX, |l| l.max_file_bytes);
        let mut form = ReviewForm::default();
        let mut skipped = 0usize;

        while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();
            if !FILE_FIELDS.contains(&name.as_str()) {
                let text = field.text().await.map_err(malformed)?;
                form.fields.insert(name, text);
                continue;
            }

            // over the count limit: keep counting, never buffer
            if form.files.len() >= max_files {
                skipped += 1;
                continue;
            }

            let file_name = field.file_name().map(str::to_string);
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let mut buf = BytesMut::new();
            while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                if buf.len() + chunk.len() > max_file_bytes {
                    return Err(ReviewError::FileTooLarge {
                        name: file_name.clone().unwrap_or(name),
                        max_bytes: max_file_bytes,
                    });
                }
                buf.extend_from_slice(&chunk);
            }

            // browsers send an empty part when no file was picked
            if buf.is_empty() && file_name.as_deref().map_or(true, str::is_empty) {
                continue;
            }
            form.files.push(FilePart { file_name, content_type, data: buf.freeze() });
        }

        if skipped > 0 {
            return Err(ReviewError::TooManyFiles { max: max_files, got: max_files + skipped });
        }
        Ok(form)
    }

    /// Trimmed value of a text field; blank counts as absent.
    fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    fn service_id(&self) -> Result<Option<Uuid>, ReviewError> {
        self.text("service")
            .map(|s| Uuid::parse_str(s).map_err(|_| ReviewError::validation("service must be a valid id")))
            .transpose()
    }

    fn rating(&self) -> Result<Option<i16>, ReviewError> {
        self.text("rating")
            .map(|s| {
                s.parse::<i16>()
                    .map_err(|_| ReviewError::validation("rating must be an integer between 1 and 5"))
            })
            .transpose()
    }

    fn deleted_images(&self) -> Result<Vec<String>, ReviewError> {
        match self.text("deletedImages") {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str::<Vec<String>>(raw)
                .map_err(|_| ReviewError::validation("deletedImages must be a JSON array of strings")),
        }
    }

    pub fn into_create_input(self) -> Result<CreateReviewInput, ReviewError> {
        Ok(CreateReviewInput {
            service_id: self.service_id()?,
            rating: self.rating()?,
            comment: self.fields.get("comment").cloned(),
            images: self.files,
        })
    }

    pub fn into_update_input(self) -> Result<UpdateReviewInput, ReviewError> {
        Ok(UpdateReviewInput {
            rating: self.rating()?,
            comment: self.fields.get("comment").cloned(),
            deleted_images: self.deleted_images()?,
            images: self.files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(fields: &[(&str, &str)]) -> ReviewForm {
        ReviewForm {
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            files: Vec::new(),
        }
    }

    #[test]
    fn blank_fields_are_absent() {
        let input = form(&[("service", "  "), ("rating", "")]).into_create_input().unwrap();
        assert!(input.service_id.is_none());
        assert!(input.rating.is_none());
    }

    #[test]
    fn bad_rating_is_a_validation_failure() {
        let err = form(&[("rating", "five")]).into_update_input().unwrap_err();
        assert!(matches!(err, ReviewError::ValidationFailed(_)));
    }

    #[test]
    fn bad_service_id_is_a_validation_failure() {
        let err = form(&[("service", "not-a-uuid"), ("rating", "4")]).into_create_input().unwrap_err();
        assert!(matches!(err, ReviewError::ValidationFailed(_)));
    }

    #[test]
    fn deleted_images_is_a_json_array() {
        let input = form(&[("deletedImages", r#"["memory://reviews/a.png"]"#)])
            .into_update_input()
            .unwrap();
        assert_eq!(input.deleted_images, vec!["memory://reviews/a.png".to_string()]);

        let err = form(&[("deletedImages", "memory://reviews/a.png")]).into_update_input().unwrap_err();
        assert!(matches!(err, ReviewError::ValidationFailed(_)));
    }

    #[test]
    fn comment_is_passed_through_untrimmed() {
        let input = form(&[("comment", " spotless ")]).into_update_input().unwrap();
        assert_eq!(input.comment.as_deref(), Some(" spotless "));
    }
}
