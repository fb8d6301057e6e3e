//! Review lifecycle: domain types, persistence seam and the coordinator that
//! keeps review records and stored images consistent.

pub mod domain;
pub mod repository;
pub mod repo;
pub mod service;

pub use domain::{CreateReviewInput, DeleteOutcome, Review, ReviewView, UpdateReviewInput};
pub use service::ReviewService;
