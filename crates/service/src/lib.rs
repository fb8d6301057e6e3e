//! Service layer for the review pipeline, independent of the web framework.
//! - Object storage seam with S3 and in-memory implementations.
//! - Upload intake with per-call rollback.
//! - Review coordinator with compensating blob cleanup.
//! - Authorization gate for review mutations.

pub mod errors;
pub mod authz;
pub mod storage;
pub mod uploads;
pub mod compensation;
pub mod reviews;
