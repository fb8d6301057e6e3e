//! Shared building blocks for the marketplace crates: logging setup and
//! wire types that are not owned by any single layer.

pub mod types;
pub mod utils;
