//! Best-effort blob reclamation.
//!
//! Every reference is attempted even when others fail; failures are logged
//! and reported per item, never raised. Callers decide their primary outcome
//! independently of the report.

use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::storage::{delete_with_timeout, ObjectStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Deleted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupItem {
    pub reference: String,
    pub outcome: CleanupOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub items: Vec<CleanupItem>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.items.iter().all(|i| i.outcome == CleanupOutcome::Deleted)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CleanupItem> {
        self.items.iter().filter(|i| i.outcome != CleanupOutcome::Deleted)
    }

    pub fn deleted_count(&self) -> usize {
        self.items.len() - self.failed().count()
    }
}

/// Delete every reference, concurrently, each bounded by `limit`.
/// `reason` labels the log lines (e.g. `create_rollback`).
pub async fn reclaim(
    store: &dyn ObjectStore,
    references: &[String],
    limit: Duration,
    reason: &'static str,
) -> CleanupReport {
    if references.is_empty() {
        return CleanupReport::default();
    }
    let attempts = references.iter().map(|reference| async move {
        let outcome = match delete_with_timeout(store, reference, limit).await {
            Ok(()) => {
                debug!(%reference, reason, "blob reclaimed");
                CleanupOutcome::Deleted
            }
            Err(e) => {
                warn!(%reference, reason, error = %e, "blob cleanup failed");
                CleanupOutcome::Failed(e.to_string())
            }
        };
        CleanupItem { reference: reference.clone(), outcome }
    });
    CleanupReport { items: join_all(attempts).await }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryObjectStore;
    use bytes::Bytes;

    #[tokio::test]
    async fn attempts_all_despite_failures() {
        let store = InMemoryObjectStore::new();
        for r in ["m://a", "m://b", "m://c"] {
            store.insert(r, Bytes::from_static(b"x"));
        }
        store.fail_delete_of("m://b");

        let refs: Vec<String> = ["m://a", "m://b", "m://c"].iter().map(|s| s.to_string()).collect();
        let report = reclaim(&store, &refs, Duration::from_secs(1), "test").await;

        assert_eq!(report.items.len(), 3);
        assert!(!report.is_clean());
        assert_eq!(report.deleted_count(), 2);
        let failed: Vec<&str> = report.failed().map(|i| i.reference.as_str()).collect();
        assert_eq!(failed, vec!["m://b"]);
        assert_eq!(store.references(), vec!["m://b".to_string()]);
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let store = InMemoryObjectStore::new();
        let report = reclaim(&store, &[], Duration::from_secs(1), "test").await;
        assert!(report.is_clean());
        assert!(store.delete_calls().is_empty());
    }
}
