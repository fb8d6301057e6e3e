//! Process-local object store.
//!
//! Backs the `memory` storage backend for local development and is the
//! store the review pipeline tests run against. Failure injection hooks let
//! tests reproduce partial-failure sequences deterministically.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{object_key, BlobMetadata, ObjectStore, StoreError};

#[derive(Default)]
struct State {
    blobs: HashMap<String, Bytes>,
    put_calls: usize,
    delete_calls: Vec<String>,
    /// Number of further puts that succeed before every put fails.
    puts_before_failure: Option<usize>,
    failing_deletes: HashSet<String>,
    all_deletes_fail: bool,
    put_delay: Option<Duration>,
}

pub struct InMemoryObjectStore {
    base_url: String,
    key_prefix: String,
    state: Mutex<State>,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self { Self::new() }
}

fn lock(m: &Mutex<State>) -> MutexGuard<'_, State> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::with_base_url("memory://", "reviews")
    }

    pub fn with_base_url(base_url: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), key_prefix: key_prefix.into(), state: Mutex::new(State::default()) }
    }

    fn reference_for(&self, key: &str) -> String {
        if self.base_url.ends_with("://") || self.base_url.ends_with('/') {
            format!("{}{}", self.base_url, key)
        } else {
            format!("{}/{}", self.base_url, key)
        }
    }

    /// Seed a blob under an explicit reference.
    pub fn insert(&self, reference: impl Into<String>, blob: Bytes) {
        lock(&self.state).blobs.insert(reference.into(), blob);
    }

    pub fn contains(&self, reference: &str) -> bool {
        lock(&self.state).blobs.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        lock(&self.state).blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, reference: &str) -> Option<Bytes> {
        lock(&self.state).blobs.get(reference).cloned()
    }

    pub fn references(&self) -> Vec<String> {
        let mut refs: Vec<String> = lock(&self.state).blobs.keys().cloned().collect();
        refs.sort();
        refs
    }

    pub fn put_calls(&self) -> usize {
        lock(&self.state).put_calls
    }

    /// Every reference `delete` was called with, in call order.
    pub fn delete_calls(&self) -> Vec<String> {
        lock(&self.state).delete_calls.clone()
    }

    /// Let the next `n` puts succeed, then fail all subsequent ones.
    pub fn fail_puts_after(&self, n: usize) {
        lock(&self.state).puts_before_failure = Some(n);
    }

    /// Make deletes of this reference fail until cleared.
    pub fn fail_delete_of(&self, reference: impl Into<String>) {
        lock(&self.state).failing_deletes.insert(reference.into());
    }

    /// Make every delete fail (store outage during cleanup).
    pub fn fail_all_deletes(&self, on: bool) {
        lock(&self.state).all_deletes_fail = on;
    }

    pub fn set_put_delay(&self, delay: Option<Duration>) {
        lock(&self.state).put_delay = delay;
    }

    /// Drop a blob without going through `delete` (simulates out-of-band removal).
    pub fn remove_out_of_band(&self, reference: &str) -> bool {
        lock(&self.state).blobs.remove(reference).is_some()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, blob: Bytes, meta: &BlobMetadata) -> Result<String, StoreError> {
        let delay = {
            let mut st = lock(&self.state);
            st.put_calls += 1;
            let remaining = st.puts_before_failure;
            match remaining {
                Some(0) => return Err(StoreError::Unavailable("injected put failure".into())),
                Some(n) => st.puts_before_failure = Some(n - 1),
                None => {}
            }
            st.put_delay
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        let reference = self.reference_for(&object_key(&self.key_prefix, &meta.content_type));
        lock(&self.state).blobs.insert(reference.clone(), blob);
        Ok(reference)
    }

    async fn delete(&self, reference: &str) -> Result<(), StoreError> {
        let mut st = lock(&self.state);
        st.delete_calls.push(reference.to_string());
        if st.all_deletes_fail || st.failing_deletes.contains(reference) {
            return Err(StoreError::Unavailable(format!("injected delete failure for {reference}")));
        }
        st.blobs.remove(reference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> BlobMetadata {
        BlobMetadata { content_type: "image/png".into(), ..Default::default() }
    }

    #[tokio::test]
    async fn put_then_delete() {
        let store = InMemoryObjectStore::with_base_url("https://cdn.example.com", "reviews");
        let r = store.put(Bytes::from_static(b"img"), &png()).await.unwrap();
        assert!(r.starts_with("https://cdn.example.com/reviews/"));
        assert!(store.contains(&r));
        store.delete(&r).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_missing_is_ok() {
        let store = InMemoryObjectStore::new();
        assert!(store.delete("memory://reviews/gone.png").await.is_ok());
        assert_eq!(store.delete_calls(), vec!["memory://reviews/gone.png".to_string()]);
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = InMemoryObjectStore::new();
        store.fail_puts_after(1);
        assert!(store.put(Bytes::from_static(b"1"), &png()).await.is_ok());
        assert!(store.put(Bytes::from_static(b"2"), &png()).await.is_err());
        assert_eq!(store.put_calls(), 2);

        store.insert("memory://x", Bytes::from_static(b"x"));
        store.fail_delete_of("memory://x");
        assert!(store.delete("memory://x").await.is_err());
        assert!(store.contains("memory://x"));
    }
}
