//! Session-scoped key/value storage
//!
//! Both the resume-token mapping and the applicant-profile table go through
//! [`SessionStore`]. Writes are last-write-wins; there is no locking across
//! requests beyond what the backing map does per key.

use async_trait::async_trait;
use dashmap::DashMap;

#[async_trait]
pub trait SessionStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V>;

    async fn put(&self, key: &str, value: V);

    /// Remove and return the previous value, if any
    async fn delete(&self, key: &str) -> Option<V>;
}

/// Process-lifetime store backed by a concurrent map
pub struct InMemorySessionStore<V> {
    entries: DashMap<String, V>,
}

impl<V> InMemorySessionStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for InMemorySessionStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> SessionStore<V> for InMemorySessionStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    async fn put(&self, key: &str, value: V) {
        self.entries.insert(key.to_string(), value);
    }

    async fn delete(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemorySessionStore::<String>::new();
        assert!(store.get("s1").await.is_none());

        store.put("s1", "token-a".to_string()).await;
        assert_eq!(store.get("s1").await.as_deref(), Some("token-a"));

        assert_eq!(store.delete("s1").await.as_deref(), Some("token-a"));
        assert!(store.get("s1").await.is_none());
        assert!(store.delete("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = Arc::new(InMemorySessionStore::<u32>::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.put("shared", i).await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len(), 1);
        assert!(store.get("shared").await.is_some_and(|v| v < 16));
    }

    #[tokio::test]
    async fn test_usable_as_trait_object() {
        let store: Arc<dyn SessionStore<String>> = Arc::new(InMemorySessionStore::new());
        store.put("k", "v".to_string()).await;
        assert_eq!(store.get("k").await.as_deref(), Some("v"));
    }
}
