use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use super::data::{SessionData, SessionPatch};
use crate::types::SessionKey;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Keyed session persistence.
///
/// Implementations own storage mechanics (encryption, expiry sweep); callers
/// only read or replace whole payloads and apply partial patches. Per-key
/// atomicity is the implementation's responsibility.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for RedisSessions {
///     async fn get(&self, key: &SessionKey) -> Result<Option<SessionData>, BoxError> {
///         let raw: Option<String> = self.conn().await?.get(key.to_string()).await?;
///         Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
///     }
///     // ...
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Load a session. Expired entries read as `None`.
    fn get(
        &self,
        key: &SessionKey,
    ) -> impl Future<Output = Result<Option<SessionData>, BoxError>> + Send;

    /// Store a session, replacing any existing payload under `key`.
    fn set(
        &self,
        key: &SessionKey,
        data: SessionData,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Patch an existing session. Returns the updated payload, or `None` if
    /// no live session exists under `key`.
    fn update(
        &self,
        key: &SessionKey,
        patch: SessionPatch,
    ) -> impl Future<Output = Result<Option<SessionData>, BoxError>> + Send;

    /// Remove a session (sign-out).
    fn delete(&self, key: &SessionKey) -> impl Future<Output = Result<(), BoxError>> + Send;
}

struct Entry {
    data: SessionData,
    deadline: OffsetDateTime,
}

impl Entry {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.deadline > now
    }
}

/// In-process session store for single-instance deployments and tests.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionKey, Entry>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.is_live(now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &SessionKey) -> Result<Option<SessionData>, BoxError> {
        let now = OffsetDateTime::now_utc();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.data.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: evict lazily, rechecking under the write lock.
        let mut sessions = self.sessions.write().await;
        if sessions.get(key).is_some_and(|entry| !entry.is_live(now)) {
            sessions.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &SessionKey, data: SessionData, ttl: Duration) -> Result<(), BoxError> {
        let deadline = OffsetDateTime::now_utc() + ttl;
        self.sessions
            .write()
            .await
            .insert(key.clone(), Entry { data, deadline });
        Ok(())
    }

    async fn update(
        &self,
        key: &SessionKey,
        patch: SessionPatch,
    ) -> Result<Option<SessionData>, BoxError> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                patch.apply(&mut entry.data);
                Ok(Some(entry.data.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), BoxError> {
        self.sessions.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, User};

    fn key(s: &str) -> SessionKey {
        SessionKey(s.to_string())
    }

    fn session() -> SessionData {
        SessionData::new(
            Some(User::new("u1", Some(Role::Student))),
            Some("token".into()),
            Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemorySessionStore::new();
        store.set(&key("a"), session(), Duration::hours(1)).await.unwrap();

        let loaded = store.get(&key("a")).await.unwrap();
        assert_eq!(loaded.unwrap().access_token.as_deref(), Some("token"));

        store.delete(&key("a")).await.unwrap();
        assert!(store.get(&key("a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let store = MemorySessionStore::new();
        store.set(&key("a"), session(), Duration::seconds(-1)).await.unwrap();

        assert!(store.get(&key("a")).await.unwrap().is_none());
        assert!(store.is_empty().await, "expired entry should be evicted on read");
    }

    #[tokio::test]
    async fn test_update_patches_live_session() {
        let store = MemorySessionStore::new();
        store.set(&key("a"), session(), Duration::hours(1)).await.unwrap();

        let patched = store
            .update(
                &key("a"),
                SessionPatch::user(User::new("u1", Some(Role::Student)).with_applied(true)),
            )
            .await
            .unwrap()
            .unwrap();

        assert!(patched.user.unwrap().is_applied);
        assert_eq!(patched.access_token.as_deref(), Some("token"));
    }

    #[tokio::test]
    async fn test_update_missing_key_returns_none() {
        let store = MemorySessionStore::new();
        let result = store
            .update(&key("nope"), SessionPatch::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemorySessionStore::new();
        store.set(&key("live"), session(), Duration::hours(1)).await.unwrap();
        store.set(&key("dead"), session(), Duration::seconds(-5)).await.unwrap();

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }
}
