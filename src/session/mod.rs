//! In-process session store (spec §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::Session;

type SessionHandle = Arc<Mutex<Session>>;

pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    ttl: ChronoDuration,
}

impl InMemorySessionStore {
    pub fn new(ttl_minutes: i64) -> Self {
        InMemorySessionStore {
            sessions: Mutex::new(HashMap::new()),
            ttl: ChronoDuration::minutes(ttl_minutes),
        }
    }

    /// Mints `sess_` + 12 hex characters.
    fn mint_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("sess_{}", &hex[..12])
    }

    pub async fn create_session(&self) -> Session {
        let session = Session::new(Self::mint_id());
        let handle = Arc::new(Mutex::new(session.clone()));
        self.sessions.lock().await.insert(session.id.clone(), handle);
        session
    }

    /// Returns `None` if absent or expired; an expired entry is deleted.
    pub async fn get_session(&self, id: &str) -> Option<Session> {
        let handle = self.sessions.lock().await.get(id).cloned()?;
        let session = handle.lock().await;
        if Utc::now() - session.created_at <= self.ttl {
            Some(session.clone())
        } else {
            drop(session);
            self.sessions.lock().await.remove(id);
            None
        }
    }

    pub async fn get_or_create_session(&self, id: Option<&str>) -> Session {
        if let Some(id) = id {
            if let Some(session) = self.get_session(id).await {
                return session;
            }
        }
        self.create_session().await
    }

    pub async fn update_session(&self, session: Session) {
        let handle = self
            .sessions
            .lock()
            .await
            .entry(session.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(session.clone())))
            .clone();
        *handle.lock().await = session;
    }

    /// Locks a single session for the caller's exclusive use, creating it
    /// first if absent or expired. Held across an entire turn, this is what
    /// linearizes concurrent requests against the same session id (spec §5,
    /// §8 invariant 1) — unlike a get-then-update pair, no other caller can
    /// observe or overwrite state while the guard is alive.
    pub async fn lock_session(&self, id: Option<&str>) -> OwnedMutexGuard<Session> {
        if let Some(id) = id {
            let existing = self.sessions.lock().await.get(id).cloned();
            if let Some(handle) = existing {
                let guard = handle.lock_owned().await;
                if Utc::now() - guard.created_at <= self.ttl {
                    return guard;
                }
                drop(guard);
                self.sessions.lock().await.remove(id);
            }
        }

        let session = Session::new(Self::mint_id());
        let session_id = session.id.clone();
        let handle: SessionHandle = Arc::new(Mutex::new(session));
        self.sessions.lock().await.insert(session_id, handle.clone());
        handle.lock_owned().await
    }

    pub async fn delete_session(&self, id: &str) {
        self.sessions.lock().await.remove(id);
    }

    pub async fn clear_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let now = Utc::now();
        let ttl = self.ttl;
        let before = sessions.len();
        let mut expired = Vec::new();
        for (id, handle) in sessions.iter() {
            if now - handle.lock().await.created_at > ttl {
                expired.push(id.clone());
            }
        }
        for id in &expired {
            sessions.remove(id);
        }
        before - sessions.len()
    }

    pub async fn get_active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_session_mints_expected_id_shape() {
        let store = InMemorySessionStore::new(60);
        let session = store.create_session().await;
        assert!(session.id.starts_with("sess_"));
        assert_eq!(session.id.len(), "sess_".len() + 12);
    }

    #[tokio::test]
    async fn expired_session_is_evicted_on_read() {
        let store = InMemorySessionStore::new(-1);
        let session = store.create_session().await;
        assert!(store.get_session(&session.id).await.is_none());
        assert_eq!(store.get_active_count().await, 0);
    }

    #[tokio::test]
    async fn get_or_create_reuses_valid_session() {
        let store = InMemorySessionStore::new(60);
        let session = store.create_session().await;
        let again = store.get_or_create_session(Some(&session.id)).await;
        assert_eq!(session.id, again.id);
    }

    #[tokio::test]
    async fn concurrent_locks_on_the_same_session_serialize() {
        let store = Arc::new(InMemorySessionStore::new(60));
        let session = store.create_session().await;

        let store_a = store.clone();
        let store_b = store.clone();
        let id = session.id.clone();
        let id2 = session.id.clone();

        let a = tokio::spawn(async move {
            let mut guard = store_a.lock_session(Some(&id)).await;
            guard.append_message(crate::models::MessageRole::User, "a".to_string());
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            guard.append_message(crate::models::MessageRole::User, "a-done".to_string());
        });
        let b = tokio::spawn(async move {
            let mut guard = store_b.lock_session(Some(&id2)).await;
            guard.append_message(crate::models::MessageRole::User, "b".to_string());
            guard.append_message(crate::models::MessageRole::User, "b-done".to_string());
        });

        a.await.unwrap();
        b.await.unwrap();

        let result = store.get_session(&session.id).await.unwrap();
        // Whichever task acquired the lock first must finish both of its
        // appends before the other task's first append appears.
        let first_pair: Vec<&str> = result.messages[0..2].iter().map(|m| m.content.as_str()).collect();
        assert!(first_pair == ["a", "a-done"] || first_pair == ["b", "b-done"]);
    }
}
