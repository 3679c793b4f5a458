use std::{collections::HashMap, time::Duration};

use tokio::{sync::Mutex, time::Instant};

use crate::types::DestinationId;

pub const EDIT_SESSION_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
struct EditSession {
    handle: String,
    started_at: Instant,
}

/// Which tracked user a chat is currently editing.
///
/// One session per chat; starting a new one replaces the old. Expired entries
/// are never returned and are dropped on the next write.
#[derive(Debug)]
pub struct EditSessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<DestinationId, EditSession>>,
}

impl Default for EditSessionStore {
    fn default() -> Self {
        Self::new(EDIT_SESSION_TTL)
    }
}

impl EditSessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::default(),
        }
    }

    pub async fn start(&self, chat: &DestinationId, handle: impl Into<String>) {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, session| now.duration_since(session.started_at) < self.ttl);
        sessions.insert(
            chat.clone(),
            EditSession {
                handle: handle.into(),
                started_at: now,
            },
        );
    }

    /// The handle being edited in `chat`, if the session is still live.
    pub async fn active(&self, chat: &DestinationId) -> Option<String> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(chat)
            .filter(|session| session.started_at.elapsed() < self.ttl)
            .map(|session| session.handle.clone())
    }

    pub async fn clear(&self, chat: &DestinationId) -> bool {
        self.sessions.lock().await.remove(chat).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::types::DestinationId;

    use super::{EDIT_SESSION_TTL, EditSessionStore};

    #[tokio::test]
    async fn sessions_are_scoped_per_chat() {
        let store = EditSessionStore::default();
        let first = DestinationId::from("1");
        let second = DestinationId::from("2");

        store.start(&first, "Hikaru").await;
        assert_eq!(store.active(&first).await.as_deref(), Some("Hikaru"));
        assert_eq!(store.active(&second).await, None);

        store.start(&first, "Alireza").await;
        assert_eq!(store.active(&first).await.as_deref(), Some("Alireza"));

        assert!(store.clear(&first).await);
        assert!(!store.clear(&first).await);
        assert_eq!(store.active(&first).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_sessions_are_ignored_and_purged() {
        let store = EditSessionStore::default();
        let stale = DestinationId::from("stale");
        let fresh = DestinationId::from("fresh");

        store.start(&stale, "old").await;
        tokio::time::advance(EDIT_SESSION_TTL + Duration::from_secs(1)).await;
        assert_eq!(store.active(&stale).await, None);
        assert_eq!(store.session_count().await, 1);

        store.start(&fresh, "new").await;
        assert_eq!(store.session_count().await, 1);
        assert_eq!(store.active(&fresh).await.as_deref(), Some("new"));
    }
}
