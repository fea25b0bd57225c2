//! Live sessions keyed by id

use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{ActionTimeouts, BrowserSession, SessionInfo};
use crate::browser::DriverLauncher;
use crate::error::AutomationFailure;
use crate::image_store::ImageStore;

/// Owns every live [`BrowserSession`]
///
/// Each session gets its own browser; nothing is shared between them.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<BrowserSession>>,
    launcher: Arc<dyn DriverLauncher>,
    image_store: Arc<dyn ImageStore>,
    timeouts: ActionTimeouts,
}

impl SessionRegistry {
    pub fn new(
        launcher: Arc<dyn DriverLauncher>,
        image_store: Arc<dyn ImageStore>,
        timeouts: ActionTimeouts,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            launcher,
            image_store,
            timeouts,
        }
    }

    /// Allocate a new uninitialized session
    pub fn create(&self) -> Arc<BrowserSession> {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(BrowserSession::new(
            id.clone(),
            self.launcher.clone(),
            self.image_store.clone(),
            self.timeouts,
        ));
        self.sessions.insert(id.clone(), session.clone());
        info!(session_id = %id, "Session created");
        session
    }

    pub fn get(&self, session_id: &str) -> Result<Arc<BrowserSession>, AutomationFailure> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AutomationFailure::Session {
                session_id: session_id.to_string(),
                message: format!("Session {session_id} not found"),
            })
    }

    /// Close and forget a session
    pub async fn close(&self, session_id: &str) -> Result<(), AutomationFailure> {
        let (_, session) =
            self.sessions
                .remove(session_id)
                .ok_or_else(|| AutomationFailure::Session {
                    session_id: session_id.to_string(),
                    message: format!("Session {session_id} not found"),
                })?;
        session.close().await;
        Ok(())
    }

    /// Forget a session without touching its browser
    pub fn forget(&self, session_id: &str) -> Option<Arc<BrowserSession>> {
        self.sessions.remove(session_id).map(|(_, session)| session)
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> =
            self.sessions.iter().map(|entry| entry.value().info()).collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close every session, used on process shutdown
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, session)) = self.sessions.remove(&id) {
                session.close().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::LaunchOptions;
    use crate::browser::fake::FakeLauncher;
    use crate::image_store::testing::MemoryImageStore;
    use crate::session::SessionStatus;

    fn registry(launcher: FakeLauncher) -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(launcher),
            Arc::new(MemoryImageStore::default()),
            ActionTimeouts::default(),
        )
    }

    #[tokio::test]
    async fn test_create_get_close() {
        let registry = registry(FakeLauncher::new());
        let session = registry.create();
        session.initialize(&LaunchOptions::default()).await.unwrap();

        let fetched = registry.get(session.id()).unwrap();
        assert!(Arc::ptr_eq(&session, &fetched));
        assert_eq!(registry.list()[0].status, SessionStatus::Ready);

        registry.close(session.id()).await.unwrap();
        assert_eq!(session.status(), SessionStatus::Closed);
        let err = registry.get(session.id()).err().unwrap();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let launcher = FakeLauncher::new();
        let recorder = launcher.recorder.clone();
        let registry = registry(launcher);
        let a = registry.create();
        let b = registry.create();
        assert_ne!(a.id(), b.id());

        a.initialize(&LaunchOptions::default()).await.unwrap();
        b.initialize(&LaunchOptions::default()).await.unwrap();
        assert_eq!(recorder.lock().launches, 2);

        a.close().await;
        assert_eq!(b.status(), SessionStatus::Ready);

        registry.shutdown().await;
        assert!(registry.is_empty());
        assert_eq!(b.status(), SessionStatus::Closed);
    }

    #[tokio::test]
    async fn test_forget_releases_unlaunched_session() {
        let launcher = FakeLauncher::new();
        let recorder = launcher.recorder.clone();
        let registry = registry(launcher);
        let session = registry.create();

        let forgotten = registry.forget(session.id()).unwrap();
        assert!(Arc::ptr_eq(&session, &forgotten));
        assert!(registry.is_empty());
        assert!(registry.forget(session.id()).is_none());
        assert_eq!(recorder.lock().launches, 0);
    }
}
