//! Abstract remote shared-state store.
//!
//! The concrete backend (cloud database, sync service) is irrelevant to the
//! core; everything goes through [`SharedStateStore`]. The in-memory
//! implementation backs tests and the offline-degradation paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::types::{SharedTimerState, SyncError};
use crate::session::Session;

/// Remote store collaborator: read/write of the shared timer record plus
/// fire-and-forget session history persistence.
#[async_trait]
pub trait SharedStateStore: Send + Sync {
    async fn read_timer_state(&self, user_id: &str)
        -> Result<Option<SharedTimerState>, SyncError>;

    async fn write_timer_state(&self, state: &SharedTimerState) -> Result<(), SyncError>;

    /// Non-critical path; callers may ignore failures.
    async fn save_session(&self, session: &Session) -> Result<(), SyncError>;
}

/// In-memory store. Doubles as the test fake; `set_offline` simulates an
/// unreachable backend.
#[derive(Default)]
pub struct InMemoryStore {
    states: Mutex<HashMap<String, SharedTimerState>>,
    sessions: Mutex<Vec<Session>>,
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), SyncError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(SyncError::Unreachable("store is offline".into()))
        } else {
            Ok(())
        }
    }

    pub async fn saved_sessions(&self) -> Vec<Session> {
        self.sessions.lock().await.clone()
    }
}

#[async_trait]
impl SharedStateStore for InMemoryStore {
    async fn read_timer_state(
        &self,
        user_id: &str,
    ) -> Result<Option<SharedTimerState>, SyncError> {
        self.check_reachable()?;
        Ok(self.states.lock().await.get(user_id).cloned())
    }

    async fn write_timer_state(&self, state: &SharedTimerState) -> Result<(), SyncError> {
        self.check_reachable()?;
        let mut states = self.states.lock().await;
        // Last-write-wins: an older write never clobbers a newer record.
        match states.get(&state.user_id) {
            Some(existing) if existing.newer_than(state) => Ok(()),
            _ => {
                states.insert(state.user_id.clone(), state.clone());
                Ok(())
            }
        }
    }

    async fn save_session(&self, session: &Session) -> Result<(), SyncError> {
        self.check_reachable()?;
        self.sessions.lock().await.push(session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn round_trip() {
        let store = InMemoryStore::new();
        let now = Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap();
        let state = SharedTimerState::inactive("user-1", "dev-a", now);

        assert!(store.read_timer_state("user-1").await.unwrap().is_none());
        store.write_timer_state(&state).await.unwrap();
        assert_eq!(
            store.read_timer_state("user-1").await.unwrap(),
            Some(state)
        );
    }

    #[tokio::test]
    async fn offline_store_errors() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.read_timer_state("user-1").await,
            Err(SyncError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn stale_write_does_not_clobber() {
        let store = InMemoryStore::new();
        let now = Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap();

        let mut newer = SharedTimerState::inactive("user-1", "dev-a", now);
        newer.activate(now, 600, "dev-a", now + Duration::seconds(10));
        store.write_timer_state(&newer).await.unwrap();

        let stale = SharedTimerState::inactive("user-1", "dev-b", now);
        store.write_timer_state(&stale).await.unwrap();

        let read = store.read_timer_state("user-1").await.unwrap().unwrap();
        assert!(read.is_active);
        assert_eq!(read.last_modified_by, "dev-a");
    }
}
