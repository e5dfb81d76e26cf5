//! Registry of live stream sessions.

use crate::session::{CloseReason, SessionId, SessionInfo, StreamSession};
use dashmap::DashMap;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::info;

/// Keyed set of sessions in the `Streaming` state.
///
/// Sessions insert themselves once subscribed and remove themselves on
/// teardown. Cloning shares the same underlying map.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, Arc<StreamSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<StreamSession>) -> Option<Arc<StreamSession>> {
        self.sessions.insert(session.id().clone(), session)
    }

    /// Remove a session. Returns whether it was present.
    pub fn remove(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<StreamSession>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Info for every live session, oldest first.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|entry| entry.value().info())
            .collect();
        sessions.sort_by(|a, b| {
            a.opened_at
                .cmp(&b.opened_at)
                .then_with(|| a.session_id.as_str().cmp(b.session_id.as_str()))
        });
        sessions
    }

    /// Close every registered session concurrently. Returns how many this
    /// call tore down.
    pub async fn close_all(&self) -> usize {
        let sessions: Vec<Arc<StreamSession>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let closed = join_all(
            sessions
                .iter()
                .map(|session| session.close(CloseReason::Shutdown)),
        )
        .await
        .into_iter()
        .filter(|tore_down| *tore_down)
        .count();

        info!(closed, remaining = self.len(), "Closed all sessions");
        closed
    }
}
