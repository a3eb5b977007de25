//! Session store — owns every in-progress intake, keyed by user identity.
//!
//! The store performs no validation; the engine is its only caller. It also
//! hands out the per-user locks that serialize event handling for a single
//! user while different users proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::flow::step::StepId;

/// Per-user in-progress record of intake progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    /// Always refers to a step in the catalog; the terminal marker is never
    /// persisted — completion clears the session instead.
    pub step: StepId,
    /// Accumulated answers, field name → projected value. Overwrite
    /// semantics: re-answering a field replaces the stored value.
    pub answers: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn new(user_id: i64, step: StepId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            step,
            answers: HashMap::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Refresh the last-activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Store-level errors.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("A live session already exists for user {0}")]
    AlreadyExists(i64),
}

/// In-memory session store with per-user locks.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<i64, Session>>,
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The per-user mutex for `user_id`. Callers hold it for the duration of
    /// one event, including finalization.
    pub async fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(user_id).or_default())
    }

    pub async fn get(&self, user_id: i64) -> Option<Session> {
        self.sessions.lock().await.get(&user_id).cloned()
    }

    /// Create a fresh session at `initial_step`. Fails if a live session
    /// exists; callers must `clear` first.
    pub async fn create(&self, user_id: i64, initial_step: StepId) -> Result<Session, StoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&user_id) {
            return Err(StoreError::AlreadyExists(user_id));
        }
        let session = Session::new(user_id, initial_step);
        sessions.insert(user_id, session.clone());
        Ok(session)
    }

    /// Total replace, last-writer-wins. Per-user serialization (see
    /// [`Self::user_lock`]) means no concurrent writers exist for one user.
    pub async fn save(&self, session: Session) {
        self.sessions.lock().await.insert(session.user_id, session);
    }

    /// Remove a session. Idempotent: clearing an absent session is a no-op.
    pub async fn clear(&self, user_id: i64) {
        self.sessions.lock().await.remove(&user_id);
    }

    /// Evict sessions idle longer than `timeout`. Takes each user's lock
    /// before clearing to avoid racing a late-arriving event. Returns the
    /// number of sessions evicted.
    ///
    /// Also prunes lock entries nobody holds for users with no live
    /// session — every inbound event allocates one, so without pruning the
    /// lock map grows unboundedly in a long-running public bot.
    pub async fn evict_idle(&self, timeout: Duration) -> usize {
        let user_ids: Vec<i64> = self.sessions.lock().await.keys().copied().collect();
        let cutoff = Utc::now()
            - chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::hours(24));

        let mut evicted = 0;
        for user_id in user_ids {
            let lock = self.user_lock(user_id).await;
            let _guard = lock.lock().await;
            let mut sessions = self.sessions.lock().await;
            let stale = sessions
                .get(&user_id)
                .map(|s| s.last_activity < cutoff)
                .unwrap_or(false);
            if stale {
                sessions.remove(&user_id);
                evicted += 1;
                tracing::info!(user_id, "Evicted idle session");
            }
        }

        // Sessions lock first, then locks — same order everywhere that
        // holds both.
        let sessions = self.sessions.lock().await;
        let mut locks = self.locks.lock().await;
        locks.retain(|user_id, lock| {
            sessions.contains_key(user_id) || Arc::strong_count(lock) > 1
        });

        evicted
    }
}
