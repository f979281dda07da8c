//! In-memory session store.
//!
//! Each session owns one generative conversation holding its full turn
//! history. The map is only locked for lookup and insert; a turn
//! serializes on the session's own async mutex, so different sessions
//! never wait on each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::adapters::{Conversation, GenerativeAdapter, TextStream, Turn};
use crate::context::Context;
use crate::error::{ChatError, GenerativeError};

// =============================================================================
// Session
// =============================================================================

/// One resident conversation.
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    /// Unix millis of the last touch.
    last_active: AtomicI64,
    turn_count: AtomicUsize,
    conversation: Arc<Mutex<Box<dyn Conversation>>>,
}

impl Session {
    fn new(id: Uuid, conversation: Box<dyn Conversation>) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_active: AtomicI64::new(now.timestamp_millis()),
            turn_count: AtomicUsize::new(0),
            conversation: Arc::new(Mutex::new(conversation)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_active.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    /// Completed turns recorded so far.
    pub fn turn_count(&self) -> usize {
        self.turn_count.load(Ordering::Relaxed)
    }

    fn touch(&self) {
        self.last_active
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            created_at: self.created_at,
            last_active: self.last_active(),
            turn_count: self.turn_count(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("turn_count", &self.turn_count())
            .finish()
    }
}

/// Read-only view of a session for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub turn_count: usize,
}

// =============================================================================
// Guard
// =============================================================================

/// Exclusive access to a session's conversation for the length of a turn.
pub struct SessionGuard {
    session: Arc<Session>,
    conversation: OwnedMutexGuard<Box<dyn Conversation>>,
}

impl SessionGuard {
    pub fn session_id(&self) -> Uuid {
        self.session.id
    }

    /// Open the generative stream for `context` with the full history.
    pub async fn stream(&mut self, context: &Context) -> Result<TextStream, GenerativeError> {
        self.conversation.stream(context).await
    }

    /// Record a completed exchange.
    pub fn append(&mut self, turn: Turn) {
        self.conversation.record(turn);
        self.session.turn_count.fetch_add(1, Ordering::Relaxed);
        self.session.touch();
    }

    pub fn turns(&self) -> &[Turn] {
        self.conversation.turns()
    }
}

// =============================================================================
// Store
// =============================================================================

/// Resident sessions keyed by id.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    generator: Arc<dyn GenerativeAdapter>,
}

impl SessionStore {
    pub fn new(generator: Arc<dyn GenerativeAdapter>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            generator,
        }
    }

    /// Name of the generative backend new conversations come from.
    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Return the resident session for `id`, or create a fresh one.
    ///
    /// An absent or unknown id always yields a newly minted id.
    pub fn get_or_create(&self, id: Option<Uuid>) -> Result<(Uuid, Arc<Session>), ChatError> {
        if let Some(id) = id {
            if let Some(session) = self.get(id)? {
                session.touch();
                debug!(session_id = %id, "Session resumed");
                return Ok((id, session));
            }
            debug!(session_id = %id, "Requested session not resident; creating a new one");
        }

        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(id, self.generator.open_conversation()));
        self.sessions
            .write()
            .map_err(|e| ChatError::SessionStore(format!("session map lock poisoned: {}", e)))?
            .insert(id, Arc::clone(&session));
        info!(session_id = %id, generator = self.generator.name(), "Session created");
        Ok((id, session))
    }

    /// Remove a session that has no completed turns.
    ///
    /// Returns whether the session was removed.
    pub fn discard_unused(&self, id: Uuid) -> Result<bool, ChatError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| ChatError::SessionStore(format!("session map lock poisoned: {}", e)))?;
        let unused = sessions.get(&id).is_some_and(|s| s.turn_count() == 0);
        if unused {
            sessions.remove(&id);
            debug!(session_id = %id, "Unused session discarded");
        }
        Ok(unused)
    }

    /// Look up a resident session.
    pub fn get(&self, id: Uuid) -> Result<Option<Arc<Session>>, ChatError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| ChatError::SessionStore(format!("session map lock poisoned: {}", e)))?;
        Ok(sessions.get(&id).cloned())
    }

    /// Wait for exclusive use of the session's conversation.
    pub async fn lock(&self, session: &Arc<Session>) -> SessionGuard {
        let conversation = Arc::clone(&session.conversation).lock_owned().await;
        SessionGuard {
            session: Arc::clone(session),
            conversation,
        }
    }

    /// Record one exchange into a resident session.
    pub async fn append(&self, id: Uuid, turn: Turn) -> Result<(), ChatError> {
        let session = self.get(id)?.ok_or(ChatError::SessionNotFound(id))?;
        self.lock(&session).await.append(turn);
        Ok(())
    }

    /// Summaries of every resident session, most recently active first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let sessions = match self.sessions.read() {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        let mut out: Vec<SessionSummary> = sessions.values().map(|s| s.summary()).collect();
        out.sort_by(|a, b| b.last_active.cmp(&a.last_active).then(a.id.cmp(&b.id)));
        out
    }

    /// Completed turns of a session, oldest first.
    pub async fn history(&self, id: Uuid) -> Result<Vec<Turn>, ChatError> {
        let session = self.get(id)?.ok_or(ChatError::SessionNotFound(id))?;
        let guard = self.lock(&session).await;
        Ok(guard.turns().to_vec())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("generator", &self.generator.name())
            .finish()
    }
}
