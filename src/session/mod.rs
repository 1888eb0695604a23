//! Session abstraction: `Session`, `TurnRecord`, and `SessionStore`.
//!
//! The store owns one mutable record per active user and exposes the
//! four lifecycle transitions (start, topic selection, choice
//! submission, end).  State lives entirely in memory; nothing here
//! touches the filesystem.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dialogue::{self, Turn};

// ── TurnRecord / Session ─────────────────────────────────────

/// A single exchange in a session's history: the simulated client's
/// line.  Immutable once appended.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub client_line: String,
}

/// Per-user training session.  Owned exclusively by [`SessionStore`];
/// at most one exists per user at any time.
#[derive(Debug)]
pub struct Session {
    /// Case identifier minted at topic selection; names the event-log
    /// file for this session.
    pub case_id: String,
    /// Chosen topic title.
    pub topic: String,
    /// Append-only client-line history.
    pub history: Vec<TurnRecord>,
    /// Monotonic turn counter.  1 after topic selection, +1 per choice.
    pub step: u32,
    /// Options offered on the most recent turn.
    pub last_options: [String; 4],
    /// Cancellation handle for background work started on this user's
    /// behalf.  `end` requests cancellation and does not wait.
    pub cancel: CancellationToken,
}

/// Read-only view of a session, for handlers and tests.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub case_id: String,
    pub topic: String,
    pub history_len: usize,
    pub step: u32,
    pub last_options: [String; 4],
}

// ── Errors ───────────────────────────────────────────────────

/// Guidance-class failures.  Neither mutates any state; both carry a
/// short human-readable string the gateway can show directly.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("topic index {index} is out of range")]
    InvalidTopic { index: usize },
    #[error("no active session")]
    NoActiveSession,
}

impl SessionError {
    /// Text shown to the user when the operation is rejected.
    pub fn guidance(&self) -> &'static str {
        match self {
            SessionError::InvalidTopic { .. } => "That topic isn't on the list.",
            SessionError::NoActiveSession => "Press /start to begin a new session.",
        }
    }
}

// ── SessionStore ─────────────────────────────────────────────

#[derive(Debug, Default)]
struct UserState {
    session: Option<Session>,
    /// Set by `end`; every intent except start is rejected until the
    /// next start clears it.
    sleeping: bool,
}

/// Owns the `user_id → state` map.  The outer lock is held only long
/// enough to resolve a user's slot; each slot has its own async mutex,
/// so intents for the same user serialize while different users
/// proceed fully in parallel.
#[derive(Default)]
pub struct SessionStore {
    users: RwLock<HashMap<i64, Arc<Mutex<UserState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, user_id: i64) -> Arc<Mutex<UserState>> {
        if let Some(slot) = self.users.read().await.get(&user_id) {
            return Arc::clone(slot);
        }
        let mut users = self.users.write().await;
        Arc::clone(users.entry(user_id).or_default())
    }

    /// Begin a fresh lifecycle for `user_id`: clear the sleeping flag
    /// and drop any existing session.  Returns `true` when a previous
    /// session was discarded.  Never fails.
    ///
    /// The discarded session's cancellation token is dropped, not
    /// cancelled; only `end` requests cancellation.
    pub async fn start(&self, user_id: i64) -> bool {
        let slot = self.slot(user_id).await;
        let mut state = slot.lock().await;
        state.sleeping = false;
        let had_session = state.session.take().is_some();
        debug!(user_id, had_session, "session lifecycle restarted");
        had_session
    }

    /// Create a session on the chosen topic and generate the opening
    /// turn.  `topic_index` is 1-based into [`dialogue::TOPICS`]; the
    /// last index selects the freeform topic.
    pub async fn select_topic(
        &self,
        user_id: i64,
        topic_index: usize,
    ) -> Result<Turn, SessionError> {
        let slot = self.slot(user_id).await;
        let mut state = slot.lock().await;

        if state.sleeping {
            return Err(SessionError::NoActiveSession);
        }
        if topic_index == 0 || topic_index > dialogue::TOPICS.len() {
            return Err(SessionError::InvalidTopic { index: topic_index });
        }

        let topic = if topic_index == dialogue::TOPICS.len() {
            dialogue::FREEFORM_TOPIC.to_string()
        } else {
            dialogue::TOPICS[topic_index - 1].to_string()
        };

        let turn = dialogue::generate_turn(&topic, 0, None);
        let session = Session {
            case_id: uuid::Uuid::new_v4().to_string(),
            topic,
            history: vec![TurnRecord {
                client_line: turn.client_line.clone(),
            }],
            step: 1,
            last_options: turn.options.clone(),
            cancel: CancellationToken::new(),
        };
        debug!(user_id, case_id = %session.case_id, topic = %session.topic, "session created");
        state.session = Some(session);

        Ok(turn)
    }

    /// Record the trainee's choice and advance to the next turn.
    ///
    /// The letter is normalized case-insensitively across both Latin
    /// and Cyrillic forms; anything unrecognized behaves exactly like
    /// "B" (kept as-is from the original demo).
    pub async fn submit_choice(&self, user_id: i64, letter: &str) -> Result<Turn, SessionError> {
        let slot = self.slot(user_id).await;
        let mut state = slot.lock().await;

        if state.sleeping {
            return Err(SessionError::NoActiveSession);
        }
        let session = state
            .session
            .as_mut()
            .ok_or(SessionError::NoActiveSession)?;

        let turn = dialogue::generate_turn(&session.topic, session.history.len(), Some(letter));
        session.history.push(TurnRecord {
            client_line: turn.client_line.clone(),
        });
        session.step += 1;
        session.last_options = turn.options.clone();
        debug!(user_id, step = session.step, "choice recorded");

        Ok(turn)
    }

    /// Terminate the user's session: request cancellation of any
    /// background work, drop the session, and mark the user sleeping
    /// until the next start.  Returns whether a session existed.
    pub async fn end(&self, user_id: i64) -> bool {
        let slot = self.slot(user_id).await;
        let mut state = slot.lock().await;
        let had_session = match state.session.take() {
            Some(session) => {
                session.cancel.cancel();
                true
            }
            None => false,
        };
        state.sleeping = true;
        debug!(user_id, had_session, "session ended, user sleeping");
        had_session
    }

    // -- read-only helpers ----------------------------------------------

    /// Current step for the user's session, if one exists.
    pub async fn step(&self, user_id: i64) -> Option<u32> {
        let slot = self.slot(user_id).await;
        let state = slot.lock().await;
        state.session.as_ref().map(|s| s.step)
    }

    /// Whether the user is in the post-end sleeping state.
    pub async fn is_sleeping(&self, user_id: i64) -> bool {
        let slot = self.slot(user_id).await;
        let state = slot.lock().await;
        state.sleeping
    }

    /// Snapshot of the user's session, if one exists.
    pub async fn snapshot(&self, user_id: i64) -> Option<SessionSnapshot> {
        let slot = self.slot(user_id).await;
        let state = slot.lock().await;
        state.session.as_ref().map(|s| SessionSnapshot {
            case_id: s.case_id.clone(),
            topic: s.topic.clone(),
            history_len: s.history.len(),
            step: s.step,
            last_options: s.last_options.clone(),
        })
    }

    /// Clone of the session's cancellation token, for wiring background
    /// work to the `end` contract.
    pub async fn cancel_token(&self, user_id: i64) -> Option<CancellationToken> {
        let slot = self.slot(user_id).await;
        let state = slot.lock().await;
        state.session.as_ref().map(|s| s.cancel.clone())
    }
}

// ── Tests ────────────────────────────────────────────────────
