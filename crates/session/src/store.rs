use std::collections::HashMap;

use tracing::warn;

use crate::session::Session;

/// Two-index in-memory session table.
///
/// Sessions are stored by user id with a reverse index from session UUID to
/// user id. Both indices are mutated only together; the store itself is not
/// synchronized — [`crate::SessionManager`] serializes access behind a single
/// lock so no caller can observe a session present in one index but not its
/// mirror.
#[derive(Debug, Default)]
pub struct SessionStore {
    by_user_id: HashMap<String, Session>,
    by_session_id: HashMap<String, String>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a session by user id.
    pub fn get_by_user_id(&self, user_id: &str) -> Option<&Session> {
        self.by_user_id.get(user_id)
    }

    /// Mutable lookup by user id.
    pub fn get_mut_by_user_id(&mut self, user_id: &str) -> Option<&mut Session> {
        self.by_user_id.get_mut(user_id)
    }

    /// Look up a session through the reverse index by its UUID.
    pub fn get_by_uuid(&self, session_id: &str) -> Option<&Session> {
        let user_id = self.by_session_id.get(session_id)?;
        self.by_user_id.get(user_id)
    }

    /// Mutable lookup by session UUID.
    pub fn get_mut_by_uuid(&mut self, session_id: &str) -> Option<&mut Session> {
        let user_id = self.by_session_id.get(session_id)?;
        self.by_user_id.get_mut(user_id)
    }

    /// Insert a session under its user id and record the reverse mapping.
    ///
    /// Replaces any previous session for the same user, dropping the old
    /// reverse mapping so the indices stay consistent.
    pub fn put(&mut self, session: Session) {
        if let Some(previous) = self.by_user_id.get(session.user_id()) {
            self.by_session_id.remove(&previous.id());
        }
        self.by_session_id
            .insert(session.id(), session.user_id().to_owned());
        self.by_user_id
            .insert(session.user_id().to_owned(), session);
    }

    /// Delete a session by user id, removing the reverse mapping with it.
    ///
    /// Returns the removed session, or `None` if the user had none.
    pub fn delete(&mut self, user_id: &str) -> Option<Session> {
        match self.by_user_id.remove(user_id) {
            Some(session) => {
                self.by_session_id.remove(&session.id());
                Some(session)
            }
            None => {
                warn!(user_id, "failed to delete session, not found");
                None
            }
        }
    }

    /// Iterate over all stored sessions.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.by_user_id.values()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.by_user_id.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.by_user_id.is_empty()
    }
}
