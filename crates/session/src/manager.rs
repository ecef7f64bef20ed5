use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use stormbridge_core::{Credential, SessionError};
use stormbridge_secrets::{SecretStore, SecretStoreError};

use crate::session::{Session, SessionSummary};
use crate::store::SessionStore;

/// Errors surfaced by [`SessionManager`] operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// A session lifecycle failure (missing, expired, consumed, duplicate).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The secret store backend failed.
    #[error("secret store error: {0}")]
    SecretStore(#[from] SecretStoreError),
}

impl ManagerError {
    /// The session failure behind this error, if that is what it is.
    pub fn session(&self) -> Option<SessionError> {
        match self {
            Self::Session(err) => Some(*err),
            Self::SecretStore(_) => None,
        }
    }
}

/// Owner of the session table and the composed secret store.
///
/// All access to the two-index table goes through a single lock, so session
/// creation and deletion for a user are serialized and the indices can never
/// be observed out of step. Secret-store calls that must be atomic with
/// respect to the table (deletion cleanup, token association) run while the
/// lock is held.
pub struct SessionManager {
    store: Mutex<SessionStore>,
    secrets: Arc<dyn SecretStore>,
}

impl SessionManager {
    /// Create a manager over the given secret store backend.
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            store: Mutex::new(SessionStore::new()),
            secrets,
        }
    }

    /// Create a session for `user_id`.
    ///
    /// Fails with [`SessionError::Exists`] if the user already has a session,
    /// expired or not — callers are responsible for deleting an expired
    /// session before retrying; the manager never auto-evicts here.
    pub async fn create(
        &self,
        user_id: &str,
        user_secret: &str,
        ttl_seconds: u64,
    ) -> Result<Session, SessionError> {
        let mut store = self.store.lock().await;
        if store.get_by_user_id(user_id).is_some() {
            return Err(SessionError::Exists);
        }
        let session = Session::new(user_id, user_secret, ttl_seconds);
        let snapshot = session.clone();
        store.put(session);
        Ok(snapshot)
    }

    /// Fetch a session snapshot by user id.
    pub async fn get_by_user_id(&self, user_id: &str) -> Result<Session, SessionError> {
        let store = self.store.lock().await;
        store
            .get_by_user_id(user_id)
            .cloned()
            .ok_or(SessionError::Invalid)
    }

    /// Fetch a session snapshot by its UUID.
    pub async fn get_by_uuid(&self, session_id: &str) -> Result<Session, SessionError> {
        let store = self.store.lock().await;
        store
            .get_by_uuid(session_id)
            .cloned()
            .ok_or(SessionError::Invalid)
    }

    /// Whether a session exists for `user_id`.
    pub async fn exists(&self, user_id: &str) -> bool {
        let store = self.store.lock().await;
        store.get_by_user_id(user_id).is_some()
    }

    /// Delete the session for `user_id` from both indices and remove its
    /// stored secret so no orphaned credential survives.
    pub async fn delete(&self, user_id: &str) -> Result<(), SessionError> {
        let mut store = self.store.lock().await;
        let session = store.delete(user_id).ok_or(SessionError::Invalid)?;
        // Holding the table lock across the secret deletion keeps a
        // concurrent create from observing the secret without the session.
        if let Err(err) = self.secrets.delete(&session.id()).await {
            warn!(
                session_id = %session.id(),
                error = %err,
                "failed to delete stored secret for deleted session"
            );
        }
        Ok(())
    }

    /// Read-only summaries of every session, for administrative listing.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let store = self.store.lock().await;
        store.iter().map(Session::summary).collect()
    }

    /// Unseal the session in place, consuming its one-time use.
    pub async fn consume(&self, session_id: &str) -> Result<(), SessionError> {
        let mut store = self.store.lock().await;
        let session = store
            .get_mut_by_uuid(session_id)
            .ok_or(SessionError::Invalid)?;
        session.unseal()
    }

    /// Expiry-guarded read of the session's sealed state.
    pub async fn is_sealed(&self, session_id: &str) -> Result<bool, SessionError> {
        let store = self.store.lock().await;
        let session = store.get_by_uuid(session_id).ok_or(SessionError::Invalid)?;
        session.is_sealed()
    }

    /// Compare `candidate` against the session's hashed shared secret.
    pub async fn match_secret(
        &self,
        session_id: &str,
        candidate: &str,
    ) -> Result<bool, SessionError> {
        let store = self.store.lock().await;
        let session = store.get_by_uuid(session_id).ok_or(SessionError::Invalid)?;
        session.match_secret(candidate)
    }

    /// Set a new TTL on the session, sliding its expiry window.
    pub async fn set_ttl(&self, session_id: &str, ttl_seconds: u64) -> Result<(), SessionError> {
        let mut store = self.store.lock().await;
        let session = store
            .get_mut_by_uuid(session_id)
            .ok_or(SessionError::Invalid)?;
        session.set_ttl(ttl_seconds)
    }

    /// Store a validated credential under `session_id`.
    ///
    /// Fails with [`SessionError::Invalid`] if the session no longer exists,
    /// so a credential can never be stored for a session deleted while its
    /// validation was in flight.
    pub async fn put_secret(
        &self,
        session_id: &str,
        secret: Credential,
    ) -> Result<(), ManagerError> {
        let store = self.store.lock().await;
        if store.get_by_uuid(session_id).is_none() {
            debug!(session_id, "refusing to store secret for missing session");
            return Err(SessionError::Invalid.into());
        }
        self.secrets.set(session_id, secret).await?;
        Ok(())
    }

    /// Fetch the credential stored under `session_id`, if any.
    pub async fn get_secret(&self, session_id: &str) -> Result<Option<Credential>, ManagerError> {
        Ok(self.secrets.get(session_id).await?)
    }

    /// Backdate a stored session's modification time, for expiry tests.
    #[cfg(test)]
    async fn backdate(&self, session_id: &str, seconds: i64) {
        let mut store = self.store.lock().await;
        store
            .get_mut_by_uuid(session_id)
            .expect("session should exist")
            .backdate(seconds);
    }
}
