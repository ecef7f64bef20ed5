use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use stormbridge_core::{SessionError, generate_secret};

/// Length of the random bot-side component mixed into the shared-secret hash.
const BOT_SECRET_LENGTH: usize = 8;

/// Compute the hex SHA-256 of `user_secret ‖ bot_secret`.
fn hash_secret(user_secret: &str, bot_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_secret.as_bytes());
    hasher.update(bot_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// A single linking session between a chat identity and the broker.
///
/// Sessions are one-time-use: they start sealed, are unsealed exactly once by
/// the out-of-band login callback, and expire once their TTL has elapsed
/// since the last modification. Every operation is expiry-guarded — using an
/// expired session is an error the caller must handle by deleting it, never
/// a silent success.
///
/// The user's secret is never stored; only the SHA-256 of the user secret
/// concatenated with a random per-session bot secret is kept for
/// challenge/response matching.
#[derive(Clone)]
pub struct Session {
    user_id: String,
    session_id: Uuid,
    bot_secret: String,
    hashed_secret: String,
    is_sealed: bool,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    ttl_seconds: i64,
}

impl Session {
    /// Create a sealed session for `user_id`.
    ///
    /// Generates the session UUID and a fresh random bot secret, hashes the
    /// user secret with it and drops the plaintext immediately.
    pub fn new(user_id: impl Into<String>, user_secret: &str, ttl_seconds: u64) -> Self {
        let bot_secret = generate_secret(BOT_SECRET_LENGTH);
        let hashed_secret = hash_secret(user_secret, &bot_secret);
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            session_id: Uuid::new_v4(),
            bot_secret,
            hashed_secret,
            is_sealed: true,
            created_at: now,
            modified_at: now,
            ttl_seconds: i64::try_from(ttl_seconds).unwrap_or(i64::MAX),
        }
    }

    /// Fail with [`SessionError::Expired`] once the TTL has elapsed since the
    /// last modification.
    ///
    /// All other session operations call this guard first and propagate the
    /// failure, so an expired session cannot be unsealed, matched against or
    /// used for token lookup.
    pub fn check_expiry(&self) -> Result<(), SessionError> {
        let elapsed = Utc::now()
            .signed_duration_since(self.modified_at)
            .num_seconds();
        if elapsed >= self.ttl_seconds {
            return Err(SessionError::Expired);
        }
        Ok(())
    }

    /// Consume the one-time-use session.
    ///
    /// Fails with [`SessionError::Consumed`] if the session has already been
    /// unsealed; a session only ever transitions sealed → unsealed once.
    pub fn unseal(&mut self) -> Result<(), SessionError> {
        self.check_expiry()?;
        if !self.is_sealed {
            return Err(SessionError::Consumed);
        }
        self.is_sealed = false;
        Ok(())
    }

    /// Expiry-guarded read of the sealed state.
    pub fn is_sealed(&self) -> Result<bool, SessionError> {
        self.check_expiry()?;
        Ok(self.is_sealed)
    }

    /// Compare `candidate` against the session's hashed secret.
    ///
    /// Recomputes the hash with the session's bot secret and compares in
    /// constant time.
    pub fn match_secret(&self, candidate: &str) -> Result<bool, SessionError> {
        self.check_expiry()?;
        let candidate_hash = hash_secret(candidate, &self.bot_secret);
        Ok(candidate_hash
            .as_bytes()
            .ct_eq(self.hashed_secret.as_bytes())
            .into())
    }

    /// Expiry-guarded TTL getter.
    pub fn ttl(&self) -> Result<u64, SessionError> {
        self.check_expiry()?;
        Ok(self.ttl_seconds.max(0).unsigned_abs())
    }

    /// Set a new TTL, sliding the expiry window from now.
    pub fn set_ttl(&mut self, ttl_seconds: u64) -> Result<(), SessionError> {
        self.check_expiry()?;
        self.ttl_seconds = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        self.modified_at = Utc::now();
        Ok(())
    }

    /// The session UUID rendered as the external-facing identifier.
    pub fn id(&self) -> String {
        self.session_id.to_string()
    }

    /// The session UUID.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The chat user id this session belongs to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// When the session stops being usable, given the current TTL.
    pub fn expires_at(&self) -> DateTime<Utc> {
        Duration::try_seconds(self.ttl_seconds)
            .and_then(|ttl| self.modified_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Read-only attributes for administrative listing.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            user_id: self.user_id.clone(),
            session_id: self.session_id,
            is_sealed: self.is_sealed,
            created_at: self.created_at,
            modified_at: self.modified_at,
            expires_at: self.expires_at(),
        }
    }

    /// Backdate the last modification, for expiry tests.
    #[cfg(test)]
    pub(crate) fn backdate(&mut self, seconds: i64) {
        self.modified_at -= Duration::seconds(seconds);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("session_id", &self.session_id)
            .field("is_sealed", &self.is_sealed)
            .field("created_at", &self.created_at)
            .field("modified_at", &self.modified_at)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a session for administrative listing.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub user_id: String,
    pub session_id: Uuid,
    pub is_sealed: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UserID: {}, Is Sealed: {}, SessionID: {}, Creation Date: {}, \
             Modified Date: {}, Expiry Date: {}",
            self.user_id,
            self.is_sealed,
            self.session_id,
            self.created_at,
            self.modified_at,
            self.expires_at,
        )
    }
}
